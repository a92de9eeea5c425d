/*
 * @file capture.rs
 * @brief Microphone capture and fan-out
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Microphone capture through CPAL, fanned out to any number of listeners.
//!
//! The main loop and the barge-in listener both read the microphone. One
//! input stream feeds a hub that slices the audio into fixed-size chunks
//! and hands a copy to every live [`MicSubscription`].

use std::sync::Arc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig, StreamError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::recorder::ChunkSource;
use super::wav::{StreamResampler, downmix};
use crate::error::{Result, RobotError};

/// Chunks buffered per subscriber before the oldest is dropped.
const SUBSCRIBER_BACKLOG: usize = 256;

/// How long a reader waits for audio before reporting a stalled device.
const READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Live microphone stream. Dropping it stops capture and closes all subscriptions.
pub struct Microphone {
    _stream: Stream,
    hub: Arc<Hub>,
}

impl Microphone {
    /// Opens the default input device.
    ///
    /// # Arguments
    /// * `sample_rate` - Rate delivered to subscribers.
    /// * `channels` - Channel count requested from the device.
    /// * `chunk` - Samples per delivered chunk.
    ///
    /// # Details
    /// If the device rejects the requested format, its default format is
    /// used and the audio is downmixed and resampled in the callback.
    /// Subscribers always receive mono audio at `sample_rate`.
    ///
    /// # Errors
    /// Returns an error when no input device exists or no stream can be built.
    pub fn open(sample_rate: u32, channels: u16, chunk: usize) -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| RobotError::AudioDevice("no input device".into()))?;
        if let Ok(name) = device.name() {
            info!(device = %name, sample_rate, chunk, "opening microphone");
        }
        let hub = Arc::new(Hub::new(chunk));

        let requested = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let stream = match build_input_stream(&device, &requested, sample_rate, hub.clone()) {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%err, "requested input format rejected, using device default");
                let fallback: StreamConfig = device
                    .default_input_config()
                    .map_err(RobotError::device)?
                    .into();
                build_input_stream(&device, &fallback, sample_rate, hub.clone())?
            }
        };
        stream.play().map_err(RobotError::device)?;
        Ok(Self {
            _stream: stream,
            hub,
        })
    }

    /// Starts a new listener; it only sees audio captured from now on.
    pub fn subscribe(&self) -> MicSubscription {
        self.hub.subscribe()
    }

    pub fn sample_rate(&self) -> u32 {
        self.hub.sample_rate()
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.hub.close();
    }
}

/// One reader of the shared microphone.
pub struct MicSubscription {
    id: u64,
    rx: Receiver<Vec<i16>>,
    hub: Arc<Hub>,
}

impl MicSubscription {
    /// Discards audio buffered so far.
    pub fn drain(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

impl ChunkSource for MicSubscription {
    fn read_chunk(&mut self) -> Result<Vec<i16>> {
        match self.rx.recv_timeout(READ_TIMEOUT) {
            Ok(chunk) => Ok(chunk),
            Err(RecvTimeoutError::Timeout) => {
                Err(RobotError::AudioDevice("microphone delivered no audio".into()))
            }
            Err(RecvTimeoutError::Disconnected) => Err(RobotError::Closed("microphone")),
        }
    }

    fn chunk_frames(&self) -> usize {
        self.hub.chunk
    }

    fn sample_rate(&self) -> u32 {
        self.hub.sample_rate()
    }

    fn discard_pending(&mut self) {
        self.drain();
    }
}

impl Drop for MicSubscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

struct Subscriber {
    id: u64,
    tx: Sender<Vec<i16>>,
    rx: Receiver<Vec<i16>>,
}

#[derive(Default)]
struct HubState {
    pending: Vec<i16>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
    sample_rate: u32,
    closed: bool,
}

/// Re-chunks captured audio and broadcasts it.
struct Hub {
    chunk: usize,
    state: Mutex<HubState>,
}

impl Hub {
    fn new(chunk: usize) -> Self {
        Self {
            chunk: chunk.max(1),
            state: Mutex::new(HubState::default()),
        }
    }

    fn sample_rate(&self) -> u32 {
        self.state.lock().sample_rate
    }

    fn set_sample_rate(&self, rate: u32) {
        self.state.lock().sample_rate = rate;
    }

    fn subscribe(self: &Arc<Self>) -> MicSubscription {
        let (tx, rx) = bounded(SUBSCRIBER_BACKLOG);
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        if !state.closed {
            state.subscribers.push(Subscriber {
                id,
                tx,
                rx: rx.clone(),
            });
        }
        MicSubscription {
            id,
            rx,
            hub: Arc::clone(self),
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.state.lock().subscribers.retain(|s| s.id != id);
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.subscribers.clear();
        state.pending.clear();
    }

    /// Appends mono samples and broadcasts every complete chunk.
    fn push(&self, samples: &[i16]) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.pending.extend_from_slice(samples);
        while state.pending.len() >= self.chunk {
            let chunk: Vec<i16> = state.pending.drain(..self.chunk).collect();
            for subscriber in &state.subscribers {
                broadcast(subscriber, chunk.clone());
            }
        }
    }
}

/// Sends one chunk, dropping the subscriber's oldest chunk if it lags.
fn broadcast(subscriber: &Subscriber, chunk: Vec<i16>) {
    match subscriber.tx.try_send(chunk) {
        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
        Err(TrySendError::Full(chunk)) => {
            let _ = subscriber.rx.try_recv();
            let _ = subscriber.tx.try_send(chunk);
        }
    }
}

/// Builds an f32 input stream that feeds the hub.
fn build_input_stream(
    device: &Device,
    config: &StreamConfig,
    target_rate: u32,
    hub: Arc<Hub>,
) -> Result<Stream> {
    let channels = config.channels;
    let device_rate = config.sample_rate.0;
    hub.set_sample_rate(target_rate);
    let mut resampler = StreamResampler::new(device_rate, target_rate);
    device
        .build_input_stream(
            config,
            move |data: &[f32], _: &_| {
                let pcm: Vec<i16> = data.iter().map(|&s| f32_to_i16(s)).collect();
                let mono = downmix(&pcm, channels);
                hub.push(&resampler.process(&mono));
            },
            log_stream_error,
            None,
        )
        .map_err(RobotError::device)
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn log_stream_error(err: StreamError) {
    error!(%err, "audio input stream error");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(chunk: usize) -> Arc<Hub> {
        let hub = Arc::new(Hub::new(chunk));
        hub.set_sample_rate(16_000);
        hub
    }

    #[test]
    fn push_delivers_whole_chunks() {
        let hub = hub(4);
        let mut sub = hub.subscribe();
        hub.push(&[1, 2, 3]);
        assert!(sub.rx.try_recv().is_err());
        hub.push(&[4, 5, 6, 7, 8, 9]);
        assert_eq!(sub.read_chunk().expect("chunk"), vec![1, 2, 3, 4]);
        assert_eq!(sub.read_chunk().expect("chunk"), vec![5, 6, 7, 8]);
        assert_eq!(sub.chunk_frames(), 4);
        assert_eq!(sub.sample_rate(), 16_000);
    }

    #[test]
    fn every_subscriber_gets_a_copy() {
        let hub = hub(2);
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        hub.push(&[7, 8]);
        assert_eq!(a.read_chunk().expect("a"), vec![7, 8]);
        assert_eq!(b.read_chunk().expect("b"), vec![7, 8]);
    }

    #[test]
    fn new_subscriber_sees_no_stale_audio() {
        let hub = hub(2);
        let _early = hub.subscribe();
        hub.push(&[1, 1]);
        let late = hub.subscribe();
        assert!(late.rx.try_recv().is_err());
    }

    #[test]
    fn lagging_subscriber_drops_oldest() {
        let hub = hub(1);
        let mut sub = hub.subscribe();
        let samples: Vec<i16> = (0..(SUBSCRIBER_BACKLOG as i16 + 2)).collect();
        hub.push(&samples);
        assert_eq!(sub.read_chunk().expect("chunk"), vec![2]);
    }

    #[test]
    fn dropped_subscription_is_removed() {
        let hub = hub(2);
        let sub = hub.subscribe();
        assert_eq!(hub.state.lock().subscribers.len(), 1);
        drop(sub);
        assert!(hub.state.lock().subscribers.is_empty());
    }

    #[test]
    fn closed_hub_disconnects_readers() {
        let hub = hub(2);
        let mut sub = hub.subscribe();
        hub.close();
        assert!(matches!(sub.read_chunk(), Err(RobotError::Closed(_))));
    }

    #[test]
    fn float_conversion_clamps() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert!(f32_to_i16(-0.5) < 0);
    }
}
