/*
 * @file player.rs
 * @brief Threaded audio playback
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

//! Threaded audio playback: one worker thread, a small job queue, and
//! cancellation for barge-in.
//!
//! Sound effects are fire-and-forget (`play_async`); prompts and spoken
//! replies wait for completion (`play_blocking`, `play_wav_bytes`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use super::wav::{resample, scale_volume, wav_to_pcm};
use crate::error::{Result, RobotError};

/// Jobs waiting behind the one being played.
const QUEUE_CAPACITY: usize = 8;

/// Repeats of the same file faster than this are ignored.
const DEBOUNCE: Duration = Duration::from_millis(350);

/// Worker poll interval while idle.
const IDLE_POLL: Duration = Duration::from_millis(500);

/// Volumes at or above this are played unscaled.
const UNITY_VOLUME: f32 = 0.999;

/// Granularity of blocking waits on a queued sound.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Output device abstraction; the worker owns exactly one sink.
pub trait AudioSink: Send {
    /// Plays mono 16-bit PCM, returning early once `cancel` is set.
    fn play(&mut self, pcm: &[i16], sample_rate: u32, cancel: &AtomicBool) -> Result<()>;
}

/// One-shot completion flag that can be waited on.
#[derive(Default)]
struct Completion {
    done: Mutex<bool>,
    cond: Condvar,
}

impl Completion {
    fn finished() -> Arc<Self> {
        let completion = Arc::new(Self::default());
        completion.set();
        completion
    }

    fn set(&self) {
        *self.done.lock() = true;
        self.cond.notify_all();
    }

    fn is_set(&self) -> bool {
        *self.done.lock()
    }

    fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut done = self.done.lock();
        match timeout {
            None => {
                while !*done {
                    self.cond.wait(&mut done);
                }
            }
            Some(timeout) => {
                let deadline = Instant::now() + timeout;
                while !*done {
                    if self.cond.wait_until(&mut done, deadline).timed_out() {
                        break;
                    }
                }
            }
        }
        *done
    }
}

/// Caller's view of a queued sound.
#[derive(Clone)]
pub struct PlaybackHandle {
    done: Arc<Completion>,
    cancel: Arc<AtomicBool>,
}

impl PlaybackHandle {
    fn finished() -> Self {
        Self {
            done: Completion::finished(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Blocks until the sound finished or was dropped; `None` waits forever.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        self.done.wait(timeout)
    }

    /// Whether the sound finished, was cancelled or dropped.
    pub fn is_done(&self) -> bool {
        self.done.is_set()
    }

    /// Stops this sound (or prevents it from starting).
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

enum JobSource {
    File(PathBuf),
    Wav(Vec<u8>),
}

struct Job {
    source: JobSource,
    volume: f32,
    handle: PlaybackHandle,
}

impl Job {
    fn new(source: JobSource, volume: f32) -> Self {
        Self {
            source,
            volume: volume.clamp(0.0, 1.0),
            handle: PlaybackHandle {
                done: Arc::new(Completion::default()),
                cancel: Arc::new(AtomicBool::new(false)),
            },
        }
    }

    /// Marks a job that will never play as finished.
    fn discard(self) {
        self.handle.cancel();
        self.handle.done.set();
    }
}

struct Shared {
    running: AtomicBool,
    stopped: AtomicBool,
    current: Mutex<Option<Arc<AtomicBool>>>,
    last_played: Mutex<HashMap<PathBuf, Instant>>,
    exited: Completion,
}

/// Single-worker playback queue shared by the assistant threads.
pub struct AudioPlayer {
    shared: Arc<Shared>,
    tx: Sender<Job>,
    rx: Receiver<Job>,
    sink: Mutex<Option<Box<dyn AudioSink>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AudioPlayer {
    /// Creates a stopped player; call [`AudioPlayer::start`] once.
    pub fn new(sink: Box<dyn AudioSink>) -> Self {
        let (tx, rx) = bounded(QUEUE_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                current: Mutex::new(None),
                last_played: Mutex::new(HashMap::new()),
                exited: Completion::default(),
            }),
            tx,
            rx,
            sink: Mutex::new(Some(sink)),
            worker: Mutex::new(None),
        }
    }

    /// Spawns the worker thread. Calling it again is a no-op.
    ///
    /// # Errors
    /// Returns an error if the thread cannot be spawned.
    pub fn start(&self) -> Result<()> {
        let Some(mut sink) = self.sink.lock().take() else {
            return Ok(());
        };
        self.shared.running.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let rx = self.rx.clone();
        let handle = std::thread::Builder::new()
            .name("audio-player".into())
            .spawn(move || {
                run_worker(&shared, &rx, sink.as_mut());
                shared.exited.set();
            })?;
        *self.worker.lock() = Some(handle);
        Ok(())
    }

    /// Queues a sound without waiting.
    ///
    /// # Details
    /// Ignored when the same file finished playing less than 350 ms ago.
    /// The returned handle is already complete in that case.
    pub fn play_async(&self, path: impl AsRef<Path>, volume: f32) -> PlaybackHandle {
        let path = path.as_ref();
        if path.as_os_str().is_empty() || self.is_debounced(path) || !self.is_accepting() {
            return PlaybackHandle::finished();
        }
        self.enqueue(Job::new(JobSource::File(path.to_path_buf()), volume))
    }

    /// Plays a sound and waits for it (or for `timeout`).
    ///
    /// # Returns
    /// `true` when playback completed within the timeout.
    pub fn play_blocking(
        &self,
        path: impl AsRef<Path>,
        volume: f32,
        timeout: Option<Duration>,
    ) -> bool {
        let path = path.as_ref();
        if path.as_os_str().is_empty() || !self.is_accepting() {
            return true;
        }
        let handle = self.enqueue(Job::new(JobSource::File(path.to_path_buf()), volume));
        self.wait_for(&handle, timeout)
    }

    /// Plays an in-memory WAV (a synthesized reply) and waits for it.
    pub fn play_wav_bytes(&self, wav: Vec<u8>) -> bool {
        if wav.is_empty() || !self.shared.running.load(Ordering::SeqCst) {
            return false;
        }
        let handle = self.enqueue(Job::new(JobSource::Wav(wav), 1.0));
        self.wait_for(&handle, None) && !handle.cancel.load(Ordering::SeqCst)
    }

    /// Cancels the sound in progress and drops everything queued.
    pub fn stop_current(&self) {
        if let Some(cancel) = self.shared.current.lock().as_ref() {
            cancel.store(true, Ordering::SeqCst);
        }
        self.flush_queue();
    }

    /// Drops queued sounds; the one playing continues.
    pub fn flush_queue(&self) {
        while let Ok(job) = self.rx.try_recv() {
            job.discard();
        }
    }

    /// Stops the worker, waiting up to `join_timeout` for it to exit.
    pub fn shutdown(&self, join_timeout: Duration) {
        self.shared.stopped.store(true, Ordering::SeqCst);
        self.shared.running.store(false, Ordering::SeqCst);
        self.stop_current();
        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if self.shared.exited.wait(Some(join_timeout)) {
            if handle.join().is_err() {
                error!("audio worker panicked");
            }
        } else {
            warn!("audio worker did not stop in time");
        }
    }

    /// Waits for `handle` in short slices so a job queued after the worker
    /// exited is discarded instead of waited on forever.
    ///
    /// # Returns
    /// `true` when the job finished (played, failed or discarded) in time.
    fn wait_for(&self, handle: &PlaybackHandle, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            let slice = deadline.map_or(WAIT_SLICE, |deadline| {
                deadline.saturating_duration_since(Instant::now()).min(WAIT_SLICE)
            });
            if handle.wait(Some(slice)) {
                return true;
            }
            if self.shared.exited.is_set() {
                self.flush_queue();
                return handle.is_done();
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return false;
            }
        }
    }

    fn is_accepting(&self) -> bool {
        !self.shared.stopped.load(Ordering::SeqCst)
    }

    fn is_debounced(&self, path: &Path) -> bool {
        self.shared
            .last_played
            .lock()
            .get(path)
            .is_some_and(|finished| finished.elapsed() < DEBOUNCE)
    }

    /// Queues a job, dropping the oldest one when the queue is full.
    fn enqueue(&self, job: Job) -> PlaybackHandle {
        let handle = job.handle.clone();
        match self.tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                if let Ok(oldest) = self.rx.try_recv() {
                    debug!("audio queue full, dropping oldest sound");
                    oldest.discard();
                }
                if let Err(err) = self.tx.try_send(job) {
                    err.into_inner().discard();
                }
            }
            Err(TrySendError::Disconnected(job)) => job.discard(),
        }
        handle
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        if self.worker.lock().is_some() {
            self.shutdown(Duration::from_secs(2));
        }
    }
}

fn run_worker(shared: &Shared, rx: &Receiver<Job>, sink: &mut dyn AudioSink) {
    while shared.running.load(Ordering::SeqCst) {
        let job = match rx.recv_timeout(IDLE_POLL) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if job.handle.cancel.load(Ordering::SeqCst) {
            job.handle.done.set();
            continue;
        }
        *shared.current.lock() = Some(Arc::clone(&job.handle.cancel));
        if let Err(err) = play_job(&job, sink) {
            error!(%err, "audio playback failed");
        }
        *shared.current.lock() = None;
        if let JobSource::File(path) = &job.source {
            shared.last_played.lock().insert(path.clone(), Instant::now());
        }
        job.handle.done.set();
    }
    while let Ok(job) = rx.try_recv() {
        job.discard();
    }
}

fn play_job(job: &Job, sink: &mut dyn AudioSink) -> Result<()> {
    let bytes = match &job.source {
        JobSource::File(path) => match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "missing audio file");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        },
        JobSource::Wav(bytes) => bytes.clone(),
    };
    let (mut pcm, rate) = wav_to_pcm(&bytes)?;
    if job.volume < UNITY_VOLUME {
        scale_volume(&mut pcm, job.volume);
    }
    sink.play(&pcm, rate, &job.handle.cancel)
}

/// Plays through the default CPAL output device.
pub struct CpalSink {
    frames_per_buffer: usize,
}

impl CpalSink {
    /// Creates a sink for the default output device.
    ///
    /// # Arguments
    /// * `frames_per_buffer` - Frames written per chunk, at least 64. Smaller
    ///   buffers make [`AudioPlayer::stop_current`] cut in sooner.
    pub fn new(frames_per_buffer: usize) -> Self {
        Self {
            frames_per_buffer: frames_per_buffer.max(64),
        }
    }
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl AudioSink for CpalSink {
    fn play(&mut self, pcm: &[i16], sample_rate: u32, cancel: &AtomicBool) -> Result<()> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| RobotError::AudioDevice("no output device".into()))?;
        let config: StreamConfig = device
            .default_output_config()
            .map_err(RobotError::device)?
            .into();
        let channels = config.channels as usize;
        let samples = resample(pcm, sample_rate, config.sample_rate.0);

        let buffer: Arc<Mutex<std::collections::VecDeque<f32>>> = Arc::default();
        let feed = Arc::clone(&buffer);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &_| {
                    let mut queue = feed.lock();
                    for frame in data.chunks_mut(channels) {
                        let value = queue.pop_front().unwrap_or(0.0);
                        frame.fill(value);
                    }
                },
                |err| error!(%err, "audio output stream error"),
                None,
            )
            .map_err(RobotError::device)?;
        stream.play().map_err(RobotError::device)?;

        let block = self.frames_per_buffer;
        let sleep = Duration::from_secs_f64(block as f64 / config.sample_rate.0.max(1) as f64 / 2.0);
        for chunk in samples.chunks(block) {
            while buffer.lock().len() > block * 2 {
                if cancel.load(Ordering::SeqCst) {
                    return Ok(());
                }
                std::thread::sleep(sleep);
            }
            if cancel.load(Ordering::SeqCst) {
                return Ok(());
            }
            buffer
                .lock()
                .extend(chunk.iter().map(|&s| s as f32 / i16::MAX as f32));
        }
        while !buffer.lock().is_empty() && !cancel.load(Ordering::SeqCst) {
            std::thread::sleep(sleep);
        }
        Ok(())
    }
}
