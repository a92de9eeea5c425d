/*
 * @file state.rs
 * @brief Shared assistant run state
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

//! Shared run state of the assistant, read by the main loop, the barge-in
//! listener and the eye renderer.

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::audio::AudioPlayer;

#[derive(Debug)]
struct Flags {
    listening: bool,
    active: bool,
    speaking: bool,
    allow_listening_to_user: bool,
}

/// Thread-safe listening/speaking/interruption flags.
#[derive(Debug)]
pub struct SystemState {
    allow_interruption: bool,
    flags: Mutex<Flags>,
}

impl SystemState {
    /// # Arguments
    /// * `allow_interruption` - Whether barge-in may ever be enabled.
    pub fn new(allow_interruption: bool) -> Self {
        Self {
            allow_interruption,
            flags: Mutex::new(Flags {
                listening: true,
                active: true,
                speaking: false,
                allow_listening_to_user: false,
            }),
        }
    }

    /// Stops the main loop from recording.
    ///
    /// # Details
    /// Set while a reply is spoken so the robot does not hear itself.
    pub fn pause_listening(&self) {
        self.flags.lock().listening = false;
    }

    /// Lets the main loop record again.
    pub fn resume_listening(&self) {
        self.flags.lock().listening = true;
    }

    /// Listening and not shutting down.
    pub fn should_listen(&self) -> bool {
        let flags = self.flags.lock();
        flags.listening && flags.active
    }

    /// `false` once [`SystemState::stop_system`] was called.
    pub fn is_active(&self) -> bool {
        self.flags.lock().active
    }

    /// Closes the barge-in window (the main loop is recording).
    pub fn pause_interruption(&self) {
        self.flags.lock().allow_listening_to_user = false;
    }

    /// Opens the barge-in window, if interruption is enabled at all.
    pub fn resume_interruption(&self) {
        debug!(allow_interruption = self.allow_interruption, "resume interruption");
        self.flags.lock().allow_listening_to_user = self.allow_interruption;
    }

    /// Whether the barge-in listener should be recording now.
    pub fn interruption_open(&self) -> bool {
        self.flags.lock().allow_listening_to_user
    }

    /// Marks whether a reply is playing.
    pub fn set_speaking(&self, speaking: bool) {
        self.flags.lock().speaking = speaking;
    }

    pub fn is_speaking(&self) -> bool {
        self.flags.lock().speaking
    }

    /// Asks every loop to exit.
    pub fn stop_system(&self) {
        self.flags.lock().active = false;
    }

    /// Stops all sound immediately and gets ready for new input.
    pub fn interrupt(&self, player: &AudioPlayer) {
        info!("interrupt: stopping playback");
        player.stop_current();
        player.flush_queue();
        let mut flags = self.flags.lock();
        flags.speaking = false;
        flags.listening = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::player::tests::FakeSink;

    #[test]
    fn starts_listening_and_active() {
        let state = SystemState::new(true);
        assert!(state.should_listen());
        assert!(!state.is_speaking());
        assert!(!state.interruption_open());
    }

    #[test]
    fn pause_and_stop_block_listening() {
        let state = SystemState::new(false);
        state.pause_listening();
        assert!(!state.should_listen());
        state.resume_listening();
        assert!(state.should_listen());
        state.stop_system();
        assert!(!state.should_listen());
        assert!(!state.is_active());
    }

    #[test]
    fn interruption_respects_the_setting() {
        let disabled = SystemState::new(false);
        disabled.resume_interruption();
        assert!(!disabled.interruption_open());

        let enabled = SystemState::new(true);
        enabled.resume_interruption();
        assert!(enabled.interruption_open());
        enabled.pause_interruption();
        assert!(!enabled.interruption_open());
    }

    #[test]
    fn interrupt_resets_speaking_and_listening() {
        let player = AudioPlayer::new(Box::new(FakeSink::default()));
        let state = SystemState::new(true);
        state.set_speaking(true);
        state.pause_listening();
        state.interrupt(&player);
        assert!(!state.is_speaking());
        assert!(state.should_listen());
    }
}
