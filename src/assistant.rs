/*
 * @file assistant.rs
 * @brief Main listen and respond loop with barge-in
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

//! Voice assistant runtime: listen, understand, answer, speak.
//!
//! One async main loop records an utterance, transcribes it, checks the
//! wake word and local commands, asks the n8n agent and speaks the reply.
//! An optional barge-in thread listens in short windows for "stop" while
//! the robot is thinking or talking.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::ai::N8nClient;
use crate::audio::wav::pcm_to_wav;
use crate::audio::{AudioPlayer, ChunkSource, CpalSink, Microphone, VadParams, record_until_silence};
use crate::config::{Config, Settings};
use crate::error::RobotError;
use crate::eyes::{self, EyeState};
use crate::speech::{AudioFormat, SpeechToText, TextToSpeech};
use crate::state::SystemState;
use crate::text::local_commands::{Action, LocalCommandHandler};
use crate::text::stop_command::StopCommandDetector;
use crate::text::wake_word::WakeWordDetector;

const WELCOME_SOUND: &str = "zico_welcome.wav";
const BELL_SOUND: &str = "bell.wav";
const YES_HOW_HELP_SOUND: &str = "yes_how_help.wav";
const THINKING_SOUND: &str = "thinking.wav";
const GOT_IT_SOUND: &str = "got_it.wav";
const LISTENING_SOUND: &str = "listening.wav";

/// Volume of prompt sounds.
const PROMPT_VOLUME: f32 = 1.0;

/// Upper bound on waiting for a prompt sound.
const PROMPT_TIMEOUT: Duration = Duration::from_secs(15);

/// Back-off after a failed loop iteration.
const LOOP_ERROR_DELAY: Duration = Duration::from_millis(200);

/// Poll interval while listening is paused.
const PAUSED_POLL: Duration = Duration::from_millis(100);

/// Pause after an empty barge-in window.
const BARGE_IN_IDLE: Duration = Duration::from_millis(50);

/// Pause after a barge-in read error.
const BARGE_IN_ERROR_DELAY: Duration = Duration::from_millis(100);

/// Pause after a successful barge-in before listening again.
const BARGE_IN_COOLDOWN: Duration = Duration::from_millis(300);

/// Join timeout of the audio worker at shutdown.
const PLAYER_SHUTDOWN: Duration = Duration::from_secs(2);

/// Microphone reader shared between the loop and its blocking tasks.
type SharedSource = Arc<Mutex<Box<dyn ChunkSource + Send>>>;

/// Starts every component and runs the assistant until ctrl-c.
///
/// # Errors
/// Fails when the audio devices, HTTP clients or worker threads cannot be
/// set up. Errors inside the loop are logged and the loop keeps going.
pub async fn run(settings: Settings, config: Config) -> Result<()> {
    if config.rec_width != 2 {
        warn!(width = config.rec_width, "only 16-bit capture is supported, recording 16-bit");
    }
    let player = Arc::new(AudioPlayer::new(Box::new(CpalSink::default())));
    player.start().context("starting audio player")?;
    let microphone = Microphone::open(config.rec_sample_rate, config.rec_channels, config.rec_chunk)
        .context("opening microphone")?;
    let state = Arc::new(SystemState::new(settings.allow_interruption));
    let eye_state = Arc::new(EyeState::new(true));

    let http = speech_client(&config)?;
    let stt = SpeechToText::new(http.clone(), &config.server_api_url);
    let tts = TextToSpeech::new(http, &config.server_api_url);
    let n8n = N8nClient::from_config(&config).context("building n8n client")?;

    let barge_in = if settings.allow_interruption {
        let listener = BargeIn {
            state: Arc::clone(&state),
            player: Arc::clone(&player),
            source: Box::new(microphone.subscribe()),
            stt: stt.clone(),
            stop: StopCommandDetector::new(Some(WakeWordDetector::standard()?))?,
            runtime: tokio::runtime::Handle::current(),
            listening_sound: config.voice_msg(LISTENING_SOUND),
        };
        Some(listener.spawn().context("starting barge-in listener")?)
    } else {
        warn!("Interruption disabled, skipping barge-in listener");
        None
    };
    let eye_thread = eyes::spawn(&settings, &config, Arc::clone(&eye_state))?;

    let main_source: Box<dyn ChunkSource + Send> = Box::new(microphone.subscribe());
    let mut assistant = Assistant::new(
        settings,
        config,
        Arc::new(Mutex::new(main_source)),
        Arc::clone(&player),
        Arc::clone(&state),
        Arc::clone(&eye_state),
        Services { stt, tts, n8n },
    )?;
    info!("System ready! Start with 'Zico ...' or 'زيكو ...'");

    tokio::select! {
        result = assistant.run_loop() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for ctrl-c")?;
            info!("Shutting down system...");
        }
    }

    state.stop_system();
    eye_state.stop();
    player.shutdown(PLAYER_SHUTDOWN);
    assistant.log_stats();
    drop(assistant);
    drop(microphone);
    if let Some(handle) = eye_thread {
        if handle.join().is_err() {
            error!("eye thread panicked");
        }
    }
    if barge_in.is_some() {
        debug!("barge-in listener detached");
    }
    info!("System stopped successfully");
    Ok(())
}

fn speech_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("building speech client")
}

/// Remote services used by the main loop.
pub struct Services {
    pub stt: SpeechToText,
    pub tts: TextToSpeech,
    pub n8n: N8nClient,
}

/// What the main loop does with a transcript.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Turn {
    /// Nothing to do (no wake word while one is required).
    Ignore,
    /// "stop" and friends.
    Stop,
    /// Wake word alone; ask the user what they need.
    Prompt,
    /// A request for the local handler and the agent.
    Request(String),
}

/// Decides how to treat a transcript.
///
/// # Arguments
/// * `text` - Transcript of one recording.
/// * `require_wake_word` - When set, text without the wake word is ignored.
/// * `wake` - Wake word matcher; the remainder becomes the request.
/// * `stop` - Stop phrase matcher, checked first.
///
/// # Returns
/// * `Turn` - Stop, ignore, prompt for more, or a request to answer.
pub(crate) fn classify(
    text: &str,
    require_wake_word: bool,
    wake: &WakeWordDetector,
    stop: &StopCommandDetector,
) -> Turn {
    if stop.is_stop_command(text) {
        return Turn::Stop;
    }
    let message = if require_wake_word {
        match wake.extract_after_wake(text) {
            Some(found) => found.remainder,
            None => return Turn::Ignore,
        }
    } else {
        text.trim().to_string()
    };
    if message.is_empty() {
        Turn::Prompt
    } else {
        Turn::Request(message)
    }
}

/// State owned by the main loop.
pub struct Assistant {
    settings: Settings,
    config: Config,
    source: SharedSource,
    player: Arc<AudioPlayer>,
    state: Arc<SystemState>,
    eyes: Arc<EyeState>,
    services: Services,
    wake: WakeWordDetector,
    stop: StopCommandDetector,
    local: LocalCommandHandler,
    vad: VadParams,
    first_iteration: bool,
}

impl Assistant {
    /// # Errors
    /// Fails if the text detectors cannot compile their patterns.
    pub fn new(
        settings: Settings,
        config: Config,
        source: SharedSource,
        player: Arc<AudioPlayer>,
        state: Arc<SystemState>,
        eyes: Arc<EyeState>,
        services: Services,
    ) -> Result<Self> {
        let local = LocalCommandHandler::new(config.language, true)?;
        Ok(Self {
            settings,
            config,
            source,
            player,
            state,
            eyes,
            services,
            wake: WakeWordDetector::standard()?,
            stop: StopCommandDetector::new(None)?,
            local,
            vad: VadParams::utterance(),
            first_iteration: true,
        })
    }

    /// Plays the welcome sound and loops until the system stops.
    pub async fn run_loop(&mut self) -> Result<()> {
        info!("============================================================");
        info!("AI assistant started. Wake word: Ziko / زيكو");
        info!("Say 'Ziko ...' or 'زيكو ...' to issue a command.");
        info!("Say 'stop' or 'توقف' anytime to cancel.");
        info!("============================================================");
        self.play_prompt(WELCOME_SOUND).await;
        loop {
            match self.process_iteration().await {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(err) => {
                    error!(error = %format!("{err:#}"), "loop error");
                    tokio::time::sleep(LOOP_ERROR_DELAY).await;
                }
            }
        }
    }

    /// Executes one listen-transcribe-respond iteration.
    ///
    /// # Returns
    /// * `Ok(true)` to keep looping, `Ok(false)` once the system is stopping.
    ///
    /// # Errors
    /// Surfaces failures the loop should log before trying again.
    pub async fn process_iteration(&mut self) -> Result<bool> {
        if !self.state.is_active() {
            return Ok(false);
        }
        self.state.pause_interruption();
        if !self.state.should_listen() {
            debug!("not listening");
            tokio::time::sleep(PAUSED_POLL).await;
            return Ok(true);
        }
        if !self.first_iteration {
            self.play_prompt(BELL_SOUND).await;
        }
        self.first_iteration = false;

        info!("Listening...");
        let Some(user_text) = self.listen().await? else {
            return Ok(true);
        };
        info!(user = %user_text, "transcribed");

        let message = match classify(&user_text, self.settings.allow_wake_word, &self.wake, &self.stop) {
            Turn::Stop => {
                self.state.interrupt(&self.player);
                warn!("Stop command detected, cancelled speech");
                return Ok(true);
            }
            Turn::Ignore => {
                info!("Ignored (no wake word)");
                return Ok(true);
            }
            Turn::Prompt => {
                self.play_prompt(YES_HOW_HELP_SOUND).await;
                return Ok(true);
            }
            Turn::Request(message) => message,
        };
        debug!(%message, "user message");

        let outcome = self.local.handle(&message);
        debug!(forward = outcome.forward, response = ?outcome.response, action = ?outcome.action, "local command");
        match outcome.action {
            Some(Action::Pause) => info!("pause requested"),
            Some(Action::Resume) => info!("resume requested"),
            None => {}
        }
        if let Some(reply) = &outcome.response {
            info!(reply = %reply, "local response");
            self.speak(reply).await;
        }

        if outcome.forward && self.state.should_listen() {
            self.state.resume_interruption();
            if outcome.response.is_none() {
                self.player
                    .play_async(self.config.voice_msg(THINKING_SOUND), PROMPT_VOLUME);
            }
            info!("Processing with AI...");
            let prompt = if outcome.passthrough.is_empty() {
                message.as_str()
            } else {
                outcome.passthrough.as_str()
            };
            let reply = self.services.n8n.chat(&self.config.session_id, prompt).await;
            if !reply.trim().is_empty() {
                info!(reply = %reply, "AI response");
                self.player
                    .play_async(self.config.voice_msg(GOT_IT_SOUND), PROMPT_VOLUME);
                self.speak(&reply).await;
            }
            self.state.pause_interruption();
        }
        Ok(true)
    }

    /// Records one utterance and transcribes it.
    ///
    /// # Returns
    /// `None` when nothing usable was heard.
    async fn listen(&self) -> Result<Option<String>> {
        let source = Arc::clone(&self.source);
        let vad = self.vad.clone();
        let recorded = tokio::task::spawn_blocking(move || {
            let mut source = source.lock();
            source.discard_pending();
            let pcm = record_until_silence(&mut **source, &vad)?;
            Ok::<_, RobotError>((pcm, source.sample_rate()))
        })
        .await?;
        let (pcm, sample_rate) = match recorded {
            Ok(recorded) => recorded,
            Err(RobotError::Closed(what)) => {
                info!(what, "audio source closed");
                self.state.stop_system();
                return Ok(None);
            }
            Err(err) => return Err(err).context("recording"),
        };
        if pcm.is_empty() {
            warn!("No audio recorded");
            return Ok(None);
        }

        let wav = pcm_to_wav(&pcm, sample_rate, 1).context("encoding WAV")?;
        debug!(bytes = wav.len(), "audio ready");
        match self.services.stt.transcribe(&wav, None).await {
            Ok(text) if text.trim().is_empty() => {
                warn!("Empty transcription");
                Ok(None)
            }
            Ok(text) => Ok(Some(text)),
            Err(err) => {
                error!(%err, "STT error");
                Ok(None)
            }
        }
    }

    /// Synthesizes `text` and plays it, replacing any sound in progress.
    async fn speak(&self, text: &str) {
        let wav = match self.services.tts.synthesize(text, AudioFormat::Wav, None).await {
            Ok(wav) if wav.is_empty() => {
                error!("No audio generated");
                return;
            }
            Ok(wav) => wav,
            Err(err) => {
                error!(%err, "TTS error");
                return;
            }
        };

        self.player.stop_current();
        self.state.set_speaking(true);
        self.eyes.set_talking(true);
        info!("Playing response...");
        let player = Arc::clone(&self.player);
        let finished = tokio::task::spawn_blocking(move || player.play_wav_bytes(wav))
            .await
            .unwrap_or(false);
        self.state.set_speaking(false);
        self.eyes.set_talking(false);
        if finished {
            info!("Playback finished");
        } else {
            warn!("Playback interrupted");
        }
    }

    /// Plays a prompt sound and waits for it.
    async fn play_prompt(&self, name: &str) {
        let player = Arc::clone(&self.player);
        let path = self.config.voice_msg(name);
        let played = tokio::task::spawn_blocking(move || {
            player.play_blocking(&path, PROMPT_VOLUME, Some(PROMPT_TIMEOUT))
        })
        .await;
        if !matches!(played, Ok(true)) {
            warn!(sound = name, "prompt sound did not finish");
        }
    }

    /// Logs the local command counters.
    pub fn log_stats(&self) {
        if let Some(stats) = self.local.stats() {
            info!(
                total = stats.total_commands,
                local = stats.local_handled,
                forwarded = stats.api_forwarded,
                pauses = stats.pause_count,
                resumes = stats.resume_count,
                "local command statistics"
            );
        }
    }
}

/// Listens for "stop" in short windows while the robot thinks or talks.
struct BargeIn {
    state: Arc<SystemState>,
    player: Arc<AudioPlayer>,
    source: Box<dyn ChunkSource + Send>,
    stt: SpeechToText,
    stop: StopCommandDetector,
    runtime: tokio::runtime::Handle,
    listening_sound: PathBuf,
}

impl BargeIn {
    fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("barge-in".into())
            .spawn(move || self.run())
    }

    fn run(mut self) {
        info!("barge-in listener started");
        let mut was_open = false;
        while self.state.is_active() {
            if !self.state.interruption_open() {
                was_open = false;
                std::thread::sleep(BARGE_IN_IDLE);
                continue;
            }
            if !was_open {
                self.source.discard_pending();
                was_open = true;
            }
            match self.listen_once() {
                Ok(_) => {}
                Err(RobotError::Closed(_)) => break,
                Err(err) => {
                    debug!(%err, "barge-in window failed");
                    std::thread::sleep(BARGE_IN_ERROR_DELAY);
                }
            }
        }
        info!("barge-in listener stopped");
    }

    /// Records one window and interrupts playback on a stop command.
    ///
    /// # Returns
    /// `true` when the robot was interrupted.
    fn listen_once(&mut self) -> crate::error::Result<bool> {
        let pcm = record_until_silence(self.source.as_mut(), &VadParams::barge_in())?;
        if pcm.is_empty() {
            std::thread::sleep(BARGE_IN_IDLE);
            return Ok(false);
        }
        let wav = pcm_to_wav(&pcm, self.source.sample_rate(), 1)?;
        let partial = match self.runtime.block_on(self.stt.transcribe(&wav, None)) {
            Ok(text) => text,
            Err(err) => {
                debug!(%err, "barge-in transcription failed");
                return Ok(false);
            }
        };
        if partial.trim().is_empty() || !self.stop.is_stop_with_optional_wake(&partial) {
            return Ok(false);
        }

        self.state.interrupt(&self.player);
        warn!("BARGE-IN: stop detected");
        self.player
            .play_blocking(&self.listening_sound, PROMPT_VOLUME, Some(PROMPT_TIMEOUT));
        self.state.resume_listening();
        std::thread::sleep(BARGE_IN_COOLDOWN);
        Ok(true)
    }
}
