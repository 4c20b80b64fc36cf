//! The looping alarm sound.
//!
//! One [`AlarmPlayer`] owns the program's only audio output. Due reminders
//! and the settings preview both go through it; whoever started last owns
//! playback and any `stop()` silences it.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::AudioError;
use crate::models::TaskId;

/// What the alarm plays.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SoundSource {
    /// Built-in alarm (terminal bell).
    #[default]
    Default,
    /// A user-supplied audio file.
    File(PathBuf),
}

impl SoundSource {
    pub fn from_setting(path: Option<PathBuf>) -> Self {
        path.map_or(SoundSource::Default, SoundSource::File)
    }
}

/// Who started the current playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOwner {
    Alarm(TaskId),
    Preview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Playing,
    /// The backend refused to play; the caller should fall back to
    /// vibration or a visual signal.
    Blocked,
}

/// Platform audio output.
///
/// `play` starts one pass of the sound from the beginning; looping is the
/// player's job.
pub trait AudioSink {
    fn play(&mut self, source: &SoundSource, volume: f32) -> Result<(), AudioError>;
    /// Stops output and rewinds. Must be safe to call when idle.
    fn stop(&mut self);
    /// Whether the current pass is still sounding.
    fn is_playing(&mut self) -> bool;
    fn release(&mut self);
}

pub struct AlarmPlayer {
    sink: Option<Box<dyn AudioSink>>,
    source: SoundSource,
    /// Source of the pass in flight; loop restarts reuse it.
    active_source: Option<SoundSource>,
    volume: f32,
    owner: Option<PlaybackOwner>,
    unlocked: bool,
}

impl AlarmPlayer {
    pub fn new(sink: Box<dyn AudioSink>, source: SoundSource) -> Self {
        Self {
            sink: Some(sink),
            source,
            active_source: None,
            volume: 1.0,
            owner: None,
            unlocked: false,
        }
    }

    pub fn source(&self) -> &SoundSource {
        &self.source
    }

    /// Changes the sound. A pass already playing finishes with the old one;
    /// the new source is used from the next start.
    pub fn set_source(&mut self, source: SoundSource) {
        debug!(?source, "alarm sound changed");
        self.source = source;
    }

    pub fn owner(&self) -> Option<PlaybackOwner> {
        self.owner
    }

    pub fn is_active(&self) -> bool {
        self.owner.is_some()
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn start_alarm(&mut self, task: TaskId) -> PlaybackOutcome {
        self.start(PlaybackOwner::Alarm(task))
    }

    pub fn start_preview(&mut self) -> PlaybackOutcome {
        self.start(PlaybackOwner::Preview)
    }

    /// Plays from the start at full volume and keeps looping until
    /// [`AlarmPlayer::stop`].
    pub fn start(&mut self, owner: PlaybackOwner) -> PlaybackOutcome {
        let Some(sink) = self.sink.as_mut() else {
            debug!("alarm start ignored, audio output released");
            return PlaybackOutcome::Blocked;
        };
        sink.stop();
        self.volume = 1.0;
        match sink.play(&self.source, self.volume) {
            Ok(()) => {
                self.owner = Some(owner);
                self.active_source = Some(self.source.clone());
                PlaybackOutcome::Playing
            }
            Err(e) => {
                warn!(error = %e, ?owner, "alarm playback blocked");
                self.owner = None;
                self.active_source = None;
                PlaybackOutcome::Blocked
            }
        }
    }

    /// Pauses and rewinds. Calling it while idle does nothing.
    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.as_mut() {
            sink.stop();
        }
        if let Some(owner) = self.owner.take() {
            debug!(?owner, "alarm stopped");
        }
        self.active_source = None;
    }

    /// Restarts the sound when a pass has ended. Called every tick.
    pub fn pump(&mut self) {
        if self.owner.is_none() {
            return;
        }
        let (Some(sink), Some(source)) = (self.sink.as_mut(), self.active_source.as_ref()) else {
            return;
        };
        if sink.is_playing() {
            return;
        }
        if let Err(e) = sink.play(source, self.volume) {
            warn!(error = %e, "alarm loop interrupted");
            self.owner = None;
            self.active_source = None;
        }
    }

    /// Unlocks audio on the first user interaction.
    ///
    /// Plays silently, stops at once and restores the volume. A rejected
    /// probe is logged and retried on the next gesture. Returns whether
    /// audio is unlocked afterwards.
    pub fn on_user_gesture(&mut self) -> bool {
        if self.unlocked {
            return true;
        }
        if self.owner.is_some() {
            // Already sounding, nothing to unlock.
            self.unlocked = true;
            return true;
        }
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };
        let restore = self.volume;
        self.volume = 0.0;
        let probe = sink.play(&self.source, self.volume);
        sink.stop();
        self.volume = if restore > 0.0 { restore } else { 1.0 };
        match probe {
            Ok(()) => {
                self.unlocked = true;
                info!("audio output unlocked for reminders");
            }
            Err(e) => info!(error = %e, "audio unlock failed, waiting for next interaction"),
        }
        self.unlocked
    }

    /// Stops playback and frees the output. Later starts are `Blocked`.
    pub fn dispose(&mut self) {
        self.stop();
        if let Some(mut sink) = self.sink.take() {
            sink.release();
            debug!("audio output released");
        }
    }
}

impl Drop for AlarmPlayer {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// External players tried in order for custom sound files.
const PLAYERS: [&str; 4] = ["paplay", "afplay", "ffplay", "aplay"];

/// Real output: the terminal bell for the built-in sound, an external
/// player process for custom files.
#[derive(Default)]
pub struct SystemSink {
    child: Option<Child>,
    released: bool,
}

impl SystemSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn ring_bell(volume: f32) -> Result<(), AudioError> {
        if volume <= 0.0 {
            return Ok(());
        }
        let mut err = std::io::stderr();
        err.write_all(b"\x07")?;
        err.flush()?;
        Ok(())
    }

    fn spawn_player(path: &Path, volume: f32) -> Result<Option<Child>, AudioError> {
        let (player, bin) = PLAYERS
            .iter()
            .find_map(|p| which::which(p).ok().map(|bin| (*p, bin)))
            .ok_or_else(|| AudioError::NoPlayer(path.to_path_buf()))?;
        let mut cmd = Command::new(bin);
        match player {
            "paplay" => {
                cmd.arg(format!("--volume={}", (volume.clamp(0.0, 1.0) * 65536.0) as u32));
            }
            "afplay" => {
                cmd.args(["-v", &format!("{:.2}", volume.clamp(0.0, 1.0))]);
            }
            "ffplay" => {
                cmd.args(["-nodisp", "-autoexit", "-loglevel", "quiet", "-volume"])
                    .arg(((volume.clamp(0.0, 1.0) * 100.0) as u32).to_string());
            }
            _ => {
                // aplay has no volume control; a silent pass is just a lookup.
                if volume <= 0.0 {
                    return Ok(None);
                }
                cmd.arg("-q");
            }
        }
        let child = cmd
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        debug!(player, path = %path.display(), "started audio player");
        Ok(Some(child))
    }
}

impl AudioSink for SystemSink {
    fn play(&mut self, source: &SoundSource, volume: f32) -> Result<(), AudioError> {
        if self.released {
            return Err(AudioError::Released);
        }
        self.stop();
        match source {
            SoundSource::Default => Self::ring_bell(volume),
            SoundSource::File(path) => {
                self.child = Self::spawn_player(path, volume)?;
                Ok(())
            }
        }
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn is_playing(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn release(&mut self) {
        self.stop();
        self.released = true;
    }
}
