//! System notifications and vibration for due reminders.
//!
//! Everything here is best effort: a missing backend or a refused
//! permission is logged and skipped, never reported to the scanner.

use std::io::Write;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

use crate::error::NotifyError;
use crate::scanner::DueEvent;

/// Pattern played alongside every due notification, in milliseconds
/// (on, off, on, ...).
pub const DUE_PATTERN: [u64; 5] = [500, 200, 500, 200, 1000];

/// Shorter pattern used when the alarm sound was blocked.
pub const FALLBACK_PATTERN: [u64; 3] = [500, 200, 500];

pub const DEFAULT_BODY: &str = "Time to get this task done!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationOptions {
    /// Keep the notification on screen until the user interacts with it.
    pub require_interaction: bool,
}

/// A way of showing a notification to the user.
pub trait Notifier {
    fn name(&self) -> &'static str;
    /// Survives the program being in the background.
    fn is_background_capable(&self) -> bool;
    fn is_available(&self) -> bool;
    fn show(&self, title: &str, body: &str, options: &NotificationOptions) -> Result<(), NotifyError>;
}

/// Device vibration; `vibrate` returns `false` when unsupported.
pub trait Vibrator {
    fn vibrate(&self, pattern: &[u64]) -> bool;
}

/// Terminals cannot vibrate.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVibration;

impl Vibrator for NoVibration {
    fn vibrate(&self, _pattern: &[u64]) -> bool {
        false
    }
}

/// Desktop notification through `notify-send` (Linux) or `osascript`
/// (macOS).
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn command(title: &str, body: &str, options: &NotificationOptions) -> Option<Command> {
        if cfg!(target_os = "macos") {
            let bin = which::which("osascript").ok()?;
            let mut cmd = Command::new(bin);
            cmd.arg("-e").arg(format!(
                "display notification {} with title {}",
                applescript_string(body),
                applescript_string(title)
            ));
            return Some(cmd);
        }
        let bin = which::which("notify-send").ok()?;
        let mut cmd = Command::new(bin);
        cmd.args(["--app-name", "DailyFocus"]);
        if options.require_interaction {
            cmd.args(["--urgency", "critical", "--expire-time", "0"]);
        }
        cmd.arg(title).arg(body);
        Some(cmd)
    }
}

fn applescript_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl Notifier for DesktopNotifier {
    fn name(&self) -> &'static str {
        "desktop"
    }

    fn is_background_capable(&self) -> bool {
        true
    }

    fn is_available(&self) -> bool {
        let bin = if cfg!(target_os = "macos") { "osascript" } else { "notify-send" };
        which::which(bin).is_ok()
    }

    fn show(&self, title: &str, body: &str, options: &NotificationOptions) -> Result<(), NotifyError> {
        let mut cmd = Self::command(title, body, options).ok_or(NotifyError::Unavailable)?;
        let status = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(NotifyError::Exit(status))
        }
    }
}

/// Foreground fallback: a line on stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn is_background_capable(&self) -> bool {
        false
    }

    fn is_available(&self) -> bool {
        true
    }

    fn show(&self, title: &str, body: &str, _options: &NotificationOptions) -> Result<(), NotifyError> {
        let mut err = std::io::stderr();
        writeln!(err, "{title}: {body}")?;
        Ok(())
    }
}

pub struct NotificationDispatcher {
    notifiers: Vec<Box<dyn Notifier>>,
    vibrator: Box<dyn Vibrator>,
    permission_granted: bool,
}

impl NotificationDispatcher {
    pub fn new(
        notifiers: Vec<Box<dyn Notifier>>,
        vibrator: Box<dyn Vibrator>,
        permission_granted: bool,
    ) -> Self {
        Self {
            notifiers,
            vibrator,
            permission_granted,
        }
    }

    /// Desktop notifications first, the terminal as fallback.
    pub fn system(permission_granted: bool) -> Self {
        Self::new(
            vec![Box::new(DesktopNotifier), Box::new(TerminalNotifier)],
            Box::new(NoVibration),
            permission_granted,
        )
    }

    pub fn set_permission(&mut self, granted: bool) {
        self.permission_granted = granted;
    }

    /// Shows the reminder and vibrates. Returns the notifier that
    /// delivered it, if any.
    pub fn dispatch(&self, event: &DueEvent) -> Option<&'static str> {
        let delivered = if self.permission_granted {
            self.show(event)
        } else {
            debug!(task = %event.task_id, "notification permission not granted");
            None
        };
        self.vibrate(&DUE_PATTERN);
        delivered
    }

    /// Vibration-only signal for when the alarm sound could not play.
    pub fn fallback(&self) {
        self.vibrate(&FALLBACK_PATTERN);
    }

    fn show(&self, event: &DueEvent) -> Option<&'static str> {
        let title = format!("⏰ {}", event.title);
        let body = event
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(DEFAULT_BODY);
        let options = NotificationOptions {
            require_interaction: true,
        };
        // Background-capable paths first; the rest in the given order.
        let mut ordered: Vec<&dyn Notifier> = self.notifiers.iter().map(|n| n.as_ref()).collect();
        ordered.sort_by_key(|n| !n.is_background_capable());
        for notifier in ordered.into_iter().filter(|n| n.is_available()) {
            match notifier.show(&title, body, &options) {
                Ok(()) => {
                    debug!(task = %event.task_id, notifier = notifier.name(), "notification shown");
                    return Some(notifier.name());
                }
                Err(e) => warn!(notifier = notifier.name(), error = %e, "notification failed"),
            }
        }
        None
    }

    fn vibrate(&self, pattern: &[u64]) {
        if !self.vibrator.vibrate(pattern) {
            debug!("vibration not supported");
        }
    }
}
