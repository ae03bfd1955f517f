//! Desktop notifications for hook-driven backups.
//!
//! Hooks run far from a terminal, so the only feedback channel a failed
//! backup has is the desktop. Delivery is strictly best-effort: a missing
//! notification tool must never fail a backup, let alone a git operation.

use std::io;
use std::process::Command;

/// Sends a desktop notification. `sound` may be empty.
pub trait Notifier {
    fn send(&self, title: &str, message: &str, sound: &str) -> io::Result<()>;
}

/// Platform notifier: `osascript` on macOS, `notify-send` on Linux, a no-op
/// elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    #[cfg(target_os = "macos")]
    fn send(&self, title: &str, message: &str, sound: &str) -> io::Result<()> {
        let mut script = format!(
            "display notification {} with title {}",
            applescript_quote(message),
            applescript_quote(title)
        );
        if !sound.is_empty() && sound != "none" {
            script.push_str(&format!(" sound name {}", applescript_quote(sound)));
        }
        Command::new("osascript").args(["-e", &script]).output()?;
        Ok(())
    }

    #[cfg(target_os = "linux")]
    fn send(&self, title: &str, message: &str, _sound: &str) -> io::Result<()> {
        Command::new("notify-send")
            .args(["--app-name=devback", title, message])
            .output()?;
        Ok(())
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    fn send(&self, _title: &str, _message: &str, _sound: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Notifier that swallows everything; used with `--no-notify` and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send(&self, _title: &str, _message: &str, _sound: &str) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn applescript_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
