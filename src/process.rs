//! # Process Probes
//!
//! Small OS-specific helpers the lock validator relies on: the current PID,
//! a best-effort liveness probe, and an opaque per-process start token that
//! defeats PID reuse.
//!
//! The start token is intentionally opaque: two observations of the same
//! live process must produce the same string, and a recycled PID must
//! produce a different one. Platforms that cannot provide a token return
//! `None`, and the validator falls back to plain liveness.

/// Returns the current process id.
pub fn pid() -> u32 {
    std::process::id()
}

/// True when a process with `pid` appears to be alive.
pub fn is_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    platform::is_alive(pid)
}

/// Returns an opaque anti-PID-reuse token for `pid`, or `None` when the
/// platform cannot provide one.
pub fn start_id(pid: u32) -> Option<String> {
    if pid == 0 {
        return None;
    }
    platform::start_id(pid)
}

#[cfg(target_os = "linux")]
mod platform {
    use std::path::Path;

    pub fn is_alive(pid: u32) -> bool {
        Path::new(&format!("/proc/{}", pid)).exists()
    }

    /// `ticks:<field 22 of /proc/<pid>/stat>`, the process start time in
    /// clock ticks since boot.
    pub fn start_id(pid: u32) -> Option<String> {
        let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
        // The comm field (2) may contain spaces and parentheses; fields are
        // only well-defined after its closing paren.
        let after_comm = &stat[stat.rfind(')')? + 1..];
        // after_comm holds fields 3.. ; starttime is field 22 overall.
        let ticks = after_comm.split_whitespace().nth(19)?;
        ticks.parse::<u64>().ok()?;
        Some(format!("ticks:{}", ticks))
    }
}

#[cfg(all(unix, not(target_os = "linux")))]
mod platform {
    use std::process::Command;

    pub fn is_alive(pid: u32) -> bool {
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// `lstart:<ps lstart output>`, opaque but stable per process instance.
    pub fn start_id(pid: u32) -> Option<String> {
        let out = Command::new("ps")
            .args(["-o", "lstart=", "-p", &pid.to_string()])
            .output()
            .ok()?;
        if !out.status.success() {
            return None;
        }
        let started = String::from_utf8_lossy(&out.stdout).trim().to_string();
        if started.is_empty() {
            return None;
        }
        Some(format!("lstart:{}", started))
    }
}

#[cfg(windows)]
mod platform {
    use std::process::Command;

    pub fn is_alive(pid: u32) -> bool {
        let filter = format!("PID eq {}", pid);
        Command::new("tasklist")
            .args(["/FI", &filter, "/NH", "/FO", "CSV"])
            .output()
            .map(|out| {
                out.status.success()
                    && String::from_utf8_lossy(&out.stdout).contains(&format!("\"{}\"", pid))
            })
            .unwrap_or(false)
    }

    // Creation-time tokens need the Win32 API; without it the validator
    // falls back to liveness only.
    pub fn start_id(_pid: u32) -> Option<String> {
        None
    }
}

#[cfg(not(any(unix, windows)))]
mod platform {
    pub fn is_alive(_pid: u32) -> bool {
        false
    }

    pub fn start_id(_pid: u32) -> Option<String> {
        None
    }
}
