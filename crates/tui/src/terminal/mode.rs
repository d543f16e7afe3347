//! Input mode control.
//!
//! Hides the echo of control characters (`^C` and friends) while leaving
//! canonical line editing alone. The original attributes are captured once
//! and put back by [`TerminalModeController::restore`], which may be called
//! any number of times from any shutdown path.

use std::io;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

#[cfg(unix)]
use std::os::unix::io::RawFd;

#[cfg(unix)]
type SavedMode = libc::termios;
#[cfg(not(unix))]
type SavedMode = ();

#[cfg(unix)]
type Device = RawFd;
#[cfg(not(unix))]
type Device = ();

/// Failures reading or writing terminal attributes.
#[derive(Debug, Error)]
pub enum ModeError {
    #[error("failed to read terminal attributes")]
    Read(#[source] io::Error),
    #[error("failed to apply terminal attributes")]
    Apply(#[source] io::Error),
}

pub struct TerminalModeController {
    device: Option<Device>,
    original: Mutex<Option<SavedMode>>,
}

impl TerminalModeController {
    /// Controller for standard input.
    pub fn stdin() -> Self {
        #[cfg(unix)]
        let device = Some(libc::STDIN_FILENO);
        #[cfg(not(unix))]
        let device = None;
        Self {
            device,
            original: Mutex::new(None),
        }
    }

    /// Controller that never touches a device.
    pub fn detached() -> Self {
        Self {
            device: None,
            original: Mutex::new(None),
        }
    }

    #[cfg(all(unix, test))]
    fn for_fd(fd: RawFd) -> Self {
        Self {
            device: Some(fd),
            original: Mutex::new(None),
        }
    }

    /// Whether modified attributes are currently applied.
    pub fn is_engaged(&self) -> bool {
        self.original.lock().is_some()
    }

    /// Suppress control-character echo. Returns `Ok(false)` when there is no
    /// terminal to configure.
    pub fn engage(&self) -> Result<bool, ModeError> {
        let Some(device) = self.device else {
            return Ok(false);
        };

        let mut original = self.original.lock();
        if original.is_some() {
            return Ok(true);
        }

        match engage_device(device)? {
            Some(saved) => {
                *original = Some(saved);
                debug!("control character echo disabled");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Put the original attributes back. A no-op when nothing was changed.
    pub fn restore(&self) -> Result<(), ModeError> {
        let Some(device) = self.device else {
            return Ok(());
        };

        let Some(saved) = self.original.lock().take() else {
            return Ok(());
        };
        restore_device(device, &saved)?;
        debug!("terminal attributes restored");
        Ok(())
    }
}

#[cfg(unix)]
fn engage_device(fd: RawFd) -> Result<Option<SavedMode>, ModeError> {
    // SAFETY: isatty only inspects the descriptor.
    if unsafe { libc::isatty(fd) } == 0 {
        return Ok(None);
    }

    // SAFETY: termios is plain data and is fully written by tcgetattr on success.
    let mut original: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut original) } != 0 {
        return Err(ModeError::Read(io::Error::last_os_error()));
    }

    let mut modified = original;
    modified.c_lflag &= !libc::ECHOCTL;
    // SAFETY: `modified` is a valid termios obtained from tcgetattr.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &modified) } != 0 {
        return Err(ModeError::Apply(io::Error::last_os_error()));
    }
    Ok(Some(original))
}

#[cfg(unix)]
fn restore_device(fd: RawFd, saved: &SavedMode) -> Result<(), ModeError> {
    // SAFETY: `saved` came from tcgetattr on the same descriptor.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, saved) } != 0 {
        return Err(ModeError::Apply(io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn engage_device(_device: Device) -> Result<Option<SavedMode>, ModeError> {
    Ok(None)
}

#[cfg(not(unix))]
fn restore_device(_device: Device, _saved: &SavedMode) -> Result<(), ModeError> {
    Ok(())
}
