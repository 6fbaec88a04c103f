//! Ctrl+C handling
//!
//! While an operation runs the handler is *armed*: the first Ctrl+C only
//! raises a flag that the operation's polling loop checks, so the serial
//! session unwinds and closes normally. Ctrl+C while disarmed (at the menu
//! prompt), or a second Ctrl+C before the first was honoured, terminates the
//! process with status 130.

use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag the signal handler raises. Set once by [`Interrupt::install`].
static TARGET: OnceCell<Arc<AtomicBool>> = OnceCell::new();
static ARMED: AtomicBool = AtomicBool::new(false);

/// Cooperative stop request shared between the signal handler and the
/// polling loops
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route SIGINT to this flag. Only the first installed flag receives
    /// signals; later calls are no-ops.
    pub fn install(&self) -> std::io::Result<()> {
        if TARGET.set(Arc::clone(&self.flag)).is_err() {
            log::debug!("SIGINT handler already installed");
            return Ok(());
        }
        sys::install_handler()
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Raise the flag as if Ctrl+C had been pressed
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Arm the handler for the duration of an operation. The flag is cleared
    /// on entry and again when the guard drops.
    pub fn arm(&self) -> ArmGuard<'_> {
        self.flag.store(false, Ordering::SeqCst);
        ARMED.store(true, Ordering::SeqCst);
        ArmGuard { interrupt: self }
    }
}

/// Keeps Ctrl+C cooperative until dropped
pub struct ArmGuard<'a> {
    interrupt: &'a Interrupt,
}

impl Drop for ArmGuard<'_> {
    fn drop(&mut self) {
        ARMED.store(false, Ordering::SeqCst);
        self.interrupt.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(unix)]
mod sys {
    use super::{ARMED, TARGET};
    use std::sync::atomic::Ordering;

    const STOP_NOTICE: &[u8] = b"\nStopping... (press Ctrl+C again to quit)\n";

    pub fn install_handler() -> std::io::Result<()> {
        // SAFETY: the handler only touches atomics and async-signal-safe libc calls
        let previous = unsafe { libc::signal(libc::SIGINT, handle_sigint as libc::sighandler_t) };
        if previous == libc::SIG_ERR {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    extern "C" fn handle_sigint(_: libc::c_int) {
        if ARMED.load(Ordering::SeqCst) {
            if let Some(flag) = TARGET.get() {
                if !flag.swap(true, Ordering::SeqCst) {
                    // SAFETY: write(2) is async-signal-safe; the buffer is static
                    unsafe {
                        libc::write(
                            libc::STDERR_FILENO,
                            STOP_NOTICE.as_ptr() as *const libc::c_void,
                            STOP_NOTICE.len(),
                        );
                    }
                    return;
                }
            }
        }
        // SAFETY: _exit(2) is async-signal-safe; the OS releases the port
        unsafe { libc::_exit(130) }
    }
}

#[cfg(not(unix))]
mod sys {
    pub fn install_handler() -> std::io::Result<()> {
        log::debug!("No SIGINT hook on this platform; Ctrl+C terminates immediately");
        Ok(())
    }
}
