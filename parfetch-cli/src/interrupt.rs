use parfetch::CancelToken;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, Once};

static SIGNAL_HANDLER: Once = Once::new();
static ACTIVE_TOKEN: Mutex<Option<CancelToken>> = Mutex::new(None);
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Keeps a running download reachable from the Ctrl+C handler.
pub struct ActiveDownloadGuard(());

impl ActiveDownloadGuard {
    pub fn new(token: CancelToken) -> Self {
        if let Ok(mut active) = ACTIVE_TOKEN.lock() {
            *active = Some(token);
        }
        Self(())
    }
}

impl Drop for ActiveDownloadGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = ACTIVE_TOKEN.lock() {
            *active = None;
        }
    }
}

/// First Ctrl+C cancels the running download so its workers wind down and
/// the partial file stays on disk. A second one, or one with nothing
/// running, exits immediately.
pub fn install_signal_handler() {
    SIGNAL_HANDLER.call_once(|| {
        if let Err(err) = ctrlc::set_handler(|| {
            let repeated = INTERRUPTED.swap(true, Ordering::SeqCst);
            let active = ACTIVE_TOKEN.lock().ok().and_then(|guard| guard.clone());
            match active {
                Some(token) if !repeated => {
                    eprintln!("Cancelling download...");
                    token.cancel();
                }
                _ => {
                    eprintln!("Operation cancelled.");
                    std::process::exit(130);
                }
            }
        }) {
            eprintln!("failed to install Ctrl+C handler: {err}");
        }
    });
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}
