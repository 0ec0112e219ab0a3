//! Interrupt handling for clean cache shutdown
//!
//! Promoting a batch renames files one by one; a termination signal landing
//! in the middle of that loop would leave the cache half-promoted. The
//! [`InterruptGuard`] owns a mutex that the batch materializer holds for the
//! whole promotion loop, and the signal task takes the same mutex before
//! sweeping temporary files and exiting, so a shutdown always observes a
//! fully promoted or fully unpromoted batch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::cache;

/// Serializes batch promotion against signal-driven shutdown.
#[derive(Debug, Default)]
pub struct InterruptGuard {
    promotions: Mutex<()>,
    installed: AtomicBool,
}

impl InterruptGuard {
    /// Create a new guard.
    pub fn new() -> Self {
        Self {
            promotions: Mutex::new(()),
            installed: AtomicBool::new(false),
        }
    }

    /// Acquire the promotion critical section.
    pub async fn lock_promotions(&self) -> MutexGuard<'_, ()> {
        self.promotions.lock().await
    }
}

/// Spawn the signal task for a harvest directory. Installing the same guard
/// twice is a no-op, so repeated runs reuse one task.
///
/// On the first interrupt the task waits for any in-flight promotion to
/// finish, removes all temporary files, and terminates the process with
/// success status. Failing to remove them terminates with failure status.
pub fn install_interrupt_guard(guard: Arc<InterruptGuard>, dir: PathBuf) {
    if guard.installed.swap(true, Ordering::SeqCst) {
        return;
    }
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("unable to listen for the interrupt signal");
            return;
        }
        info!("interrupt received, waiting for any promotion to finish");
        let _promotions = guard.lock_promotions().await;
        match cache::sweep_temporary_files(&dir) {
            Ok(removed) => {
                if removed > 0 {
                    info!(removed, "removed temporary files");
                }
                std::process::exit(0);
            }
            Err(err) => {
                error!(error = %err, "failed to remove temporary files");
                std::process::exit(1);
            }
        }
    });
}
