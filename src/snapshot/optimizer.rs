//! Background snapshot optimization.
//!
//! After a fast-codec snapshot commit completes, a scheduled task
//! re-encodes the structured stream under the higher-ratio codec into
//! `deltas/v<N>_optimized.zst`. The optimized copy is purely additive: the
//! primary artifact is never removed, and the restore locator simply
//! prefers the smaller copy when both exist.

use crate::core::config::OptimizeConfig;
use crate::core::error::Result;
use crate::repo::context::{RepositoryContext, TempGuard};
use lz4_flex::frame::FrameDecoder;
use parking_lot::Mutex;
use std::fs::File;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Granularity of the pre-start delay, so shutdown is not held up by a
/// sleeping task
const DELAY_SLICE: Duration = Duration::from_millis(50);

/// Tracks outstanding optimization tasks.
///
/// Tasks are joined on shutdown; a cancelled task removes its partial
/// output through its temp guard, and anything that slips through is
/// swept by the next startup's temp cleanup.
pub struct OptimizationScheduler {
    config: OptimizeConfig,
    cancel: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl OptimizationScheduler {
    /// Create a scheduler with the given optimization settings
    pub fn new(config: OptimizeConfig) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Schedule a background re-encoding of `version`'s snapshot.
    ///
    /// No-op when optimization is disabled. The task starts after the
    /// configured delay so the user's interactive operation completes
    /// cleanly first.
    pub fn schedule(&self, ctx: Arc<RepositoryContext>, version: u32) {
        if !self.config.enabled {
            return;
        }

        let cancel = self.cancel.clone();
        let delay = Duration::from_millis(self.config.delay_ms);
        let level = self.config.zstd_level;

        let spawned = std::thread::Builder::new()
            .name(format!("lv-optimize-v{}", version))
            .spawn(move || {
                if !wait_unless_cancelled(delay, &cancel) {
                    debug!(version, "optimization cancelled before start");
                    return;
                }
                if let Err(e) = optimize_snapshot(&ctx, version, level, &cancel) {
                    warn!(version, error = %e, "background optimization failed");
                }
            });

        match spawned {
            Ok(handle) => {
                let mut tasks = self.tasks.lock();
                tasks.retain(|t| !t.is_finished());
                tasks.push(handle);
            }
            Err(e) => warn!(version, error = %e, "failed to spawn optimization task"),
        }
    }

    /// Wait for every outstanding task to finish
    pub fn join_all(&self) {
        let handles: Vec<_> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Cancel pending work and join outstanding tasks
    pub fn shutdown(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.join_all();
    }
}

impl Drop for OptimizationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sleep in slices, returning false if cancelled meanwhile
fn wait_unless_cancelled(delay: Duration, cancel: &AtomicBool) -> bool {
    let mut remaining = delay;
    while remaining > Duration::ZERO {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let slice = remaining.min(DELAY_SLICE);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
    !cancel.load(Ordering::SeqCst)
}

/// Re-encode one snapshot under the higher-ratio codec.
///
/// The re-encoding is written to the temp area and renamed into place only
/// when complete, so a crash or cancellation never leaves a partial
/// optimized artifact where the locator would find it.
fn optimize_snapshot(
    ctx: &RepositoryContext,
    version: u32,
    level: i32,
    cancel: &AtomicBool,
) -> Result<()> {
    let source = ctx.snapshot_path(version);
    if !source.is_file() {
        debug!(version, "snapshot gone before optimization started");
        return Ok(());
    }

    let staging = ctx.temp_path(&format!("optimize_v{}", version), "zst");
    let guard = TempGuard::new(&staging);

    let mut decoder = FrameDecoder::new(File::open(&source)?);
    let mut encoder = zstd::stream::Encoder::new(File::create(&staging)?, level)?;
    io::copy(&mut decoder, &mut encoder)?;
    let file = encoder.finish()?;
    file.sync_all()?;

    if cancel.load(Ordering::SeqCst) {
        debug!(version, "optimization cancelled, discarding output");
        return Ok(());
    }

    let dest = ctx.optimized_path(version);
    std::fs::rename(&staging, &dest)?;
    guard.disarm();

    let original = std::fs::metadata(&source)?.len();
    let optimized = std::fs::metadata(&dest)?.len();
    info!(version, original, optimized, "optimized snapshot ready");
    Ok(())
}
