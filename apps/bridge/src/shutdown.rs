use std::{future::Future, io};

use anyhow::{Context, Result};
use tracing::info;

/// Drive `work` to completion unless `shutdown` fires first.
///
/// `Ok(None)` means the operator asked to stop; callers unwind and exit
/// cleanly. A `shutdown` that completes is never polled again.
pub async fn or_shutdown<T, W, S>(work: W, shutdown: &mut S) -> Result<Option<T>>
where
    W: Future<Output = Result<T>>,
    S: Future<Output = io::Result<()>> + Unpin,
{
    tokio::select! {
        result = work => result.map(Some),
        signal = shutdown => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("bridge: interrupted; shutting down");
            Ok(None)
        }
    }
}

#[cfg(test)]
#[path = "tests/shutdown_tests.rs"]
mod tests;
