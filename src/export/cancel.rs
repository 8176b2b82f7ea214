//! Cooperative cancellation for export runs.
//!
//! A run shares one [`CancellationToken`]. The caller cancels it once (the CLI
//! wires Ctrl+C to it) and it is never reset within the run. Long-running loops
//! poll it at their natural unit of work: per document, per archived file,
//! per scheduled task.
//!
//! Database calls cannot be polled mid-flight, so [`guarded`] races them
//! against the token and an optional deadline instead. Dropping the losing
//! driver future releases its cursor or connection.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{ExportError, Result};

/// Fail with [`ExportError::Cancelled`] if the token has fired.
pub fn ensure_active(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(ExportError::Cancelled.into())
    } else {
        Ok(())
    }
}

/// Run a database call, abandoning it on cancellation or when `deadline`
/// elapses.
///
/// # Arguments
/// * `token` - Run-wide cancellation token
/// * `deadline` - Per-operation limit, `None` for no limit
/// * `operation` - Description used in the timeout error
/// * `fut` - The call itself
///
/// # Returns
/// * `Ok(T)` if the call completed first
/// * `Err(ExportError::Cancelled)` if the token fired first (checked first when both are ready)
/// * `Err(ExportError::Timeout)` if the deadline elapsed first
pub async fn guarded<F, T>(
    token: &CancellationToken,
    deadline: Option<Duration>,
    operation: &str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let bounded = async {
        match deadline {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(ExportError::Timeout {
                    operation: operation.to_string(),
                    seconds: limit.as_secs(),
                }
                .into()),
            },
            None => fut.await,
        }
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ExportError::Cancelled.into()),
        result = bounded => result,
    }
}
