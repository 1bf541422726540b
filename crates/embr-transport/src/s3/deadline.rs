use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{TransportError, TransportResult};

/// Run `fut` until it finishes, `deadline` elapses, or `cancel` fires.
///
/// The timeout never fires before the full deadline has passed.
pub async fn with_deadline<T, F>(
    operation: &str,
    deadline: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> TransportResult<T>
where
    F: Future<Output = TransportResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportError::Cancelled),
        res = tokio::time::timeout(deadline, fut) => res.unwrap_or_else(|_| {
            Err(TransportError::Timeout(format!("S3 {operation} operation timed out")))
        }),
    }
}
