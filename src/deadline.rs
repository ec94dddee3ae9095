//! Deadline-bound execution for long-running pipeline work.
//!
//! Embedding batches, similarity searches, and generative completions all
//! run through [`run_with_deadline`]: the work is spawned onto the runtime
//! and awaited up to a fixed budget. On expiry the caller gets a
//! [`PipelineError::Timeout`] and moves on to a safe fallback; the spawned
//! worker keeps running to completion in the background and its result is
//! discarded. There is no cooperative mid-operation cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::error;

use crate::error::{PipelineError, Result};

/// Run `work` with an upper wall-clock bound.
///
/// The caller only ever observes "completed in time" or a timeout error,
/// never a half-finished result.
pub async fn run_with_deadline<F, T>(operation: &'static str, deadline: Duration, work: F) -> Result<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(work);

    match timeout(deadline, handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_err)) => {
            error!("{} worker failed: {}", operation, join_err);
            Err(PipelineError::internal(format!(
                "{} worker failed: {}",
                operation, join_err
            )))
        }
        Err(_) => {
            error!(
                "TIMEOUT: {} exceeded {}s; worker left to finish in the background, result discarded",
                operation,
                deadline.as_secs()
            );
            Err(PipelineError::timeout(operation, deadline.as_secs()))
        }
    }
}
