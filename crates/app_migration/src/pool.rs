//! Bounded worker pool
//!
//! A semaphore caps the number of spawned tasks in flight; the caller drains
//! the `JoinSet` and owns every result. Completion order is not preserved.
//! Each item runs in its own task so a panic settles only that item, through
//! the caller's `recover` function.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

use crate::error::MigrationError;

/// Runs `task` once per item with at most `concurrency` tasks at a time
///
/// Returns after every task has finished, with one result per item. A
/// panicking task yields `recover(item, message)` instead. A concurrency of
/// 0 is treated as 1.
pub async fn run_bounded<I, T, F, Fut, R>(
    items: Vec<I>,
    concurrency: usize,
    task: F,
    recover: R,
) -> Result<Vec<T>, MigrationError>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
    R: Fn(I, String) -> T + Send + Sync + 'static,
{
    let limit = Arc::new(Semaphore::new(concurrency.max(1)));
    let task = Arc::new(task);
    let recover = Arc::new(recover);
    let mut workers = JoinSet::new();

    for item in items {
        let permit = limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| MigrationError::internal(format!("worker pool closed: {}", e)))?;
        let task = task.clone();
        let recover = recover.clone();
        workers.spawn(async move {
            let _permit = permit;
            match tokio::spawn(task(item.clone())).await {
                Ok(value) => value,
                Err(join_error) => {
                    let message = join_error.to_string();
                    error!(error = %message, "Worker task panicked");
                    recover(item, message)
                }
            }
        });
    }

    let mut results = Vec::with_capacity(workers.len());
    let mut lost = 0usize;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(value) => results.push(value),
            Err(join_error) => {
                error!(error = %join_error, "Worker pool task lost");
                lost += 1;
            }
        }
    }
    if lost > 0 {
        return Err(MigrationError::internal(format!("{} worker tasks did not complete", lost)));
    }
    Ok(results)
}
