use std::future::Future;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{self, Instant};

/// How a raced future finished.
#[derive(Debug, PartialEq, Eq)]
pub enum Raced<T> {
    Done(T),
    Shutdown,
    DeadlineExceeded,
}

/// Await `future`, a shutdown signal, or an optional deadline, whichever comes first.
///
/// - Returns `Raced::Done(output)` when the future completes
/// - Returns `Raced::Shutdown` when `shutdown_notify` fires
/// - Returns `Raced::DeadlineExceeded` once `deadline` passes
///
/// Shutdown wins ties, then the deadline. A `notify_one` sent while nobody
/// was waiting is picked up by the next call.
pub async fn select_or_shutdown<F: Future>(
    future: F,
    shutdown_notify: &Arc<Notify>,
    deadline: Option<Instant>,
) -> Raced<F::Output> {
    let deadline = async {
        match deadline {
            Some(deadline) => time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = shutdown_notify.notified() => Raced::Shutdown,
        _ = deadline => Raced::DeadlineExceeded,
        output = future => Raced::Done(output),
    }
}
