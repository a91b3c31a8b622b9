use crate::error::ClientError;
use crate::shutdown::{select_or_shutdown, Raced};
use crate::types::StatusSnapshot;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{self, Instant};
use tracing::{debug, info};

/// Default pause between two status fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Terminal outcome of waiting for the backend.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The backend reported `Running`; carries that snapshot.
    Ready(StatusSnapshot),
    Cancelled,
    DeadlineExceeded,
}

/// Polls a status source at a constant interval until the backend is running.
///
/// There is no backoff: backend readiness flips quickly and a local status
/// fetch is cheap. A failed fetch is returned immediately and never retried.
#[derive(Clone, Debug)]
pub struct ReadinessPoller {
    interval: Duration,
    timeout: Option<Duration>,
    shutdown: Arc<Notify>,
}

impl ReadinessPoller {
    pub fn new(interval: Duration, shutdown: Arc<Notify>) -> Self {
        Self {
            interval,
            timeout: None,
            shutdown,
        }
    }

    /// Give up with `WaitOutcome::DeadlineExceeded` once `timeout` has elapsed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Await `future` unless shutdown is signalled first. The readiness
    /// deadline does not apply.
    pub async fn unless_shutdown<F: Future>(&self, future: F) -> Option<F::Output> {
        match select_or_shutdown(future, &self.shutdown, None).await {
            Raced::Done(output) => Some(output),
            Raced::Shutdown | Raced::DeadlineExceeded => None,
        }
    }

    /// Call `fetch_status` until it reports `Running`.
    ///
    /// The deadline, when configured, starts counting at this call. The
    /// source is never called again after it reports `Running`.
    pub async fn wait_until_running<F, Fut>(&self, mut fetch_status: F) -> Result<WaitOutcome, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<StatusSnapshot, ClientError>>,
    {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut polls: u64 = 0;

        loop {
            polls += 1;
            let snapshot = match select_or_shutdown(fetch_status(), &self.shutdown, deadline).await {
                Raced::Done(result) => result?,
                Raced::Shutdown => return Ok(WaitOutcome::Cancelled),
                Raced::DeadlineExceeded => return Ok(WaitOutcome::DeadlineExceeded),
            };

            if snapshot.backend_state.is_running() {
                debug!(polls, "Backend is running");
                return Ok(WaitOutcome::Ready(snapshot));
            }

            info!(state = %snapshot.backend_state, "Waiting for backend to start...");

            match select_or_shutdown(time::sleep(self.interval), &self.shutdown, deadline).await {
                Raced::Done(()) => {}
                Raced::Shutdown => return Ok(WaitOutcome::Cancelled),
                Raced::DeadlineExceeded => return Ok(WaitOutcome::DeadlineExceeded),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BackendState;
    use std::collections::VecDeque;
    use std::future::ready;

    fn snapshot(state: BackendState) -> Result<StatusSnapshot, ClientError> {
        Ok(StatusSnapshot::new(state, Vec::new()))
    }

    fn server_error() -> ClientError {
        ClientError::Status {
            path: "/localapi/v0/status".to_string(),
            status: 500,
            body: "boom".to_string(),
        }
    }

    fn poller() -> ReadinessPoller {
        ReadinessPoller::new(DEFAULT_POLL_INTERVAL, Arc::new(Notify::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_once_per_not_ready_state() {
        let mut script = VecDeque::from(vec![
            snapshot(BackendState::NoState),
            snapshot(BackendState::Starting),
            snapshot(BackendState::Running),
        ]);
        let mut calls = 0;
        let start = Instant::now();

        let outcome = poller()
            .wait_until_running(|| {
                calls += 1;
                ready(script.pop_front().expect("status fetched after Running"))
            })
            .await
            .unwrap();

        assert!(matches!(outcome, WaitOutcome::Ready(ref s) if s.backend_state.is_running()));
        assert_eq!(calls, 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_fetch_does_not_sleep() {
        let start = Instant::now();
        let outcome = poller()
            .wait_until_running(|| ready(snapshot(BackendState::Running)))
            .await
            .unwrap();

        assert!(matches!(outcome, WaitOutcome::Ready(_)));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fetch_error_propagates_without_sleeping() {
        let mut calls = 0;
        let start = Instant::now();

        let result = poller()
            .wait_until_running(|| {
                calls += 1;
                ready(Err(server_error()))
            })
            .await;

        assert!(matches!(result, Err(ClientError::Status { status: 500, .. })));
        assert_eq!(calls, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_after_not_ready_is_not_retried() {
        let mut script = VecDeque::from(vec![
            snapshot(BackendState::Starting),
            Err(server_error()),
        ]);
        let mut calls = 0;

        let result = poller()
            .wait_until_running(|| {
                calls += 1;
                ready(script.pop_front().expect("fetched after error"))
            })
            .await;

        assert!(matches!(result, Err(ClientError::Status { status: 500, .. })));
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded_when_never_running() {
        let poller = poller().with_timeout(Duration::from_millis(2500));
        let mut calls = 0;
        let start = Instant::now();

        let outcome = poller
            .wait_until_running(|| {
                calls += 1;
                ready(snapshot(BackendState::NeedsLogin))
            })
            .await
            .unwrap();

        assert!(matches!(outcome, WaitOutcome::DeadlineExceeded));
        assert_eq!(calls, 3);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_wait() {
        let shutdown = Arc::new(Notify::new());
        let poller = ReadinessPoller::new(DEFAULT_POLL_INTERVAL, shutdown.clone());

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(1500)).await;
            trigger.notify_one();
        });

        let mut calls = 0;
        let outcome = poller
            .wait_until_running(|| {
                calls += 1;
                ready(snapshot(BackendState::Starting))
            })
            .await
            .unwrap();

        assert!(matches!(outcome, WaitOutcome::Cancelled));
        assert_eq!(calls, 2);
    }
}
