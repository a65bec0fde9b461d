//! Stale-response filtering for refreshes and polling.
//!
//! Every fetch takes a [`Ticket`] from a [`ResponseGate`] before it starts.
//! When the fetch resolves, its value is applied only if no response from a
//! newer ticket has been applied yet and the gate is still open. Overlapping
//! fetches are never cancelled; their late results are just dropped.
//!
//! Failed fetches the user asked for (first load, manual refresh) are
//! published as a [`Failure`] next to the value so the host can show them.
//! Failures of routine background cycles are only logged.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::future::BoxFuture;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn seq(self) -> u64 {
        self.0
    }
}

/// An applied value together with the ticket of the fetch that produced it.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    pub ticket: Ticket,
    pub value: T,
}

/// Last published fetch failure. Cleared when a newer value is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub ticket: Ticket,
    pub message: String,
}

/// How a fetch settled against its gate.
#[derive(Debug)]
pub enum CycleOutcome {
    Applied,
    /// The value was valid but a newer ticket already won, or the gate was
    /// closed.
    Superseded,
    Failed(ClientError),
}

impl CycleOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    pub fn error(&self) -> Option<&ClientError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ResponseGate<T> {
    issued: AtomicU64,
    open: AtomicBool,
    latest: watch::Sender<Option<Snapshot<T>>>,
    failure: watch::Sender<Option<Failure>>,
}

impl<T> Default for ResponseGate<T> {
    fn default() -> Self {
        Self {
            issued: AtomicU64::new(0),
            open: AtomicBool::new(true),
            latest: watch::Sender::new(None),
            failure: watch::Sender::new(None),
        }
    }
}

impl<T> ResponseGate<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Applies `value` unless a newer ticket already won or the gate is
    /// closed. Returns whether the value was applied.
    pub fn offer(&self, ticket: Ticket, value: T) -> bool {
        let applied = self.latest.send_if_modified(|current| {
            if !self.open.load(Ordering::SeqCst) {
                return false;
            }
            if current
                .as_ref()
                .is_some_and(|applied| applied.ticket >= ticket)
            {
                return false;
            }
            *current = Some(Snapshot { ticket, value });
            true
        });
        if applied {
            self.failure.send_if_modified(|failure| {
                if failure.as_ref().is_some_and(|failure| failure.ticket < ticket) {
                    *failure = None;
                    return true;
                }
                false
            });
        }
        applied
    }

    /// Publishes a failed fetch unless something newer already settled.
    /// Returns whether subscribers were notified.
    pub fn fail(&self, ticket: Ticket, err: &ClientError) -> bool {
        if !self.is_open() || self.applied_ticket().is_some_and(|applied| applied >= ticket) {
            return false;
        }
        self.failure.send_if_modified(|current| {
            if current.as_ref().is_some_and(|failure| failure.ticket >= ticket) {
                return false;
            }
            *current = Some(Failure {
                ticket,
                message: err.user_message(),
            });
            true
        })
    }

    /// Settles a fetch that took `ticket`. With `publish` set, a failure is
    /// handed to [`ResponseGate::fail`]; otherwise it is only logged.
    pub fn settle(
        &self,
        label: &str,
        ticket: Ticket,
        result: Result<T, ClientError>,
        publish: bool,
    ) -> CycleOutcome {
        match result {
            Ok(value) => {
                if self.offer(ticket, value) {
                    CycleOutcome::Applied
                } else {
                    tracing::debug!(
                        "{label}: discarded response #{} (superseded or closed)",
                        ticket.seq()
                    );
                    CycleOutcome::Superseded
                }
            }
            Err(err) => {
                tracing::warn!("{label}: fetch #{} failed: {err}", ticket.seq());
                if publish {
                    self.fail(ticket, &err);
                }
                CycleOutcome::Failed(err)
            }
        }
    }

    /// Stops accepting responses. Used on teardown.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn applied_ticket(&self) -> Option<Ticket> {
        self.latest.borrow().as_ref().map(|snapshot| snapshot.ticket)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot<T>>> {
        self.latest.subscribe()
    }

    pub fn failure(&self) -> Option<Failure> {
        self.failure.borrow().clone()
    }

    pub fn subscribe_failures(&self) -> watch::Receiver<Option<Failure>> {
        self.failure.subscribe()
    }
}

impl<T: Clone> ResponseGate<T> {
    pub fn latest(&self) -> Option<T> {
        self.latest
            .borrow()
            .as_ref()
            .map(|snapshot| snapshot.value.clone())
    }
}

type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ClientError>> + Send + Sync>;

/// Re-runs a fetch on a fixed interval and publishes the newest result
/// through a [`ResponseGate`].
///
/// Timer cycles publish failures only until the first value has been
/// applied; after that they are logged. [`Poller::refresh`] always publishes.
/// Dropping the poller closes the gate, so fetches still in flight cannot
/// publish afterwards.
pub struct Poller<T> {
    label: &'static str,
    gate: Arc<ResponseGate<T>>,
    fetch: FetchFn<T>,
    timer: JoinHandle<()>,
}

impl<T> Poller<T>
where
    T: Send + Sync + 'static,
{
    /// Starts polling. The first cycle runs immediately.
    pub fn spawn<F, Fut>(label: &'static str, interval: Duration, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let fetch: FetchFn<T> = Arc::new(move || -> BoxFuture<'static, Result<T, ClientError>> {
            Box::pin(fetch())
        });
        let gate = Arc::new(ResponseGate::new());

        let timer = {
            let gate = gate.clone();
            let fetch = fetch.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if !gate.is_open() {
                        break;
                    }
                    let publish = gate.applied_ticket().is_none();
                    run_cycle(label, gate.clone(), fetch.clone(), publish);
                }
            })
        };

        tracing::info!("poller {label} started every {interval:?}");
        Self {
            label,
            gate,
            fetch,
            timer,
        }
    }

    /// Runs one out-of-band cycle through the same gate, e.g. right after a
    /// write or on user request.
    pub fn refresh(&self) -> JoinHandle<CycleOutcome> {
        run_cycle(self.label, self.gate.clone(), self.fetch.clone(), true)
    }

    pub fn gate(&self) -> &Arc<ResponseGate<T>> {
        &self.gate
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot<T>>> {
        self.gate.subscribe()
    }

    pub fn subscribe_failures(&self) -> watch::Receiver<Option<Failure>> {
        self.gate.subscribe_failures()
    }

    pub fn stop(&self) {
        if self.gate.is_open() {
            tracing::info!("poller {} stopped", self.label);
        }
        self.gate.close();
        self.timer.abort();
    }
}

impl<T: Clone + Send + Sync + 'static> Poller<T> {
    pub fn latest(&self) -> Option<T> {
        self.gate.latest()
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.gate.close();
        self.timer.abort();
    }
}

fn run_cycle<T>(
    label: &'static str,
    gate: Arc<ResponseGate<T>>,
    fetch: FetchFn<T>,
    publish: bool,
) -> JoinHandle<CycleOutcome>
where
    T: Send + Sync + 'static,
{
    let ticket = gate.issue();
    tokio::spawn(async move {
        let result = fetch().await;
        gate.settle(&format!("poller {label}"), ticket, result, publish)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::oneshot;

    use super::*;

    #[test]
    fn newer_ticket_resolving_first_wins() {
        let gate = ResponseGate::new();
        let a = gate.issue();
        let b = gate.issue();

        assert!(gate.offer(b, "B"));
        assert!(!gate.offer(a, "A"));
        assert_eq!(gate.latest(), Some("B"));
        assert_eq!(gate.applied_ticket(), Some(b));
    }

    #[test]
    fn in_order_resolution_applies_both() {
        let gate = ResponseGate::new();
        let a = gate.issue();
        let b = gate.issue();

        assert!(gate.offer(a, 1));
        assert!(gate.offer(b, 2));
        assert_eq!(gate.latest(), Some(2));
    }

    #[test]
    fn closed_gate_discards_everything() {
        let gate = ResponseGate::new();
        let a = gate.issue();
        gate.close();
        assert!(!gate.offer(a, 1));
        assert_eq!(gate.latest(), None);
    }

    #[tokio::test]
    async fn late_fetch_is_discarded_after_overlapping_one() {
        let gate = Arc::new(ResponseGate::new());
        let (release_a, wait_a) = oneshot::channel::<()>();

        let slow = {
            let gate = gate.clone();
            let ticket = gate.issue();
            tokio::spawn(async move {
                let _ = wait_a.await;
                gate.offer(ticket, "A")
            })
        };
        let fast = {
            let gate = gate.clone();
            let ticket = gate.issue();
            tokio::spawn(async move { gate.offer(ticket, "B") })
        };

        assert!(fast.await.unwrap());
        release_a.send(()).unwrap();
        assert!(!slow.await.unwrap());
        assert_eq!(gate.latest(), Some("B"));
    }

    #[tokio::test]
    async fn poller_publishes_and_refresh_supersedes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let poller = Poller::spawn("test", Duration::from_secs(3600), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, ClientError>(n) }
        });

        let mut rx = poller.subscribe();
        rx.wait_for(|snapshot| snapshot.is_some()).await.unwrap();
        assert_eq!(poller.latest(), Some(0));

        assert!(poller.refresh().await.unwrap().is_applied());
        assert_eq!(poller.latest(), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stopped_poller_ignores_in_flight_results() {
        let (release, wait) = oneshot::channel::<()>();
        let wait = Arc::new(tokio::sync::Mutex::new(Some(wait)));
        let poller = Poller::spawn("test", Duration::from_secs(3600), move || {
            let wait = wait.clone();
            async move {
                if let Some(rx) = wait.lock().await.take() {
                    let _ = rx.await;
                }
                Ok::<_, ClientError>("late")
            }
        });

        // Let the first cycle start and block on the channel.
        tokio::time::sleep(Duration::from_millis(20)).await;
        poller.stop();
        let _ = release.send(());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(poller.latest(), None);
        assert!(!poller.gate().is_open());
    }

    fn backend_down() -> ClientError {
        ClientError::Http {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            detail: Some("backend down".to_string()),
        }
    }

    #[tokio::test]
    async fn failed_refresh_is_published_not_mistaken_for_stale() {
        let poller = Poller::spawn("test", Duration::from_secs(3600), || async {
            Err::<u32, _>(backend_down())
        });
        let mut failures = poller.subscribe_failures();

        let outcome = poller.refresh().await.unwrap();

        assert_eq!(outcome.error().map(ClientError::user_message).as_deref(), Some("backend down"));
        assert_eq!(poller.latest(), None);
        failures
            .wait_for(|failure| failure.is_some())
            .await
            .unwrap();
        assert_eq!(
            poller.gate().failure().map(|failure| failure.message),
            Some("backend down".to_string())
        );
    }

    #[test]
    fn newer_value_clears_published_failure() {
        let gate = ResponseGate::new();
        let failed = gate.issue();
        assert!(matches!(
            gate.settle("test", failed, Err(backend_down()), true),
            CycleOutcome::Failed(_)
        ));
        assert!(gate.failure().is_some());

        let ok = gate.issue();
        assert!(gate.settle("test", ok, Ok(5), true).is_applied());
        assert_eq!(gate.failure(), None);
        assert_eq!(gate.latest(), Some(5));
    }

    #[test]
    fn background_failure_after_success_stays_quiet() {
        let gate = ResponseGate::new();
        let first = gate.issue();
        assert!(gate.offer(first, 1));

        let poll = gate.issue();
        let outcome = gate.settle("test", poll, Err(backend_down()), false);

        assert!(outcome.error().is_some());
        assert_eq!(gate.failure(), None);
        assert_eq!(gate.latest(), Some(1));
    }

    #[test]
    fn failure_older_than_applied_value_is_ignored() {
        let gate = ResponseGate::new();
        let slow = gate.issue();
        let fast = gate.issue();
        assert!(gate.offer(fast, 2));

        assert!(!gate.fail(slow, &backend_down()));
        assert_eq!(gate.failure(), None);
    }
}
