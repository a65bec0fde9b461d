//! Local edit buffer with deferred, parallel flush.
//!
//! Edits are visible immediately through [`EditBuffer::value_or`] and are only
//! written when the host triggers a flush. A flush sends one write per pending
//! key, waits for all of them and clears only the keys that succeeded.

use std::{collections::BTreeMap, fmt, future::Future};

use futures::future::{BoxFuture, join_all};
use tokio::task::JoinHandle;

use crate::{ApiClient, error::ClientError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Clean,
    Dirty,
    Flushing,
}

/// What caused a flush. Only used for logging and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    Save,
    TabSwitch,
    Teardown,
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Save => "save",
            Self::TabSwitch => "tab switch",
            Self::Teardown => "teardown",
        };
        f.write_str(label)
    }
}

#[derive(Debug)]
pub struct FlushReport<K> {
    pub trigger: FlushTrigger,
    pub succeeded: Vec<K>,
    pub failed: Vec<(K, ClientError)>,
}

impl<K> FlushReport<K> {
    fn empty(trigger: FlushTrigger) -> Self {
        Self {
            trigger,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Snapshot of the pending edits taken when a flush starts.
///
/// Sending it does not borrow the buffer, so the host can keep editing while
/// the writes are in flight and reconcile with [`EditBuffer::finish_flush`].
#[derive(Debug)]
pub struct FlushBatch<K, V> {
    trigger: FlushTrigger,
    entries: Vec<(K, V)>,
}

/// Outcome of a sent batch, to be handed back to the buffer.
#[derive(Debug)]
pub struct FlushOutcome<K, V> {
    trigger: FlushTrigger,
    results: Vec<(K, V, Result<(), ClientError>)>,
}

impl<K, V> FlushBatch<K, V>
where
    K: Clone,
    V: Clone,
{
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Issues every write concurrently and waits for all of them to settle.
    pub async fn send<F, Fut>(self, write: F) -> FlushOutcome<K, V>
    where
        F: Fn(K, V) -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        let writes = self.entries.into_iter().map(|(key, value)| {
            let pending = write(key.clone(), value.clone());
            async move { (key, value, pending.await) }
        });
        FlushOutcome {
            trigger: self.trigger,
            results: join_all(writes).await,
        }
    }
}

/// Pending edits keyed by entity id.
///
/// Last write wins per key. Owned by a single host; nothing here is shared.
#[derive(Debug, Clone)]
pub struct EditBuffer<K, V> {
    pending: BTreeMap<K, V>,
    in_flight: bool,
}

impl<K, V> Default for EditBuffer<K, V> {
    fn default() -> Self {
        Self {
            pending: BTreeMap::new(),
            in_flight: false,
        }
    }
}

impl<K, V> EditBuffer<K, V>
where
    K: Ord + Clone + fmt::Debug,
    V: Clone + PartialEq,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BufferState {
        if self.in_flight {
            BufferState::Flushing
        } else if self.pending.is_empty() {
            BufferState::Clean
        } else {
            BufferState::Dirty
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn set(&mut self, key: K, value: V) {
        self.pending.insert(key, value);
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.pending.get(key)
    }

    /// The value to display: the pending edit if there is one, the server's
    /// value otherwise.
    pub fn value_or(&self, key: &K, server: V) -> V {
        self.pending.get(key).cloned().unwrap_or(server)
    }

    pub fn discard(&mut self, key: &K) -> Option<V> {
        self.pending.remove(key)
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }

    pub fn pending(&self) -> impl Iterator<Item = (&K, &V)> {
        self.pending.iter()
    }

    /// Moves the buffer to `Flushing` and snapshots the pending edits.
    pub fn begin_flush(&mut self, trigger: FlushTrigger) -> FlushBatch<K, V> {
        let entries: Vec<(K, V)> = self
            .pending
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self.in_flight = !entries.is_empty();
        FlushBatch { trigger, entries }
    }

    /// Clears the keys whose write succeeded. A key edited again while its
    /// write was in flight keeps the newer value and stays pending.
    pub fn finish_flush(&mut self, outcome: FlushOutcome<K, V>) -> FlushReport<K> {
        self.in_flight = false;
        let mut report = FlushReport::empty(outcome.trigger);

        for (key, value, result) in outcome.results {
            match result {
                Ok(()) => {
                    if self.pending.get(&key) == Some(&value) {
                        self.pending.remove(&key);
                    }
                    report.succeeded.push(key);
                }
                Err(err) => {
                    tracing::warn!(
                        "flush on {} failed for {:?}, keeping edit: {err}",
                        outcome.trigger,
                        key
                    );
                    report.failed.push((key, err));
                }
            }
        }

        tracing::debug!(
            trigger = %report.trigger,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "flush settled"
        );
        report
    }

    /// Flushes every pending edit and waits for the result.
    pub async fn flush<F, Fut>(&mut self, trigger: FlushTrigger, write: F) -> FlushReport<K>
    where
        F: Fn(K, V) -> Fut,
        Fut: Future<Output = Result<(), ClientError>>,
    {
        let batch = self.begin_flush(trigger);
        if batch.is_empty() {
            return FlushReport::empty(trigger);
        }
        let outcome = batch.send(write).await;
        self.finish_flush(outcome)
    }
}

impl<K, V> EditBuffer<K, V>
where
    K: Ord + Clone + fmt::Debug + Send + 'static,
    V: Clone + PartialEq + Send + 'static,
{
    /// Teardown flush. The buffer moves into a background task; the host may
    /// await the handle but is not required to. Delivery is best effort.
    pub fn detach<F, Fut>(mut self, write: F) -> Option<JoinHandle<FlushReport<K>>>
    where
        F: Fn(K, V) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), ClientError>> + Send + 'static,
    {
        if self.is_empty() {
            return None;
        }
        tracing::info!("detaching {} pending edit(s) on teardown", self.len());
        Some(tokio::spawn(async move {
            self.flush(FlushTrigger::Teardown, write).await
        }))
    }
}

/// Category priorities of one bot, keyed by category id.
pub type PriorityBuffer = EditBuffer<i64, f64>;

/// Write function for [`PriorityBuffer`] flushes:
/// `PUT /public-bots/{bot_id}/categories/{category_id}/priority`.
pub fn priority_writer(
    client: ApiClient,
    bot_id: i64,
) -> impl Fn(i64, f64) -> BoxFuture<'static, Result<(), ClientError>> + Send + Sync + Clone + 'static
{
    move |category_id, priority| -> BoxFuture<'static, Result<(), ClientError>> {
        let client = client.clone();
        Box::pin(async move {
            client
                .update_priority(bot_id, category_id, priority)
                .await
        })
    }
}
