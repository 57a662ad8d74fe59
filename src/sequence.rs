//! Batched sequence allocator
//!
//! Hands out values from a backing counter while paying one storage round
//! trip per `batch_size` values. All callers share one pending queue; the
//! whole check, refill and pop runs under a single lock so concurrent callers
//! never issue duplicate refills or receive the same value twice.

use crate::connection::SessionProvider;
use crate::core::{PersistError, Result, Value};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{Level, event, info_span};

lazy_static! {
    static ref SEQUENCE_NAME: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*(\.[A-Za-z_][A-Za-z0-9_$]*)?$").unwrap();
}

pub struct Sequence {
    name: String,
    batch_size: u32,
    provider: Arc<dyn SessionProvider>,
    pending: Mutex<VecDeque<i64>>,
}

impl Sequence {
    /// Statement that draws `$2` consecutive values from counter `$1`.
    pub const REFILL_SQL: &'static str = "SELECT nextval($1) FROM generate_series(1, $2)";

    pub fn new(
        name: impl Into<String>,
        batch_size: u32,
        provider: Arc<dyn SessionProvider>,
    ) -> Result<Self> {
        let name = name.into();
        if !SEQUENCE_NAME.is_match(&name) {
            return Err(PersistError::ConfigError(format!(
                "Invalid sequence name: '{}'",
                name
            )));
        }
        if batch_size == 0 {
            return Err(PersistError::ConfigError(format!(
                "Sequence '{}' needs a batch size of at least 1",
                name
            )));
        }

        Ok(Self {
            name,
            batch_size,
            provider,
            pending: Mutex::new(VecDeque::with_capacity(batch_size as usize)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch_size(&self) -> u32 {
        self.batch_size
    }

    /// Values fetched but not yet handed out.
    pub fn pending_len(&self) -> Result<usize> {
        Ok(self.pending.lock()?.len())
    }

    /// Next value, refilling from the backing counter when the queue is empty.
    ///
    /// The refill round trip happens while the queue lock is held, so callers
    /// may block on storage latency. A failed refill leaves the queue as it
    /// was and the call can simply be retried.
    pub fn next(&self) -> Result<i64> {
        let mut pending = self.pending.lock()?;
        if let Some(value) = pending.pop_front() {
            return Ok(value);
        }

        pending.extend(self.fetch_batch()?);
        pending.pop_front().ok_or_else(|| {
            PersistError::AllocationError(format!("Sequence '{}' returned no values", self.name))
        })
    }

    /// Run [`next`](Self::next) on tokio's blocking pool.
    ///
    /// Any session the provider bound to the pool thread for the refill is
    /// released before the task finishes.
    pub async fn next_async(self: Arc<Self>) -> Result<i64> {
        tokio::task::spawn_blocking(move || {
            let value = self.next();
            self.provider.release_current();
            value
        })
        .await
        .map_err(|e| PersistError::AllocationError(format!("Allocation task failed: {}", e)))?
    }

    fn fetch_batch(&self) -> Result<Vec<i64>> {
        let span = info_span!(
            "sequence.refill",
            sequence = %self.name,
            batch_size = self.batch_size
        );
        let _enter = span.enter();

        let params = [
            Value::Text(self.name.clone()),
            Value::Integer(i64::from(self.batch_size)),
        ];
        let result = self
            .provider
            .current_session()
            .and_then(|session| session.execute(Self::REFILL_SQL, &params));
        let result = match result {
            Ok(result) => result,
            Err(err) => {
                event!(Level::ERROR, error = %err, "sequence refill failed");
                return Err(PersistError::AllocationError(format!(
                    "Refill of sequence '{}' failed: {}",
                    self.name, err
                )));
            }
        };

        let values = result
            .first_column()
            .map(|cell| {
                cell.as_i64().ok_or_else(|| {
                    PersistError::AllocationError(format!(
                        "Sequence '{}' returned a non-integer value: {}",
                        self.name, cell
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if values.is_empty() {
            event!(Level::ERROR, "sequence refill returned no rows");
            return Err(PersistError::AllocationError(format!(
                "Sequence '{}' returned no values",
                self.name
            )));
        }
        if values.len() < self.batch_size as usize {
            event!(
                Level::WARN,
                fetched = values.len(),
                "sequence refill returned a short batch"
            );
        }

        event!(Level::DEBUG, fetched = values.len(), "sequence refilled");
        Ok(values)
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("name", &self.name)
            .field("batch_size", &self.batch_size)
            .field("pending", &self.pending_len().ok())
            .finish()
    }
}
