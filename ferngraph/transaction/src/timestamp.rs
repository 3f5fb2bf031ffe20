//! Timestamp and transaction ID generation.
//!
//! Both counters live on the transaction manager instance; there are no process-wide
//! generators, so several databases can coexist in one process.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::TimestampError;

/// Either a transaction ID, which starts from 1 << 63, or a commit timestamp, which starts
/// from 0. A timestamp is a transaction ID iff its highest bit is set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The start of the transaction ID range. Never handed out itself.
    pub const TXN_ID_START: u64 = 1 << 63;

    /// Timestamp of the internal system transaction.
    pub const SYSTEM: Timestamp = Timestamp(0);

    /// Create timestamp by a given commit ts
    pub fn with_ts(timestamp: u64) -> Self {
        Self(timestamp)
    }

    /// Returns the maximum possible commit timestamp.
    pub fn max_commit_ts() -> Self {
        Self(u64::MAX & !Self::TXN_ID_START)
    }

    /// Returns true if the timestamp is a transaction ID.
    pub fn is_txn_id(&self) -> bool {
        self.raw() & Self::TXN_ID_START != 0
    }

    /// Returns true if the timestamp is a commit timestamp.
    pub fn is_commit_ts(&self) -> bool {
        self.raw() & Self::TXN_ID_START == 0
    }

    /// Returns the raw value of the timestamp.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_txn_id() {
            write!(f, "txn#{}", self.0 & !Self::TXN_ID_START)
        } else {
            write!(f, "ts#{}", self.0)
        }
    }
}

/// Issues commit-domain timestamps. The counter holds the last issued value, which starts
/// at 1 so that 0 stays reserved for the system transaction.
pub struct TimestampGenerator {
    last: AtomicU64,
}

impl TimestampGenerator {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(1),
        }
    }

    /// Increments the counter and returns the new timestamp.
    pub fn next(&self) -> Result<Timestamp, TimestampError> {
        let mut cur = self.last.load(Ordering::SeqCst);
        loop {
            if cur >= Timestamp::max_commit_ts().raw() {
                return Err(TimestampError::CommitTsOverflow(cur));
            }
            match self.last.compare_exchange_weak(
                cur,
                cur + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(Timestamp::with_ts(cur + 1)),
                Err(actual) => cur = actual,
            }
        }
    }

    /// Returns the last issued timestamp without incrementing.
    pub fn last(&self) -> Timestamp {
        Timestamp::with_ts(self.last.load(Ordering::SeqCst))
    }
}

impl Default for TimestampGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Issues transaction IDs, starting right after [`Timestamp::TXN_ID_START`].
pub struct TransactionIdGenerator {
    last: AtomicU64,
}

impl TransactionIdGenerator {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(Timestamp::TXN_ID_START),
        }
    }

    /// Increments the counter and returns the new transaction ID.
    pub fn next(&self) -> Result<Timestamp, TimestampError> {
        let mut cur = self.last.load(Ordering::SeqCst);
        loop {
            if cur == u64::MAX {
                return Err(TimestampError::TxnIdOverflow(cur));
            }
            match self.last.compare_exchange_weak(
                cur,
                cur + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(Timestamp::with_ts(cur + 1)),
                Err(actual) => cur = actual,
            }
        }
    }
}

impl Default for TransactionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
