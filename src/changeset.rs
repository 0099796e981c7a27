use crate::record::{DEFAULT_META_ID, METADATA_MISSING_VALUE, MISSING_VALUE};

/// One log-bound triple in its on-disk form. NaN values are already
/// translated to the missing sentinel pair by the time a triple lands here,
/// so the data file and the log always agree byte-for-byte.
#[derive(Debug)]
#[derive(Clone, Copy)]
#[derive(PartialEq)]
pub struct LogRecord {
    pub timestamp: i64,
    pub value: f64,
    pub meta: i32,
}

impl LogRecord {
    pub fn new(timestamp: i64, value: f64, meta: i32) -> LogRecord {
        LogRecord {
            timestamp,
            value,
            meta,
        }
    }

    /// Builds the record for a freshly supplied value, applying the NaN to
    /// sentinel translation.
    pub fn from_value(timestamp: i64, value: f64) -> LogRecord {
        if value.is_nan() {
            LogRecord::new(timestamp, MISSING_VALUE, METADATA_MISSING_VALUE)
        } else {
            LogRecord::new(timestamp, value, DEFAULT_META_ID)
        }
    }
}

/// The outcome of one smart write: every record the write created (new
/// records, gap fills and replacement values) and the prior triple of every
/// record it overwrote. This is the contract between the data-file store and
/// the log store.
#[derive(Debug)]
#[derive(Clone)]
#[derive(Default)]
pub struct ChangeSet {
    pub created: Vec<LogRecord>,
    pub updated: Vec<LogRecord>,
}

impl ChangeSet {
    pub fn new() -> ChangeSet {
        ChangeSet {
            created: Vec::new(),
            updated: Vec::new(),
        }
    }

    pub fn push_created(&mut self, timestamp: i64, value: f64) {
        self.created.push(LogRecord::from_value(timestamp, value));
    }

    /// Records the prior on-disk triple of an overwritten record, exactly as
    /// stored (a prior missing record reports the sentinel pair).
    pub fn push_updated(&mut self, timestamp: i64, value: f64, meta: i32) {
        self.updated.push(LogRecord::new(timestamp, value, meta));
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty()
    }

    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}
