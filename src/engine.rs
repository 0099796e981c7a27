use std::path::PathBuf;

use chrono::Utc;
use log::debug;

use crate::calendar::Frequency;
use crate::changeset::ChangeSet;
use crate::errors::RiverbedError;
use crate::io::{data_file, log_file};
use crate::timeseries::Series;

/// The per-instance storage engine. Owns the data directory and composes the
/// data-file store with the log store: every mutating write goes through the
/// data file first, and the resulting change set is appended to the log
/// stamped with the operation time.
///
/// There is no multi-writer safety here. At most one writer per handle at a
/// time; concurrent writers must be serialised by the caller.
pub struct StorageEngine {
    data_dir: PathBuf,
}

impl StorageEngine {
    pub fn new(data_dir: PathBuf) -> StorageEngine {
        StorageEngine { data_dir }
    }

    /// Path of the instance's data file (`<handle>.dat`).
    pub fn data_path(&self, handle: &str) -> PathBuf {
        self.data_dir.join(format!("{}.dat", handle))
    }

    /// Path of the instance's log file (`<handle>.log`).
    pub fn log_path(&self, handle: &str) -> PathBuf {
        self.data_dir.join(format!("{}.log", handle))
    }

    /// Writes a series, stamping the log with the current UTC time.
    pub fn write(
        &self,
        handle: &str,
        freq: Frequency,
        points: &[(i64, f64)],
    ) -> Result<ChangeSet, RiverbedError> {
        self.write_as_at(handle, freq, points, Utc::now().timestamp())
    }

    /// Writes a series with an explicit replacement time. The data file
    /// commits first; the log append that follows is best-effort, so a
    /// failure there surfaces with the data change already visible.
    pub fn write_as_at(
        &self,
        handle: &str,
        freq: Frequency,
        points: &[(i64, f64)],
        replacement_time: i64,
    ) -> Result<ChangeSet, RiverbedError> {
        let change_set = data_file::write(&self.data_path(handle), points, freq)?;
        debug!(
            "wrote {}: {} created, {} updated",
            handle,
            change_set.created.len(),
            change_set.updated.len()
        );
        log_file::append(&self.log_path(handle), &change_set, replacement_time)?;
        Ok(change_set)
    }

    /// The current canonical series, straight from the data file.
    pub fn read(&self, handle: &str) -> Result<Series, RiverbedError> {
        data_file::read_all(&self.data_path(handle))
    }

    /// The series as it was at `as_at`, reconstructed from the log.
    pub fn read_as_of(&self, handle: &str, as_at: i64) -> Result<Series, RiverbedError> {
        log_file::read_as_of(&self.log_path(handle), as_at)
    }
}
