use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::changeset::{ChangeSet, LogRecord};
use crate::errors::RiverbedError;
use crate::record::{pack_record, stored_to_value, RECORD_SIZE};
use crate::timeseries::Series;

/// On-disk width of one log entry: a data record plus the replacement time.
pub const LOG_RECORD_SIZE: usize = RECORD_SIZE + 8;

/// Appends a change set to the instance log. Every entry is stamped with the
/// same replacement time. Updated entries (the prior values) go first so the
/// created entries win the file-order tie-break on replay. The file is
/// created lazily on first append; an empty change set appends nothing and
/// creates nothing.
pub fn append(
    path: &Path,
    change_set: &ChangeSet,
    replacement_time: i64,
) -> Result<(), RiverbedError> {
    if change_set.is_empty() {
        return Ok(());
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    for entry in change_set.updated.iter().chain(change_set.created.iter()) {
        writer.write_all(&pack_entry(entry, replacement_time))?;
    }
    writer.flush()?;
    Ok(())
}

/// Replays the log to reconstruct the series as it was at `as_at`: entries
/// with a replacement time at or before `as_at` qualify, and per timestamp
/// the qualifying entry with the largest replacement time wins (later file
/// order breaking ties). Returns an empty series when the file is absent or
/// nothing qualifies.
pub fn read_as_of(path: &Path, as_at: i64) -> Result<Series, RiverbedError> {
    if !path.is_file() {
        return Ok(Series::new());
    }

    let mut current: BTreeMap<i64, (f64, i32, i64)> = BTreeMap::new();
    for (timestamp, value, meta, replacement_time) in read_entries(path)? {
        if replacement_time > as_at {
            continue;
        }
        let superseded = match current.get(&timestamp) {
            Some((_, _, seen)) => *seen <= replacement_time,
            None => true,
        };
        if superseded {
            current.insert(timestamp, (value, meta, replacement_time));
        }
    }

    let mut series = Series::with_capacity(current.len());
    for (timestamp, (value, meta, _)) in current {
        series.push(timestamp, stored_to_value(value, meta));
    }
    Ok(series)
}

/// Reads every log entry in file order as raw
/// (time, value, meta, replacement_time) tuples.
pub fn read_entries(path: &Path) -> Result<Vec<(i64, f64, i32, i64)>, RiverbedError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut entries = Vec::new();
    while let Some(entry) = read_entry(&mut reader)? {
        entries.push(entry);
    }
    Ok(entries)
}

fn pack_entry(record: &LogRecord, replacement_time: i64) -> [u8; LOG_RECORD_SIZE] {
    let mut buf = [0u8; LOG_RECORD_SIZE];
    buf[0..RECORD_SIZE].copy_from_slice(&pack_record(record.timestamp, record.value, record.meta));
    buf[RECORD_SIZE..].copy_from_slice(&replacement_time.to_le_bytes());
    buf
}

fn read_entry<R: Read>(reader: &mut R) -> Result<Option<(i64, f64, i32, i64)>, RiverbedError> {
    let mut buf = [0u8; LOG_RECORD_SIZE];
    let mut filled = 0;
    while filled < LOG_RECORD_SIZE {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(RiverbedError::CorruptRecord(format!(
                "partial log entry of {} bytes at end of stream",
                filled
            )));
        }
        filled += n;
    }

    let mut ts = [0u8; 8];
    let mut val = [0u8; 8];
    let mut meta = [0u8; 4];
    let mut replacement = [0u8; 8];
    ts.copy_from_slice(&buf[0..8]);
    val.copy_from_slice(&buf[8..16]);
    meta.copy_from_slice(&buf[16..20]);
    replacement.copy_from_slice(&buf[20..28]);
    Ok(Some((
        i64::from_le_bytes(ts),
        f64::from_le_bytes(val),
        i32::from_le_bytes(meta),
        i64::from_le_bytes(replacement),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DEFAULT_META_ID, METADATA_MISSING_VALUE, MISSING_VALUE};

    #[test]
    fn test_log_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instance.log");

        let mut change_set = ChangeSet::new();
        change_set.push_created(1388620800, 2.0);
        change_set.push_created(1388707200, 3.0);
        append(&path, &change_set, 1000).unwrap();

        let mut change_set = ChangeSet::new();
        change_set.push_updated(1388707200, 3.0, DEFAULT_META_ID);
        change_set.push_created(1388707200, 4.0);
        append(&path, &change_set, 2000).unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0], (1388620800, 2.0, 0, 1000));
        assert_eq!(entries[1], (1388707200, 3.0, 0, 1000));
        // Prior value first, replacement second
        assert_eq!(entries[2], (1388707200, 3.0, 0, 2000));
        assert_eq!(entries[3], (1388707200, 4.0, 0, 2000));
    }

    #[test]
    fn test_empty_change_set_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instance.log");
        append(&path, &ChangeSet::new(), 1000).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_read_as_of_missing_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("instance.log");

        let mut change_set = ChangeSet::new();
        change_set.push_created(86400, f64::NAN);
        append(&path, &change_set, 500).unwrap();

        let entries = read_entries(&path).unwrap();
        assert_eq!(entries[0], (86400, MISSING_VALUE, METADATA_MISSING_VALUE, 500));

        let series = read_as_of(&path, 500).unwrap();
        assert_eq!(series.len(), 1);
        assert!(series.values[0].is_nan());

        // Nothing qualifies before the first replacement time.
        let series = read_as_of(&path, 499).unwrap();
        assert!(series.is_empty());
    }
}
