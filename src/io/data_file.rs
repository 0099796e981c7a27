use std::collections::BTreeMap;
use std::fs;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{error, warn};

use crate::calendar::Frequency;
use crate::changeset::{ChangeSet, LogRecord};
use crate::dates::timestamp_to_auto_string;
use crate::errors::RiverbedError;
use crate::record::{
    pack_record, pack_value, read_record, stored_to_value, METADATA_MISSING_VALUE, MISSING_VALUE,
    RECORD_SIZE,
};
use crate::timeseries::Series;

/// Reads an entire data file into a series, translating the missing sentinel
/// back to NaN. An absent file reads as an empty series.
pub fn read_all(path: &Path) -> Result<Series, RiverbedError> {
    if !path.is_file() {
        return Ok(Series::new());
    }

    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut series = Series::new();
    while let Some((timestamp, value, meta)) = read_record(&mut reader)? {
        series.push(timestamp, stored_to_value(value, meta));
    }
    Ok(series)
}

/// Smart write.
///
/// Normalises the input against the frequency, then reconciles it with the
/// existing file: new files are written straight out, overlapping regular
/// data is updated in place, later data is appended with missing-value gap
/// fill, earlier data is prepended, and irregular data is merged. Returns
/// the change set of records created and prior values overwritten.
pub fn write(
    path: &Path,
    points: &[(i64, f64)],
    freq: Frequency,
) -> Result<ChangeSet, RiverbedError> {
    let series = freq.normalise(points)?;

    let mut change_set = ChangeSet::new();

    if series.is_empty() {
        return Ok(change_set);
    }

    // A file that is absent (or left empty) is a straight forward write.
    let bounds = if path.is_file() {
        first_and_last_record(path)?
    } else {
        None
    };

    let (first_record, last_record) = match bounds {
        Some(b) => b,
        None => {
            write_new_file(path, &series, &mut change_set)?;
            return Ok(change_set);
        }
    };

    if freq == Frequency::Irregular {
        write_irregular_data(path, &series, last_record.0, change_set)
    } else {
        write_regular_data(
            path,
            &series,
            freq,
            first_record.0,
            last_record.0,
            change_set,
        )
    }
}

/// Truncates a partial trailing record left by an interrupted append.
/// Returns the number of bytes dropped (zero when the file was whole).
pub fn repair(path: &Path) -> Result<u64, RiverbedError> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let len = file.metadata()?.len();
    let excess = len % RECORD_SIZE as u64;
    if excess != 0 {
        warn!(
            "truncating {} byte partial record from {}",
            excess,
            path.display()
        );
        file.set_len(len - excess)?;
    }
    Ok(excess)
}

fn write_new_file(
    path: &Path,
    series: &Series,
    change_set: &mut ChangeSet,
) -> Result<(), RiverbedError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for (timestamp, value) in series.iter() {
        change_set.push_created(timestamp, value);
        writer.write_all(&pack_value(timestamp, value))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_regular_data(
    path: &Path,
    series: &Series,
    freq: Frequency,
    first_record_time: i64,
    last_record_time: i64,
    mut change_set: ChangeSet,
) -> Result<ChangeSet, RiverbedError> {
    let start = series.timestamps[0];

    if start < first_record_time {
        // We are prepending to existing data
        prepend_data(path, series, freq, first_record_time, &mut change_set)?;
    } else if start <= last_record_time {
        // We are updating existing data
        update_existing_data(path, series, freq, &mut change_set)?;
    } else if start > last_record_time {
        // We are appending data
        append_data(path, series, freq, last_record_time, &mut change_set)?;
    } else {
        // Not yet supported
        return Err(RiverbedError::NotImplemented(
            "write arrangement not supported".to_string(),
        ));
    }

    Ok(change_set)
}

/// Overlap-or-append path: seeks to the offset of the input's first
/// timestamp and walks the input in lockstep with the existing records.
/// Unchanged records are skipped, missing records are filled (created, not
/// updated), differing records are overwritten in place with the prior
/// triple captured, and records past the existing end are appended.
fn update_existing_data(
    path: &Path,
    series: &Series,
    freq: Frequency,
    change_set: &mut ChangeSet,
) -> Result<(), RiverbedError> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;

    // The seek offset is relative to the file as it stands now (a prepend
    // may just have moved the start), so read the current first record from
    // disk rather than trusting the caller's view of it.
    let first_record = match read_record(&mut file)? {
        Some(record) => record,
        None => {
            return Err(RiverbedError::DataError(format!(
                "{} is empty, nothing to update",
                path.display()
            )))
        }
    };
    let offset = freq.offset(first_record.0, series.timestamps[0])?;
    let start_byte = offset as u64 * RECORD_SIZE as u64;

    // Read existing overlapping data for comparisons
    file.seek(SeekFrom::Start(start_byte))?;
    let mut existing_records = Vec::new();
    {
        let mut reader = BufReader::new(&mut file);
        while let Some(record) = read_record(&mut reader)? {
            existing_records.push(record);
        }
    }

    file.seek(SeekFrom::Start(start_byte))?;
    for (rec_count, (timestamp, value)) in series.iter().enumerate() {
        if rec_count < existing_records.len() {
            let (existing_time, existing_value, existing_meta) = existing_records[rec_count];
            if existing_time != timestamp {
                return Err(RiverbedError::DataError(format!(
                    "existing record at slot {} has timestamp {}, expected {}",
                    offset + rec_count as i64,
                    timestamp_to_auto_string(existing_time),
                    timestamp_to_auto_string(timestamp)
                )));
            }

            let existing_missing = existing_meta == METADATA_MISSING_VALUE;
            let unchanged = if existing_missing {
                value.is_nan()
            } else {
                !value.is_nan() && value == existing_value
            };

            if unchanged {
                // Skip writing the entry since it hasn't changed.
                file.seek(SeekFrom::Start(
                    start_byte + (rec_count as u64 + 1) * RECORD_SIZE as u64,
                ))?;
            } else if existing_missing {
                // Filling a gap is a creation, not an update.
                change_set.push_created(timestamp, value);
                file.write_all(&pack_value(timestamp, value))?;
            } else {
                change_set.push_updated(existing_time, existing_value, existing_meta);
                change_set.push_created(timestamp, value);
                file.write_all(&pack_value(timestamp, value))?;
            }
        } else {
            change_set.push_created(timestamp, value);
            file.write_all(&pack_value(timestamp, value))?;
        }
    }

    Ok(())
}

fn append_data(
    path: &Path,
    series: &Series,
    freq: Frequency,
    last_record_time: i64,
    change_set: &mut ChangeSet,
) -> Result<(), RiverbedError> {
    let file = OpenOptions::new().append(true).open(path)?;
    let mut writer = BufWriter::new(file);

    write_missing(
        &mut writer,
        freq,
        freq.tick(1, last_record_time)?,
        freq.tick(-1, series.timestamps[0])?,
        change_set,
    )?;

    for (timestamp, value) in series.iter() {
        change_set.push_created(timestamp, value);
        writer.write_all(&pack_value(timestamp, value))?;
    }
    writer.flush()?;
    Ok(())
}

/// Prepend: the only regular-frequency path that rewrites the file, so it
/// runs under the rename-aside discipline. Writes the input records that
/// fall before the old first record, fills any remaining calendar gap with
/// missing records, copies the original file back in, then updates any
/// overlapping remainder in place.
fn prepend_data(
    path: &Path,
    series: &Series,
    freq: Frequency,
    first_record_time: i64,
    change_set: &mut ChangeSet,
) -> Result<(), RiverbedError> {
    let overlap_start = series
        .timestamps
        .iter()
        .position(|t| *t >= first_record_time);
    let before_count = overlap_start.unwrap_or(series.len());

    rename_aside(path, ".tmp", |original| {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // Write all the data up to the original first record
        for i in 0..before_count {
            let (timestamp, value) = (series.timestamps[i], series.values[i]);
            change_set.push_created(timestamp, value);
            writer.write_all(&pack_value(timestamp, value))?;
        }

        // Fill any missing values between the end of the new series and the
        // start of the old
        let last = series.timestamps[series.len() - 1];
        write_missing(
            &mut writer,
            freq,
            freq.tick(1, last)?,
            freq.tick(-1, first_record_time)?,
            change_set,
        )?;

        // Copy over existing data
        let mut original_data = File::open(original)?;
        std::io::copy(&mut original_data, &mut writer)?;
        writer.flush()?;
        Ok(())
    })?;

    // Update existing data
    if let Some(split) = overlap_start {
        let mut remainder = Series::with_capacity(series.len() - split);
        for i in split..series.len() {
            remainder.push(series.timestamps[i], series.values[i]);
        }
        update_existing_data(path, &remainder, freq, change_set)?;
    }

    Ok(())
}

/// Smart write of irregular data: modified and new records are computed
/// against the whole file, then the series is either stream-appended (input
/// strictly after the existing data) or merged and rewritten under the
/// rename-aside discipline. New NaN values overwrite existing values.
fn write_irregular_data(
    path: &Path,
    series: &Series,
    last_record_time: i64,
    mut change_set: ChangeSet,
) -> Result<ChangeSet, RiverbedError> {
    let mut existing: BTreeMap<i64, (f64, i32)> = BTreeMap::new();
    {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        while let Some((timestamp, value, meta)) = read_record(&mut reader)? {
            existing.insert(timestamp, (value, meta));
        }
    }

    let mut any_overlap = false;
    for (timestamp, value) in series.iter() {
        match existing.get(&timestamp) {
            Some((existing_value, existing_meta)) => {
                any_overlap = true;
                let existing_missing = *existing_meta == METADATA_MISSING_VALUE;
                let unchanged = if existing_missing {
                    value.is_nan()
                } else {
                    !value.is_nan() && value == *existing_value
                };
                if !unchanged {
                    if existing_missing {
                        change_set.push_updated(timestamp, MISSING_VALUE, METADATA_MISSING_VALUE);
                    } else {
                        change_set.push_updated(timestamp, *existing_value, *existing_meta);
                    }
                    change_set.push_created(timestamp, value);
                }
            }
            None => {
                change_set.push_created(timestamp, value);
            }
        }
    }

    if change_set.is_empty() {
        return Ok(change_set);
    }

    let append_only = !any_overlap && last_record_time < series.timestamps[0];
    if append_only {
        let file = OpenOptions::new().append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        for (timestamp, value) in series.iter() {
            writer.write_all(&pack_value(timestamp, value))?;
        }
        writer.flush()?;
        return Ok(change_set);
    }

    // Merge in memory: the new series overlays the existing one, with the
    // stored meta flags of untouched records preserved.
    let mut merged = existing;
    for (timestamp, value) in series.iter() {
        let record = LogRecord::from_value(timestamp, value);
        merged.insert(timestamp, (record.value, record.meta));
    }

    rename_aside(path, ".backup", |_original| {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        for (timestamp, (value, meta)) in &merged {
            writer.write_all(&pack_record(*timestamp, *value, *meta))?;
        }
        writer.flush()?;
        Ok(())
    })?;

    Ok(change_set)
}

fn write_missing<W: Write>(
    writer: &mut W,
    freq: Frequency,
    first: i64,
    last: i64,
    change_set: &mut ChangeSet,
) -> Result<(), RiverbedError> {
    for timestamp in freq.range(first, last)? {
        change_set.created.push(LogRecord::new(
            timestamp,
            MISSING_VALUE,
            METADATA_MISSING_VALUE,
        ));
        writer.write_all(&pack_record(timestamp, MISSING_VALUE, METADATA_MISSING_VALUE))?;
    }
    Ok(())
}

/// The first and last raw records of a data file, or None if it is empty.
fn first_and_last_record(
    path: &Path,
) -> Result<Option<((i64, f64, i32), (i64, f64, i32))>, RiverbedError> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(None);
    }
    if len % RECORD_SIZE as u64 != 0 {
        return Err(RiverbedError::CorruptRecord(format!(
            "{} is {} bytes, not a whole number of records",
            path.display(),
            len
        )));
    }

    let first = match read_record(&mut file)? {
        Some(record) => record,
        None => return Ok(None),
    };
    file.seek(SeekFrom::End(-(RECORD_SIZE as i64)))?;
    let last = match read_record(&mut file)? {
        Some(record) => record,
        None => return Ok(None),
    };
    Ok(Some((first, last)))
}

/// Runs a destructive rewrite under the rename-aside discipline: the
/// original file is renamed to a sibling, the body writes the replacement,
/// and the sibling is deleted on success. On any failure the original is
/// renamed back before the error propagates.
pub(crate) fn rename_aside<T, F>(
    path: &Path,
    suffix: &str,
    body: F,
) -> Result<T, RiverbedError>
where
    F: FnOnce(&Path) -> Result<T, RiverbedError>,
{
    let aside = sibling_path(path, suffix);
    fs::rename(path, &aside)?;

    match body(&aside) {
        Ok(value) => {
            fs::remove_file(&aside)?;
            Ok(value)
        }
        Err(e) => {
            error!(
                "error rewriting {}, restoring original. No data change made.",
                path.display()
            );
            let _ = fs::remove_file(path);
            if let Err(restore_error) = fs::rename(&aside, path) {
                error!(
                    "could not restore {} from {}: {}",
                    path.display(),
                    aside.display(),
                    restore_error
                );
            }
            Err(e)
        }
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
