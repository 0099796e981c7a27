use std::fs;
use std::path::{Path, PathBuf};

use crate::calendar::Frequency;
use crate::changeset::LogRecord;
use crate::dates::{date_string_to_timestamp, date_string_to_timestamp_flexible};
use crate::errors::RiverbedError;
use crate::io::data_file::{read_all, rename_aside, repair, write};
use crate::record::{DEFAULT_META_ID, METADATA_MISSING_VALUE, MISSING_VALUE, RECORD_SIZE};

fn d(s: &str) -> i64 {
    date_string_to_timestamp(s).unwrap()
}

fn t(s: &str) -> i64 {
    date_string_to_timestamp_flexible(s).unwrap().0
}

fn setup() -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("write_test.dat");
    (dir, path)
}

/*
Seeds a data file with the daily series 1.0, 2.0, 3.0 over 2014-01-01 to
2014-01-03, the starting point most of the update tests share.
 */
fn seed_daily(path: &Path) {
    let points = vec![
        (d("2014-01-01"), 1.0),
        (d("2014-01-02"), 2.0),
        (d("2014-01-03"), 3.0),
    ];
    let change_set = write(path, &points, Frequency::Daily).unwrap();
    assert_eq!(change_set.created.len(), 3);
    assert!(change_set.updated.is_empty());
}

#[test]
fn test_new_write_is_byte_exact() {
    let (_dir, path) = setup();
    seed_daily(&path);

    // Three dense records of 20 bytes: timestamp i64, value f64, meta i32,
    // all little-endian.
    let mut expected = Vec::new();
    for (ts, value) in &[
        (1388534400i64, 1.0f64),
        (1388620800, 2.0),
        (1388707200, 3.0),
    ] {
        expected.extend_from_slice(&ts.to_le_bytes());
        expected.extend_from_slice(&value.to_le_bytes());
        expected.extend_from_slice(&0i32.to_le_bytes());
    }

    let datafile = fs::read(&path).unwrap();
    assert_eq!(datafile.len(), 60);
    assert_eq!(datafile, expected);

    let data = read_all(&path).unwrap();
    assert_eq!(data.values, vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_new_write_with_missing() {
    let (_dir, path) = setup();
    let points = vec![
        (d("2014-01-01"), 1.0),
        (d("2014-01-02"), f64::NAN),
        (d("2014-01-03"), 3.0),
    ];
    write(&path, &points, Frequency::Daily).unwrap();

    let data = read_all(&path).unwrap();
    assert_eq!(1.0, data.values[0]);
    assert!(data.values[1].is_nan());
    assert_eq!(3.0, data.values[2]);
}

#[test]
fn test_empty_input_writes_nothing() {
    let (_dir, path) = setup();
    let change_set = write(&path, &[], Frequency::Daily).unwrap();
    assert!(change_set.is_empty());
    assert!(!path.exists());
}

#[test]
fn test_update_single() {
    let (_dir, path) = setup();
    seed_daily(&path);

    let change_set = write(&path, &[(d("2014-01-02"), 2.5)], Frequency::Daily).unwrap();
    assert_eq!(
        change_set.updated,
        vec![LogRecord::new(1388620800, 2.0, DEFAULT_META_ID)]
    );
    assert_eq!(
        change_set.created,
        vec![LogRecord::new(1388620800, 2.5, DEFAULT_META_ID)]
    );

    let data = read_all(&path).unwrap();
    assert_eq!(data.values, vec![1.0, 2.5, 3.0]);
}

#[test]
fn test_update_multiple() {
    let (_dir, path) = setup();
    seed_daily(&path);

    let points = vec![(d("2014-01-02"), 2.5), (d("2014-01-03"), 3.5)];
    let change_set = write(&path, &points, Frequency::Daily).unwrap();
    assert_eq!(change_set.updated.len(), 2);
    assert_eq!(change_set.updated[0], LogRecord::new(1388620800, 2.0, 0));
    assert_eq!(change_set.updated[1], LogRecord::new(1388707200, 3.0, 0));

    let data = read_all(&path).unwrap();
    assert_eq!(data.values, vec![1.0, 2.5, 3.5]);
}

#[test]
fn test_append_multiple() {
    let (_dir, path) = setup();
    seed_daily(&path);

    let points = vec![
        (d("2014-01-04"), 4.0),
        (d("2014-01-05"), 5.0),
        (d("2014-01-06"), 6.0),
    ];
    let change_set = write(&path, &points, Frequency::Daily).unwrap();
    assert!(change_set.updated.is_empty());
    assert_eq!(change_set.created.len(), 3);

    let data = read_all(&path).unwrap();
    assert_eq!(data.values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_update_and_append() {
    let (_dir, path) = setup();
    seed_daily(&path);

    let points = vec![
        (d("2014-01-02"), 2.5),
        (d("2014-01-03"), 3.0),
        (d("2014-01-04"), 4.0),
        (d("2014-01-05"), 5.0),
        (d("2014-01-06"), 6.0),
    ];
    let change_set = write(&path, &points, Frequency::Daily).unwrap();

    // Only 2014-01-02 actually changed; 2014-01-03 was already 3.0.
    assert_eq!(change_set.updated, vec![LogRecord::new(1388620800, 2.0, 0)]);

    let data = read_all(&path).unwrap();
    assert_eq!(data.values, vec![1.0, 2.5, 3.0, 4.0, 5.0, 6.0]);
    assert_eq!(
        data.timestamps,
        (0..6).map(|i| d("2014-01-01") + i * 86400).collect::<Vec<i64>>()
    );
}

#[test]
fn test_append_with_gap_fills_missing() {
    let (_dir, path) = setup();
    seed_daily(&path);

    let points = vec![(d("2014-01-05"), 5.0), (d("2014-01-06"), 6.0)];
    let change_set = write(&path, &points, Frequency::Daily).unwrap();

    assert!(change_set.updated.is_empty());
    assert_eq!(
        change_set.created,
        vec![
            LogRecord::new(d("2014-01-04"), MISSING_VALUE, METADATA_MISSING_VALUE),
            LogRecord::new(d("2014-01-05"), 5.0, DEFAULT_META_ID),
            LogRecord::new(d("2014-01-06"), 6.0, DEFAULT_META_ID),
        ]
    );

    let data = read_all(&path).unwrap();
    assert_eq!(data.len(), 6);
    assert_eq!(data.values[0..3], [1.0, 2.0, 3.0]);
    assert!(data.values[3].is_nan());
    assert_eq!(data.values[4..6], [5.0, 6.0]);
}

#[test]
fn test_update_to_nan_reports_prior_values() {
    let (_dir, path) = setup();
    seed_daily(&path);

    let points = vec![(d("2014-01-02"), f64::NAN), (d("2014-01-03"), 3.5)];
    let change_set = write(&path, &points, Frequency::Daily).unwrap();

    assert_eq!(change_set.updated.len(), 2);
    assert_eq!(change_set.updated[0], LogRecord::new(1388620800, 2.0, 0));
    assert_eq!(change_set.updated[1], LogRecord::new(1388707200, 3.0, 0));
    // The NaN input lands in the change set as the sentinel triple.
    assert_eq!(
        change_set.created[0],
        LogRecord::new(1388620800, MISSING_VALUE, METADATA_MISSING_VALUE)
    );

    let data = read_all(&path).unwrap();
    assert_eq!(data.values[0], 1.0);
    assert!(data.values[1].is_nan());
    assert_eq!(data.values[2], 3.5);
}

#[test]
fn test_appended_nan_is_stored_missing() {
    let (_dir, path) = setup();
    seed_daily(&path);

    let points = vec![
        (d("2014-01-04"), 4.0),
        (d("2014-01-05"), f64::NAN),
        (d("2014-01-06"), 6.5),
    ];
    let change_set = write(&path, &points, Frequency::Daily).unwrap();
    assert!(change_set.updated.is_empty());

    let data = read_all(&path).unwrap();
    assert_eq!(data.values[3], 4.0);
    assert!(data.values[4].is_nan());
    assert_eq!(data.values[5], 6.5);
}

/*
Writing a real value into a missing slot is a fill: the record is created,
not updated.
 */
#[test]
fn test_fill_missing_slot_is_creation() {
    let (_dir, path) = setup();
    seed_daily(&path);
    write(&path, &[(d("2014-01-05"), 5.0)], Frequency::Daily).unwrap(); // leaves 01-04 missing

    let change_set = write(&path, &[(d("2014-01-04"), 4.0)], Frequency::Daily).unwrap();
    assert!(change_set.updated.is_empty());
    assert_eq!(change_set.created, vec![LogRecord::new(d("2014-01-04"), 4.0, 0)]);

    let data = read_all(&path).unwrap();
    assert_eq!(data.values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn test_nan_over_missing_slot_is_noop() {
    let (_dir, path) = setup();
    seed_daily(&path);
    write(&path, &[(d("2014-01-05"), 5.0)], Frequency::Daily).unwrap();
    let before = fs::read(&path).unwrap();

    let change_set = write(&path, &[(d("2014-01-04"), f64::NAN)], Frequency::Daily).unwrap();
    assert!(change_set.is_empty());
    assert_eq!(fs::read(&path).unwrap(), before);
}

/*
Writing the current on-disk series straight back must change nothing: empty
change set, byte-identical file.
 */
#[test]
fn test_noop_write_is_idempotent() {
    let (_dir, path) = setup();
    seed_daily(&path);
    write(&path, &[(d("2014-01-05"), 5.0)], Frequency::Daily).unwrap();
    let before = fs::read(&path).unwrap();

    let current = read_all(&path).unwrap();
    let points: Vec<(i64, f64)> = current.iter().collect();
    let change_set = write(&path, &points, Frequency::Daily).unwrap();

    assert!(change_set.is_empty());
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_overlapping_hourly() {
    let (_dir, path) = setup();
    let input_a = vec![
        (t("2014-01-01T00:00:00"), 1.0),
        (t("2014-01-01T01:00:00"), 2.0),
        (t("2014-01-01T02:00:00"), 3.0),
    ];
    let input_b = vec![
        (t("2014-01-01T02:00:00"), 4.0),
        (t("2014-01-01T03:00:00"), 5.0),
        (t("2014-01-01T04:00:00"), 6.0),
        (t("2014-01-01T05:00:00"), 7.0),
    ];

    write(&path, &input_a, Frequency::Hourly).unwrap();
    let change_set = write(&path, &input_b, Frequency::Hourly).unwrap();
    assert_eq!(change_set.updated, vec![LogRecord::new(1388541600, 3.0, 0)]);

    let data = read_all(&path).unwrap();
    assert_eq!(data.values, vec![1.0, 2.0, 4.0, 5.0, 6.0, 7.0]);
}

#[test]
fn test_append_30min_with_gap() {
    let (_dir, path) = setup();
    let initial = vec![
        (t("2014-08-30T00:00:00"), 17.2),
        (t("2014-08-30T00:30:00"), 17.5),
    ];
    write(&path, &initial, Frequency::Minutes(30)).unwrap();

    let new_data = vec![
        (t("2014-08-30T02:00:00"), 6.0),
        (t("2014-08-30T02:30:00"), 6.3),
    ];
    let change_set = write(&path, &new_data, Frequency::Minutes(30)).unwrap();
    assert!(change_set.updated.is_empty());

    let data = read_all(&path).unwrap();
    assert_eq!(data.len(), 6);
    assert_eq!(data.values[0], 17.2);
    assert!(data.values[2].is_nan());
    assert!(data.values[3].is_nan());
    assert_eq!(data.values[4], 6.0);
    assert_eq!(data.values[5], 6.3);
}

#[test]
fn test_write_monthly_end_data() {
    let (_dir, path) = setup();
    let points = vec![
        (d("2014-06-30"), 6.0),
        (d("2014-07-31"), 7.3),
        (d("2014-08-31"), 8.0),
        (d("2014-09-30"), 9.1),
    ];
    let change_set = write(&path, &points, Frequency::MonthEnd).unwrap();
    assert!(change_set.updated.is_empty());

    let data = read_all(&path).unwrap();
    assert_eq!(data.values, vec![6.0, 7.3, 8.0, 9.1]);
}

#[test]
fn test_append_monthly_end_data() {
    let (_dir, path) = setup();
    let points = vec![(d("1900-11-30"), 11.0), (d("1900-12-31"), 12.0)];
    write(&path, &points, Frequency::MonthEnd).unwrap();

    // February lands two month-ticks after December; January is filled.
    let change_set = write(&path, &[(d("1901-02-28"), 28.2)], Frequency::MonthEnd).unwrap();
    assert!(change_set.updated.is_empty());
    assert_eq!(
        change_set.created,
        vec![
            LogRecord::new(d("1901-01-31"), MISSING_VALUE, METADATA_MISSING_VALUE),
            LogRecord::new(d("1901-02-28"), 28.2, DEFAULT_META_ID),
        ]
    );

    let data = read_all(&path).unwrap();
    assert_eq!(data.len(), 4);
    assert!(data.values[2].is_nan());
    assert_eq!(data.values[3], 28.2);
}

#[test]
fn test_append_monthly_start_data() {
    let (_dir, path) = setup();
    let points = vec![(d("1900-12-01"), 12.0)];
    write(&path, &points, Frequency::MonthStart).unwrap();

    let change_set = write(&path, &[(d("1901-02-01"), 2.0)], Frequency::MonthStart).unwrap();
    assert_eq!(change_set.created.len(), 2); // January filled, February written

    let data = read_all(&path).unwrap();
    assert_eq!(data.timestamps, vec![d("1900-12-01"), d("1901-01-01"), d("1901-02-01")]);
}

#[test]
fn test_prepend_with_gap() {
    let (_dir, path) = setup();
    let points = vec![(d("2014-01-05"), 5.0), (d("2014-01-06"), 6.0)];
    write(&path, &points, Frequency::Daily).unwrap();

    let early = vec![(d("2014-01-01"), 1.0), (d("2014-01-02"), 2.0)];
    let change_set = write(&path, &early, Frequency::Daily).unwrap();

    assert!(change_set.updated.is_empty());
    assert_eq!(
        change_set.created,
        vec![
            LogRecord::new(d("2014-01-01"), 1.0, DEFAULT_META_ID),
            LogRecord::new(d("2014-01-02"), 2.0, DEFAULT_META_ID),
            LogRecord::new(d("2014-01-03"), MISSING_VALUE, METADATA_MISSING_VALUE),
            LogRecord::new(d("2014-01-04"), MISSING_VALUE, METADATA_MISSING_VALUE),
        ]
    );

    let data = read_all(&path).unwrap();
    assert_eq!(data.len(), 6);
    assert_eq!(data.values[0..2], [1.0, 2.0]);
    assert!(data.values[2].is_nan());
    assert!(data.values[3].is_nan());
    assert_eq!(data.values[4..6], [5.0, 6.0]);

    // No rename-aside leftovers
    assert!(!path.with_file_name("write_test.dat.tmp").exists());
}

#[test]
fn test_prepend_with_overlap() {
    let (_dir, path) = setup();
    let points = vec![(d("2014-01-05"), 5.0), (d("2014-01-06"), 6.0)];
    write(&path, &points, Frequency::Daily).unwrap();

    let early = vec![(d("2014-01-03"), 3.0), (d("2014-01-05"), 5.5)];
    let change_set = write(&path, &early, Frequency::Daily).unwrap();

    // The overlapping record is updated in place by the recursive pass.
    assert_eq!(change_set.updated, vec![LogRecord::new(d("2014-01-05"), 5.0, 0)]);

    let data = read_all(&path).unwrap();
    assert_eq!(data.timestamps.len(), 4);
    assert_eq!(data.values[0], 3.0);
    assert!(data.values[1].is_nan());
    assert_eq!(data.values[2], 5.5);
    assert_eq!(data.values[3], 6.0);
}

#[test]
fn test_irregular_write() {
    let (_dir, path) = setup();
    let points = vec![
        (d("1900-01-01"), 1.0),
        (d("1900-03-01"), 2.0),
        (d("1900-04-01"), 3.0),
        (d("1900-06-01"), 4.0),
    ];
    let change_set = write(&path, &points, Frequency::Irregular).unwrap();
    assert!(change_set.updated.is_empty());

    let data = read_all(&path).unwrap();
    assert_eq!(
        data.timestamps,
        vec![d("1900-01-01"), d("1900-03-01"), d("1900-04-01"), d("1900-06-01")]
    );
    assert_eq!(data.values, vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_irregular_update_and_append() {
    let (_dir, path) = setup();
    seed_daily(&path);

    let points = vec![
        (d("2014-01-02"), 2.5),
        (d("2014-01-03"), 3.0),
        (d("2014-01-05"), 5.0),
        (d("2014-01-07"), 7.0),
        (d("2014-01-08"), 8.0),
    ];
    let change_set = write(&path, &points, Frequency::Irregular).unwrap();

    assert_eq!(change_set.updated, vec![LogRecord::new(1388620800, 2.0, 0)]);
    assert_eq!(
        change_set.created,
        vec![
            LogRecord::new(d("2014-01-02"), 2.5, 0),
            LogRecord::new(d("2014-01-05"), 5.0, 0),
            LogRecord::new(d("2014-01-07"), 7.0, 0),
            LogRecord::new(d("2014-01-08"), 8.0, 0),
        ]
    );

    let data = read_all(&path).unwrap();
    assert_eq!(data.values, vec![1.0, 2.5, 3.0, 5.0, 7.0, 8.0]);
    assert_eq!(
        data.timestamps,
        vec![
            d("2014-01-01"),
            d("2014-01-02"),
            d("2014-01-03"),
            d("2014-01-05"),
            d("2014-01-07"),
            d("2014-01-08"),
        ]
    );
}

#[test]
fn test_irregular_update_to_nan() {
    let (_dir, path) = setup();
    seed_daily(&path);

    let points = vec![(d("2014-01-02"), 2.0), (d("2014-01-03"), f64::NAN)];
    let change_set = write(&path, &points, Frequency::Irregular).unwrap();

    assert_eq!(change_set.updated, vec![LogRecord::new(1388707200, 3.0, 0)]);

    let data = read_all(&path).unwrap();
    assert_eq!(data.values[1], 2.0);
    assert!(data.values[2].is_nan());
}

/*
Updating a record that is currently missing reports the stored sentinel
triple as the prior value.
 */
#[test]
fn test_irregular_update_of_nan() {
    let (_dir, path) = setup();
    seed_daily(&path);
    write(&path, &[(d("2014-01-03"), f64::NAN)], Frequency::Irregular).unwrap();

    let change_set = write(&path, &[(d("2014-01-03"), 3.5)], Frequency::Irregular).unwrap();
    assert_eq!(
        change_set.updated,
        vec![LogRecord::new(1388707200, MISSING_VALUE, METADATA_MISSING_VALUE)]
    );
    assert_eq!(change_set.created, vec![LogRecord::new(1388707200, 3.5, 0)]);

    let data = read_all(&path).unwrap();
    assert_eq!(data.values[2], 3.5);
}

#[test]
fn test_irregular_noop_is_empty() {
    let (_dir, path) = setup();
    seed_daily(&path);
    let before = fs::read(&path).unwrap();

    let points = vec![(d("2014-01-01"), 1.0), (d("2014-01-03"), 3.0)];
    let change_set = write(&path, &points, Frequency::Irregular).unwrap();
    assert!(change_set.is_empty());
    assert_eq!(fs::read(&path).unwrap(), before);
}

/*
An injected failure mid-rewrite must leave the original file byte-identical;
the rename-aside discipline restores it.
 */
#[test]
fn test_rename_aside_rollback() {
    let (_dir, path) = setup();
    seed_daily(&path);
    let before = fs::read(&path).unwrap();

    let result: Result<(), RiverbedError> = rename_aside(&path, ".backup", |_original| {
        // A partial replacement gets written, then the rewrite dies.
        fs::write(&path, b"partial garbage").unwrap();
        Err(RiverbedError::DataError("injected failure".to_string()))
    });

    assert!(result.is_err());
    assert_eq!(fs::read(&path).unwrap(), before);
    assert!(!path.with_file_name("write_test.dat.backup").exists());
}

#[test]
fn test_partial_tail_detected_and_repaired() {
    let (_dir, path) = setup();
    seed_daily(&path);

    // Tear the tail as an interrupted append would.
    let mut bytes = fs::read(&path).unwrap();
    bytes.truncate(2 * RECORD_SIZE + 7);
    fs::write(&path, &bytes).unwrap();

    match read_all(&path) {
        Err(RiverbedError::CorruptRecord(_)) => {}
        other => panic!("expected CorruptRecord, got {:?}", other),
    }

    let dropped = repair(&path).unwrap();
    assert_eq!(dropped, 7);
    let data = read_all(&path).unwrap();
    assert_eq!(data.values, vec![1.0, 2.0]);

    // A whole file repairs to itself.
    assert_eq!(repair(&path).unwrap(), 0);
}

/*
A large append gap is filled in one streaming pass; the result has exactly
one record per hour between the two endpoints.
 */
#[test]
fn test_large_gap_append() {
    let (_dir, path) = setup();
    write(&path, &[(t("2005-01-01T00:00:00"), 1.0)], Frequency::Hourly).unwrap();
    let change_set = write(&path, &[(t("2014-12-31T00:00:00"), 2.0)], Frequency::Hourly).unwrap();

    let hours = (t("2014-12-31T00:00:00") - t("2005-01-01T00:00:00")) / 3600;
    assert_eq!(change_set.created.len() as i64, hours);

    let data = read_all(&path).unwrap();
    assert_eq!(data.len() as i64, hours + 1);
    assert_eq!(data.values[0], 1.0);
    assert_eq!(data.values[data.len() - 1], 2.0);
    assert!(data.values[1].is_nan());
    assert!(data.values[data.len() / 2].is_nan());
    assert_eq!(data.count_not_missing(), 2);
}
