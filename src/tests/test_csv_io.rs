use crate::dates::date_string_to_timestamp;
use crate::errors::RiverbedError;
use crate::io::csv_io::read_points;

/*
Read a CSV file with two data columns. The empty cell in the second column
must come back as NaN.
 */
#[test]
fn test_read_csv_points() {
    let series = match read_points("./src/tests/example_data/test.csv") {
        Ok(v) => v,
        Err(_) => panic!("Error reading csv."),
    };

    assert_eq!(series.len(), 2);
    assert_eq!(series[0].name, "flow");
    assert_eq!(series[1].name, "level");

    assert_eq!(series[0].points.len(), 4);
    assert_eq!(
        series[0].points[0],
        (date_string_to_timestamp("2014-01-01").unwrap(), 1.0)
    );
    assert_eq!(series[0].points[3].1, 4.1);

    assert_eq!(series[1].points[0].1, 0.35);
    assert!(series[1].points[1].1.is_nan());
    assert_eq!(series[1].points[2].1, 0.37);
}

#[test]
fn test_read_csv_bad_value_reports_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(&path, "Time,flow\n2014-01-01,1.0\n2014-01-02,not-a-number\n").unwrap();

    match read_points(path.to_str().unwrap()) {
        Err(RiverbedError::DataError(msg)) => {
            assert!(msg.contains("line 3"));
        }
        other => panic!("expected DataError, got {:?}", other),
    }
}

#[test]
fn test_read_csv_bad_date() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad_date.csv");
    std::fs::write(&path, "Time,flow\nnot-a-date,1.0\n").unwrap();

    assert!(matches!(
        read_points(path.to_str().unwrap()),
        Err(RiverbedError::DataError(_))
    ));
}

/*
Datetime stamps are detected from the first row and held for the rest of
the file.
 */
#[test]
fn test_read_csv_datetime_column() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hourly.csv");
    std::fs::write(
        &path,
        "Time,flow\n2014-01-01T00:00:00,1.0\n2014-01-01T01:00:00,2.0\n",
    )
    .unwrap();

    let series = read_points(path.to_str().unwrap()).unwrap();
    assert_eq!(series[0].points.len(), 2);
    let t0 = date_string_to_timestamp("2014-01-01").unwrap();
    assert_eq!(series[0].points[0].0, t0);
    assert_eq!(series[0].points[1].0, t0 + 3600);
}
