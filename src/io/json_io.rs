use std::fs::File;
use std::io::BufReader;

use serde_derive::Deserialize;

use crate::dates::date_string_to_timestamp_flexible;
use crate::errors::RiverbedError;

/// One observation in a JSON input document. A null (or absent) value is a
/// missing observation.
#[derive(Debug, Deserialize)]
struct JsonPoint {
    time: String,
    #[serde(default)]
    value: Option<f64>,
}

/// Reads a JSON array of `{"time": "...", "value": x|null}` objects into
/// ordered (timestamp, value) points. Date formats are auto-detected per
/// entry, so mixed date and datetime strings are accepted.
pub fn read_points(filename: &str) -> Result<Vec<(i64, f64)>, RiverbedError> {
    let file = File::open(filename)?;
    let reader = BufReader::new(file);
    let raw: Vec<JsonPoint> = serde_json::from_reader(reader)
        .map_err(|e| RiverbedError::DataError(format!("Failed to parse '{}': {}", filename, e)))?;

    let mut points = Vec::with_capacity(raw.len());
    for entry in raw {
        let (t, _) = date_string_to_timestamp_flexible(&entry.time)
            .map_err(RiverbedError::DataError)?;
        points.push((t, entry.value.unwrap_or(f64::NAN)));
    }
    Ok(points)
}
