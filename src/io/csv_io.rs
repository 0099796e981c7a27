extern crate csv;

use crate::dates::{date_string_to_timestamp_flexible, date_string_to_timestamp_with_format};
use crate::errors::RiverbedError;

/// One column of an input file: a series name and its ordered
/// (timestamp, value) points, ready for normalisation and writing.
#[derive(Debug, Clone)]
pub struct InputSeries {
    pub name: String,
    pub points: Vec<(i64, f64)>,
}

/// Reads a CSV file of timeseries points.
///
/// The first column is a date or datetime string (format auto-detected from
/// the first row, then held fixed); every remaining column is one series
/// named by its header. Empty cells are read as missing (NaN).
pub fn read_points(filename: &str) -> Result<Vec<InputSeries>, RiverbedError> {
    let mut reader = csv::Reader::from_path(filename)
        .map_err(|e| RiverbedError::DataError(format!("Failed to open '{}': {}", filename, e)))?;

    //Get the headers from the reader
    let mut answer: Vec<InputSeries> = Vec::new();
    let mut file_line = 1;
    let n_data_cols;
    match reader.headers() {
        Ok(headers) => {
            let headers_len = headers.len();
            n_data_cols = headers_len.saturating_sub(1); //exclude the time column
            for i in 1..headers_len {
                answer.push(InputSeries {
                    name: headers.get(i).unwrap_or("").to_string(),
                    points: Vec::new(),
                });
            }
        }
        Err(_) => {
            return Err(RiverbedError::DataError(format!(
                "Error reading '{filename}' line {file_line}."
            )));
        }
    };

    //The date format is detected on the first data row and then held fixed
    let mut date_format: Option<&'static str> = None;

    //Iterate through the records and parse the data
    for result in reader.records() {
        file_line += 1;

        let record = match result {
            Ok(r) => r,
            Err(_) => {
                return Err(RiverbedError::DataError(format!(
                    "Error reading '{filename}' line {file_line}."
                )));
            }
        };

        //Parse the time column
        let t_str = record.get(0).unwrap_or("").trim();
        let t = match date_format {
            Some(format) => date_string_to_timestamp_with_format(t_str, format)
                .map_err(RiverbedError::DataError)?,
            None => {
                let (t, format) = date_string_to_timestamp_flexible(t_str)
                    .map_err(RiverbedError::DataError)?;
                date_format = Some(format);
                t
            }
        };

        //Parse each data column into the respective series
        for i in 0..n_data_cols {
            let cell = record.get(i + 1).unwrap_or("").trim();
            let value = if cell.is_empty() {
                f64::NAN
            } else {
                match cell.parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => {
                        let one_based_data_column = i + 1;
                        return Err(RiverbedError::DataError(format!(
                            "Error reading '{filename}' line {file_line} data column {one_based_data_column}."
                        )));
                    }
                }
            };
            answer[i].points.push((t, value));
        }
    }

    Ok(answer)
}
