use chrono::{DateTime, Datelike, NaiveDate, Timelike};

use crate::dates::timestamp_to_auto_string;
use crate::errors::RiverbedError;
use crate::timeseries::Series;

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3600;
const SECONDS_PER_DAY: i64 = 86400;

/// The supported data frequencies. Regular variants carry tick arithmetic;
/// Irregular series have no tick spacing and no gap concept.
#[derive(Debug)]
#[derive(Clone, Copy)]
#[derive(PartialEq, Eq)]
pub enum Frequency {
    Daily,             //"D": midnight UTC each day
    Hourly,            //"H": on the hour
    Minutes(u32),      //"NT" or "Nmin": every N minutes, N >= 1
    MonthEnd,          //"M": midnight on the last day of each month
    MonthStart,        //"MS": midnight on the first day of each month
    Irregular,         //"IRR": arbitrary ascending timestamps
}

impl Frequency {
    /// Parses a frequency label. Accepted labels: "D", "H", "M", "MS",
    /// "IRR", "T"/"NT" and "Nmin" for N-minute data (e.g. "15T", "30min").
    pub fn parse(label: &str) -> Result<Frequency, RiverbedError> {
        let label = label.trim();
        match label {
            "D" => return Ok(Frequency::Daily),
            "H" => return Ok(Frequency::Hourly),
            "M" => return Ok(Frequency::MonthEnd),
            "MS" => return Ok(Frequency::MonthStart),
            "IRR" => return Ok(Frequency::Irregular),
            "T" => return Ok(Frequency::Minutes(1)),
            _ => {}
        }

        let digits = if let Some(stripped) = label.strip_suffix('T') {
            Some(stripped)
        } else if let Some(stripped) = label.strip_suffix("min") {
            Some(stripped)
        } else {
            label.strip_suffix("Min")
        };

        if let Some(digits) = digits {
            let n = digits.parse::<u32>().map_err(|_| {
                RiverbedError::CalendarError(format!("unknown frequency '{}'", label))
            })?;
            if n == 0 {
                return Err(RiverbedError::CalendarError(
                    "minute frequency multiple must be >= 1".to_string(),
                ));
            }
            return Ok(Frequency::Minutes(n));
        }

        Err(RiverbedError::CalendarError(format!(
            "unknown frequency '{}'",
            label
        )))
    }

    /// The canonical label, as stored in the catalog.
    pub fn label(&self) -> String {
        match self {
            Frequency::Daily => "D".to_string(),
            Frequency::Hourly => "H".to_string(),
            Frequency::Minutes(n) => format!("{}T", n),
            Frequency::MonthEnd => "M".to_string(),
            Frequency::MonthStart => "MS".to_string(),
            Frequency::Irregular => "IRR".to_string(),
        }
    }

    pub fn is_regular(&self) -> bool {
        !matches!(self, Frequency::Irregular)
    }

    //Fixed tick width in seconds, where one exists. Month-anchored
    //frequencies have no fixed width and use calendar arithmetic instead.
    fn step_seconds(&self) -> Option<i64> {
        match self {
            Frequency::Daily => Some(SECONDS_PER_DAY),
            Frequency::Hourly => Some(SECONDS_PER_HOUR),
            Frequency::Minutes(n) => Some(SECONDS_PER_MINUTE * (*n as i64)),
            _ => None,
        }
    }

    fn no_tick_arithmetic(&self) -> RiverbedError {
        RiverbedError::CalendarError(
            "irregular frequency has no tick arithmetic".to_string(),
        )
    }

    /// The i-th tick from `anchor` (i may be negative). `anchor` must be an
    /// aligned timestamp of this frequency.
    pub fn tick(&self, i: i64, anchor: i64) -> Result<i64, RiverbedError> {
        match self {
            Frequency::Irregular => Err(self.no_tick_arithmetic()),
            Frequency::MonthEnd => Ok(month_end_timestamp(month_index(anchor)? + i)),
            Frequency::MonthStart => Ok(month_start_timestamp(month_index(anchor)? + i)),
            _ => Ok(anchor + i * self.step_seconds().unwrap()),
        }
    }

    /// The signed number of ticks from `a` to `b`. Both must be aligned
    /// timestamps of this frequency.
    pub fn offset(&self, a: i64, b: i64) -> Result<i64, RiverbedError> {
        match self {
            Frequency::Irregular => Err(self.no_tick_arithmetic()),
            Frequency::MonthEnd | Frequency::MonthStart => {
                Ok(month_index(b)? - month_index(a)?)
            }
            _ => Ok((b - a).div_euclid(self.step_seconds().unwrap())),
        }
    }

    /// The inclusive tick sequence from `a` to `b`; empty when `a > b`.
    pub fn range(&self, a: i64, b: i64) -> Result<Vec<i64>, RiverbedError> {
        if let Frequency::Irregular = self {
            return Err(self.no_tick_arithmetic());
        }
        if a > b {
            return Ok(Vec::new());
        }
        let n = self.offset(a, b)? + 1;
        let mut ticks = Vec::with_capacity(n as usize);
        for i in 0..n {
            ticks.push(self.tick(i, a)?);
        }
        Ok(ticks)
    }

    /// Whether `ts` sits exactly on a tick of this frequency. Irregular
    /// accepts everything.
    pub fn is_aligned(&self, ts: i64) -> bool {
        match self {
            Frequency::Irregular => true,
            Frequency::MonthEnd => match month_index(ts) {
                Ok(idx) => ts == month_end_timestamp(idx),
                Err(_) => false,
            },
            Frequency::MonthStart => match month_index(ts) {
                Ok(idx) => ts == month_start_timestamp(idx),
                Err(_) => false,
            },
            _ => ts.rem_euclid(self.step_seconds().unwrap()) == 0,
        }
    }

    /// Normalises raw input points into a series ready for storage: sorts
    /// ascending, rejects duplicate timestamps, and for regular frequencies
    /// verifies alignment and reindexes onto the dense tick grid covering
    /// the input span, with absent slots becoming NaN.
    pub fn normalise(&self, points: &[(i64, f64)]) -> Result<Series, RiverbedError> {
        let mut pts = points.to_vec();
        pts.sort_by_key(|(t, _)| *t);

        for pair in pts.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(RiverbedError::CalendarError(format!(
                    "duplicate timestamp {} in input",
                    timestamp_to_auto_string(pair[0].0)
                )));
            }
        }

        if !self.is_regular() {
            return Ok(Series::from_points(&pts));
        }

        for (t, _) in &pts {
            if !self.is_aligned(*t) {
                return Err(RiverbedError::CalendarError(format!(
                    "timestamp {} is not aligned to frequency {}",
                    timestamp_to_auto_string(*t),
                    self.label()
                )));
            }
        }

        if pts.is_empty() {
            return Ok(Series::new());
        }

        let grid = self.range(pts[0].0, pts[pts.len() - 1].0)?;
        let mut series = Series::with_capacity(grid.len());
        let mut j = 0;
        for t in grid {
            if j < pts.len() && pts[j].0 == t {
                series.push(t, pts[j].1);
                j += 1;
            } else {
                series.push(t, f64::NAN);
            }
        }
        Ok(series)
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

//Months since year zero. Errors on timestamps outside the chrono range or
//not at midnight UTC (month ticks are always midnight-anchored).
fn month_index(ts: i64) -> Result<i64, RiverbedError> {
    let dt = DateTime::from_timestamp(ts, 0).ok_or_else(|| {
        RiverbedError::CalendarError(format!("timestamp {} out of range", ts))
    })?;
    if dt.hour() != 0 || dt.minute() != 0 || dt.second() != 0 {
        return Err(RiverbedError::CalendarError(format!(
            "timestamp {} is not midnight-anchored",
            ts
        )));
    }
    Ok(dt.year() as i64 * 12 + (dt.month() as i64 - 1))
}

fn month_start_timestamp(index: i64) -> i64 {
    let year = index.div_euclid(12) as i32;
    let month = (index.rem_euclid(12) + 1) as u32;
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
        .timestamp()
}

fn month_end_timestamp(index: i64) -> i64 {
    // Midnight on the last day of the month: one day short of the next
    // month's start.
    month_start_timestamp(index + 1) - SECONDS_PER_DAY
}
