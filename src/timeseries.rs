// Design concepts:
// -----------------
// A Series is the in-memory form of one timeseries: parallel vectors of Unix
// timestamps (UTC seconds, i64 to match the on-disk record) and f64 values.
// Missing observations are NaN in memory; the storage layer owns the
// translation to the on-disk sentinel.

#[derive(Clone)]
#[derive(Debug)]
#[derive(Default)]
pub struct Series {
    pub timestamps: Vec<i64>,      //All the timestamps in Unix seconds (UTC)
    pub values: Vec<f64>,          //All the values, NaN for missing
}

impl Series {
    pub fn new() -> Series {
        Series {
            timestamps: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn with_capacity(n: usize) -> Series {
        Series {
            timestamps: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
        }
    }

    /*
    Builds a series straight from (timestamp, value) pairs in the order given.
     */
    pub fn from_points(points: &[(i64, f64)]) -> Series {
        let mut s = Series::with_capacity(points.len());
        for (t, v) in points {
            s.push(*t, *v);
        }
        s
    }

    /*
    Adds a new value to the end of the Series.
    */
    pub fn push(&mut self, timestamp: i64, value: f64) {
        self.timestamps.push(timestamp);
        self.values.push(value)
    }

    /*
    Returns the number of values in the series including missing values.
     */
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /*
    Counts the non-missing (non-NaN) values in a series.
    */
    pub fn count_not_missing(&self) -> usize {
        self.values.iter().filter(|&x| !f64::is_nan(*x)).count()
    }

    /*
    Counts the finite values in a series. This means all values that are not
    NaN, and not infinite.
    */
    pub fn count_finite(&self) -> usize {
        self.values.iter().filter(|&x| f64::is_finite(*x)).count()
    }

    /*
    Two series are equivalent when they agree timestamp-for-timestamp, with
    NaN matching NaN. Plain == is useless here because NaN != NaN.
     */
    pub fn same_as(&self, other: &Series) -> bool {
        if self.timestamps != other.timestamps {
            return false;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .all(|(a, b)| (a.is_nan() && b.is_nan()) || a == b)
    }
}
