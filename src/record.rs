use crate::errors::RiverbedError;

/// On-disk width of one data record: timestamp (i64), value (f64), meta (i32),
/// all little-endian.
pub const RECORD_SIZE: usize = 20;

/// Value stored on disk for a missing observation.
pub const MISSING_VALUE: f64 = -9999.0;

/// Meta flag marking a record as missing.
pub const METADATA_MISSING_VALUE: i32 = 9999;

/// Meta flag for an ordinary observed value.
pub const DEFAULT_META_ID: i32 = 0;

/// Packs a record into its 20-byte on-disk form. A NaN value becomes the
/// missing sentinel pair regardless of the supplied meta flag.
pub fn pack_value(timestamp: i64, value: f64) -> [u8; RECORD_SIZE] {
    if value.is_nan() {
        pack_record(timestamp, MISSING_VALUE, METADATA_MISSING_VALUE)
    } else {
        pack_record(timestamp, value, DEFAULT_META_ID)
    }
}

/// Packs an explicit (timestamp, value, meta) triple without translation.
pub fn pack_record(timestamp: i64, value: f64, meta: i32) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];
    buf[0..8].copy_from_slice(&timestamp.to_le_bytes());
    buf[8..16].copy_from_slice(&value.to_le_bytes());
    buf[16..20].copy_from_slice(&meta.to_le_bytes());
    buf
}

/// Unpacks the raw (timestamp, value, meta) triple as stored.
pub fn unpack_record(buf: &[u8; RECORD_SIZE]) -> (i64, f64, i32) {
    let mut ts = [0u8; 8];
    let mut val = [0u8; 8];
    let mut meta = [0u8; 4];
    ts.copy_from_slice(&buf[0..8]);
    val.copy_from_slice(&buf[8..16]);
    meta.copy_from_slice(&buf[16..20]);
    (
        i64::from_le_bytes(ts),
        f64::from_le_bytes(val),
        i32::from_le_bytes(meta),
    )
}

/// Translates a stored (value, meta) pair to the in-memory value. A missing
/// meta flag reads back as NaN whatever value was stored alongside it.
pub fn stored_to_value(value: f64, meta: i32) -> f64 {
    if meta == METADATA_MISSING_VALUE {
        f64::NAN
    } else {
        value
    }
}

/// Reads the next record from a stream. Returns Ok(None) on a clean EOF and
/// CorruptRecord when a partial record is found instead.
pub fn read_record<R: std::io::Read>(
    reader: &mut R,
) -> Result<Option<(i64, f64, i32)>, RiverbedError> {
    let mut buf = [0u8; RECORD_SIZE];
    let mut filled = 0;
    while filled < RECORD_SIZE {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(RiverbedError::CorruptRecord(format!(
                "partial record of {} bytes at end of stream",
                filled
            )));
        }
        filled += n;
    }
    Ok(Some(unpack_record(&buf)))
}
