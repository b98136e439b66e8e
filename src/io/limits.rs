use std::path::Path;

use crate::col::{map_new, HashMap};
use crate::error::{Error, Result};
use crate::io::read_rows;

/// Wait and change time bounds at one stop, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationLimit {
    pub min_wait: i64,
    pub max_wait: i64,
    pub min_change: i64,
    pub max_change: i64,
}

/// Reads `stop; min wait; max wait; min change; max change`. A missing file yields no limits.
pub fn read_station_limits(path: &Path) -> Result<HashMap<i64, StationLimit>> {
    let mut limits = map_new();
    if !path.exists() {
        return Ok(limits);
    }
    for row in read_rows(path)? {
        row.expect_columns(5)?;
        let (stop, min_wait, max_wait, min_change, max_change): (i64, i64, i64, i64, i64) =
            row.deserialize()?;
        if min_wait > max_wait || min_change > max_change {
            return Err(Error::DataIllegalValue {
                field: format!("station limits of stop {}", stop),
                value: format!("[{}, {}], [{}, {}]", min_wait, max_wait, min_change, max_change),
            });
        }
        limits.insert(
            stop,
            StationLimit {
                min_wait,
                max_wait,
                min_change,
                max_change,
            },
        );
    }
    Ok(limits)
}
