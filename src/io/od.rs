use std::path::Path;

use crate::error::Result;
use crate::io::read_rows;
use crate::od::{Od, SparseOd};

/// Reads an OD file (`origin; destination; value`).
pub fn read_od(path: &Path) -> Result<SparseOd> {
    let mut od = SparseOd::new();
    for row in read_rows(path)? {
        row.expect_columns(3)?;
        let (origin, destination, value): (i64, i64, f64) = row.deserialize()?;
        od.set_value(origin, destination, value)?;
    }
    Ok(od)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_read_od() {
        let path = std::env::temp_dir().join("lintim_io_od.giv");
        fs::write(&path, "# origin; destination; customers\n1; 2; 3.5\n2; 1; 0\n2; 3; 1\n").unwrap();
        let od = read_od(&path).unwrap();
        assert_eq!(od.value(1, 2), 3.5);
        assert_eq!(od.od_pairs().len(), 2);
        assert_eq!(od.number_of_passengers(), 4.5);
    }
}
