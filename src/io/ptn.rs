use std::path::Path;

use crate::error::Result;
use crate::io::{read_rows, unquote};
use crate::ptn::{Link, Ptn, Stop};

/// Reads `Stop.giv` (`id; short; long; x; y`) and `Edge.giv`
/// (`id; left; right; length; lower bound; upper bound`).
pub fn read_ptn(stop_file: &Path, link_file: &Path, directed: bool) -> Result<Ptn> {
    let mut ptn = Ptn::new();
    for row in read_rows(stop_file)? {
        row.expect_columns(5)?;
        let (id, short_name, long_name, x, y): (i64, String, String, f64, f64) =
            row.deserialize()?;
        ptn.add_stop(Stop::new(id, unquote(&short_name), unquote(&long_name), x, y))?;
    }
    for row in read_rows(link_file)? {
        row.expect_columns(6)?;
        let (id, left, right, length, lower_bound, upper_bound): (i64, i64, i64, f64, f64, f64) =
            row.deserialize()?;
        ptn.add_link(Link::new(
            id,
            left,
            right,
            length,
            lower_bound.round() as i64,
            upper_bound.round() as i64,
            directed,
        ))?;
    }
    Ok(ptn)
}

/// Reads `Load.giv` (`link; load; lower frequency; upper frequency`) into the links of `ptn`.
pub fn read_loads(path: &Path, ptn: &mut Ptn) -> Result<()> {
    for row in read_rows(path)? {
        row.expect_columns(4)?;
        let (link, load, lower, upper): (i64, f64, i64, i64) = row.deserialize()?;
        ptn.set_load(link, load, lower, upper)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::error::Error;

    #[test]
    fn test_read_ptn_and_loads() {
        let dir = std::env::temp_dir().join("lintim_io_ptn");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("Stop.giv"),
            "# stop-id; short-name; long-name; x; y\n1; \"A\"; \"Alpha\"; 0; 0\n2; B; Beta; 1.5; 0\n",
        )
        .unwrap();
        fs::write(dir.join("Edge.giv"), "1; 1; 2; 2.5; 3; 5\n").unwrap();
        fs::write(dir.join("Load.giv"), "1; 20.5; 1; 3\n").unwrap();

        let mut ptn = read_ptn(&dir.join("Stop.giv"), &dir.join("Edge.giv"), false).unwrap();
        read_loads(&dir.join("Load.giv"), &mut ptn).unwrap();
        assert_eq!(ptn.stops().len(), 2);
        assert_eq!(ptn.stop(1).unwrap().short_name, "A");
        let link = ptn.link(1).unwrap();
        assert_eq!((link.lower_bound, link.upper_bound), (3, 5));
        assert_eq!((link.lower_frequency, link.upper_frequency), (1, 3));
        assert_eq!(ptn.link(-1).unwrap().upper_frequency, 3);

        fs::write(dir.join("Edge2.giv"), "1; 1; 2; 2.5; 3\n").unwrap();
        assert!(matches!(
            read_ptn(&dir.join("Stop.giv"), &dir.join("Edge2.giv"), false),
            Err(Error::InputWrongColumnCount { found: 5, expected: 6, .. })
        ));
    }
}
