use std::path::Path;

use itertools::Itertools;

use crate::error::{Error, Result};
use crate::io::{read_rows, write_lines};
use crate::line::{Line, LinePool};
use crate::ptn::Ptn;

/// Reads a pool file (`line; edge order; link`) or, with `with_frequencies`, a line concept
/// file (`line; edge order; link; frequency`).
pub fn read_lines(path: &Path, ptn: &Ptn, directed: bool, with_frequencies: bool) -> Result<LinePool> {
    let columns = if with_frequencies { 4 } else { 3 };
    let mut entries = Vec::new();
    for row in read_rows(path)? {
        row.expect_columns(columns)?;
        let line: i64 = row.parse(0, "line id")?;
        let order: i64 = row.parse(1, "edge order")?;
        let link: i64 = row.parse(2, "link id")?;
        let frequency: i64 = if with_frequencies {
            row.parse(3, "frequency")?
        } else {
            0
        };
        entries.push((line, order, link, frequency));
    }

    let mut pool = LinePool::new();
    let grouped = entries.into_iter().into_group_map_by(|entry| entry.0);
    let line_ids: Vec<i64> = grouped.keys().copied().sorted().collect();
    for line_id in line_ids {
        let mut links = grouped[&line_id].clone();
        links.sort_by_key(|entry| entry.1);
        let link_refs = links
            .iter()
            .map(|entry| ptn.link(entry.2))
            .collect::<Result<Vec<_>>>()?;
        let mut line = Line::with_links(line_id, directed, link_refs)?;
        line.frequency = links[0].3;
        line.length = links
            .iter()
            .map(|entry| ptn.link(entry.2).map(|l| l.length))
            .sum::<Result<f64>>()?;
        pool.add_line(line)?;
    }
    Ok(pool)
}

/// Reads the line cost file (`line; length; cost`) into `pool`.
pub fn read_line_costs(path: &Path, pool: &mut LinePool) -> Result<()> {
    let rows = read_rows(path)?;
    if rows.len() != pool.len() {
        return Err(Error::DataLinePoolCostInconsistency {
            pool: pool.len(),
            costs: rows.len(),
        });
    }
    for row in rows {
        row.expect_columns(3)?;
        let (id, length, cost): (i64, f64, f64) = row.deserialize()?;
        let line = pool.line_mut(id)?;
        line.length = length;
        line.cost = cost;
    }
    Ok(())
}

pub fn write_line_concept(path: &Path, pool: &LinePool) -> Result<()> {
    write_lines(
        path,
        "line-id; edge-order; edge-id; frequency",
        pool.lines().iter().flat_map(|line| {
            line.link_ids()
                .enumerate()
                .map(|(order, link)| format!("{}; {}; {}; {}", line.id, order + 1, link, line.frequency))
                .collect::<Vec<_>>()
        }),
    )
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test::sample::chain_ptn;

    #[test]
    fn test_pool_costs_and_concept() {
        let dir = std::env::temp_dir().join("lintim_io_line");
        fs::create_dir_all(&dir).unwrap();
        let ptn = chain_ptn();
        fs::write(dir.join("Pool.giv"), "2; 1; 1\n1; 2; 2\n1; 1; 1\n").unwrap();
        fs::write(dir.join("Pool-Cost.giv"), "1; 4; 10\n2; 2; 3\n").unwrap();

        let mut pool = read_lines(&dir.join("Pool.giv"), &ptn, false, false).unwrap();
        read_line_costs(&dir.join("Pool-Cost.giv"), &mut pool).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.lines()[0].id, 1);
        assert_eq!(pool.line(1).unwrap().stops(), &[1, 2, 3]);
        assert_eq!(pool.line(1).unwrap().cost, 10.0);

        pool.line_mut(1).unwrap().frequency = 2;
        write_line_concept(&dir.join("Line-Concept.lin"), &pool).unwrap();
        let concept = read_lines(&dir.join("Line-Concept.lin"), &ptn, false, true).unwrap();
        assert_eq!(concept.line(1).unwrap().frequency, 2);
        assert_eq!(concept.line_concept().len(), 1);

        fs::write(dir.join("Short-Cost.giv"), "1; 4; 10\n").unwrap();
        assert_eq!(
            read_line_costs(&dir.join("Short-Cost.giv"), &mut pool).unwrap_err(),
            Error::DataLinePoolCostInconsistency { pool: 2, costs: 1 }
        );
    }
}
