use log::warn;

use crate::col::{map_new, set_new, HashMap};
use crate::error::{Error, Result};
use crate::graph::Path;
use crate::ptn::Link;

/// A line of the pool. A negative id denotes the reverse direction of an undirected line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub id: i64,
    pub directed: bool,
    pub length: f64,
    pub cost: f64,
    pub frequency: i64,
    path: Path,
}

impl Line {
    pub fn new(id: i64, directed: bool) -> Self {
        Line {
            id,
            directed,
            length: 0.0,
            cost: 0.0,
            frequency: 0,
            path: Path::new(directed),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `link` at the end of the line.
    pub fn add_link(&mut self, link: &Link) -> Result<()> {
        if !self.path.add_last_edge(link) {
            return Err(Error::LineLinkNotAddable {
                line: self.id,
                link: link.id,
            });
        }
        Ok(())
    }

    /// Builds a line from links in travel order, warns if it visits a stop twice.
    pub fn with_links<'a>(id: i64, directed: bool, links: impl IntoIterator<Item = &'a Link>) -> Result<Self> {
        let mut line = Line::new(id, directed);
        for link in links {
            line.add_link(link)?;
        }
        if line.path.is_empty() {
            return Err(Error::LineNotAPath(id));
        }
        if line.has_loop() {
            warn!("Line {} contains a loop", id);
        }
        Ok(line)
    }

    pub fn has_loop(&self) -> bool {
        let mut seen = set_new();
        !self.path.nodes().iter().all(|stop| seen.insert(*stop))
    }

    pub fn stops(&self) -> &[i64] {
        self.path.nodes()
    }

    pub fn link_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.path.edge_ids()
    }

    /// The reverse direction of an undirected line, identified by the negated id.
    pub fn reversed(&self) -> Line {
        Line {
            id: -self.id,
            path: self.path.reversed(),
            ..self.clone()
        }
    }
}

/// Lines keyed by id, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct LinePool {
    lines: Vec<Line>,
    index: HashMap<i64, usize>,
}

impl LinePool {
    pub fn new() -> Self {
        LinePool {
            lines: Vec::new(),
            index: map_new(),
        }
    }

    pub fn add_line(&mut self, line: Line) -> Result<()> {
        if self.index.contains_key(&line.id) {
            return Err(Error::DataIllegalValue {
                field: "line id".into(),
                value: line.id.to_string(),
            });
        }
        self.index.insert(line.id, self.lines.len());
        self.lines.push(line);
        Ok(())
    }

    pub fn line(&self, id: i64) -> Result<&Line> {
        self.index
            .get(&id)
            .map(|&i| &self.lines[i])
            .ok_or(Error::DataIndexNotFound { kind: "line", index: id })
    }

    pub fn line_mut(&mut self, id: i64) -> Result<&mut Line> {
        match self.index.get(&id) {
            Some(&i) => Ok(&mut self.lines[i]),
            None => Err(Error::DataIndexNotFound { kind: "line", index: id }),
        }
    }

    /// The line operating repetition `repetition` of line `id`, counted from 1 up to its
    /// frequency.
    pub fn line_repetition(&self, id: i64, repetition: i64) -> Result<&Line> {
        let line = self.line(id)?;
        if repetition < 1 || repetition > line.frequency {
            return Err(Error::DataIndexNotFound {
                kind: "line repetition",
                index: repetition,
            });
        }
        Ok(line)
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The lines with positive frequency.
    pub fn line_concept(&self) -> Vec<&Line> {
        self.lines.iter().filter(|l| l.frequency > 0).collect()
    }

    /// Lines operated on `link`, in either direction.
    pub fn lines_on_link(&self, link: i64) -> Vec<&Line> {
        self.lines
            .iter()
            .filter(|l| l.path.contains_edge(link))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links() -> Vec<Link> {
        vec![
            Link::new(1, 1, 2, 2.0, 1, 2, false),
            Link::new(2, 2, 3, 3.0, 1, 2, false),
            Link::new(3, 3, 1, 4.0, 1, 2, false),
        ]
    }

    #[test]
    fn test_line_from_links() {
        let links = links();
        let line = Line::with_links(4, false, &links[..2]).unwrap();
        assert_eq!(line.stops(), &[1, 2, 3]);
        assert!(!line.has_loop());
        let reversed = line.reversed();
        assert_eq!(reversed.id, -4);
        assert_eq!(reversed.stops(), &[3, 2, 1]);
        assert_eq!(reversed.link_ids().collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn test_loop_is_allowed() {
        let line = Line::with_links(1, false, &links()).unwrap();
        assert!(line.has_loop());
        assert_eq!(line.stops(), &[1, 2, 3, 1]);
    }

    #[test]
    fn test_link_not_addable() {
        let links = links();
        let mut line = Line::new(2, true);
        line.add_link(&links[0]).unwrap();
        assert_eq!(
            line.add_link(&links[2]).unwrap_err(),
            Error::LineLinkNotAddable { line: 2, link: 3 }
        );
        assert_eq!(
            Line::with_links(3, false, Vec::<&Link>::new()).unwrap_err(),
            Error::LineNotAPath(3)
        );
    }

    #[test]
    fn test_pool_and_concept() {
        let links = links();
        let mut pool = LinePool::new();
        let mut first = Line::with_links(1, false, &links[..1]).unwrap();
        first.frequency = 2;
        first.cost = 3.5;
        pool.add_line(first.clone()).unwrap();
        pool.add_line(Line::with_links(2, false, &links[1..]).unwrap()).unwrap();
        assert!(pool.add_line(first.clone()).is_err());
        assert_eq!(pool.line_concept().len(), 1);
        assert_eq!(pool.line(1).unwrap(), &first);
        let mut cheaper = first.clone();
        cheaper.cost = 1.0;
        assert_ne!(pool.line(1).unwrap(), &cheaper);
        assert_eq!(pool.lines_on_link(3)[0].id, 2);
        assert!(pool.line(7).is_err());

        assert_eq!(pool.line_repetition(1, 2).unwrap().id, 1);
        assert_eq!(
            pool.line_repetition(1, 3).unwrap_err(),
            Error::DataIndexNotFound { kind: "line repetition", index: 3 }
        );
        assert!(pool.line_repetition(1, 0).is_err());
        assert!(pool.line_repetition(2, 1).is_err());
    }
}
