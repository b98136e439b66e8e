use std::cell::RefCell;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use crate::col::{map_new, HashMap};
use crate::error::{Error, Result};
use crate::io::{read_rows, unquote, write_lines};

/// Key figures of planning steps, read from and written to `.sta` files.
#[derive(Debug, Clone, Default)]
pub struct Statistic {
    data: HashMap<String, String>,
    keys: Vec<String>,
}

thread_local! {
    static DEFAULT_STATISTIC: RefCell<Statistic> = RefCell::new(Statistic::new());
}

impl Statistic {
    pub fn new() -> Self {
        Statistic {
            data: map_new(),
            keys: Vec::new(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut statistic = Statistic::new();
        statistic.read(path.as_ref())?;
        Ok(statistic)
    }

    /// Reads `path` into this statistic, the last occurrence of a key wins.
    pub fn read(&mut self, path: &Path) -> Result<()> {
        for row in read_rows(path)? {
            row.expect_columns(2)?;
            self.put(row.field(0), unquote(row.field(1)));
        }
        Ok(())
    }

    /// Writes all values. With `append`, the existing file content is kept where not overwritten.
    pub fn write(&self, path: &Path, append: bool) -> Result<()> {
        let mut merged = if append && path.exists() {
            Statistic::from_file(path)?
        } else {
            Statistic::new()
        };
        for key in &self.keys {
            merged.put(key, &self.data[key]);
        }
        write_lines(
            path,
            "",
            merged
                .keys
                .iter()
                .map(|key| format!("{}; {}", key, format_value(&merged.data[key]))),
        )
    }

    pub fn put(&mut self, key: &str, value: impl Display) {
        if self.data.insert(key.into(), value.to_string()).is_none() {
            self.keys.push(key.into());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn get_string(&self, key: &str) -> Result<&str> {
        self.data
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::StatisticKeyMissing(key.into()))
    }

    fn get_parsed<T: FromStr>(&self, key: &str, expected: &'static str) -> Result<T> {
        let value = self.get_string(key)?;
        value.trim().parse().map_err(|_| Error::StatisticTypeMismatch {
            key: key.into(),
            value: value.into(),
            expected,
        })
    }

    pub fn get_integer(&self, key: &str) -> Result<i64> {
        self.get_parsed(key, "integer")
    }

    pub fn get_double(&self, key: &str) -> Result<f64> {
        self.get_parsed(key, "double")
    }

    pub fn get_boolean(&self, key: &str) -> Result<bool> {
        self.get_parsed(key, "boolean")
    }

    pub fn put_default(key: &str, value: impl Display) {
        DEFAULT_STATISTIC.with(|statistic| statistic.borrow_mut().put(key, value));
    }

    pub fn set_default(statistic: Statistic) {
        DEFAULT_STATISTIC.with(|default| *default.borrow_mut() = statistic);
    }

    pub fn default_statistic() -> Statistic {
        DEFAULT_STATISTIC.with(|statistic| statistic.borrow().clone())
    }
}

fn format_value(value: &str) -> String {
    if value.parse::<f64>().is_ok() || value == "true" || value == "false" {
        value.into()
    } else {
        format!("\"{}\"", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_back() {
        let path = std::env::temp_dir().join("lintim_statistic_round_trip.sta");
        let mut statistic = Statistic::new();
        statistic.put("a", "abc");
        statistic.put("b", 2);
        statistic.put("c", true);
        statistic.put("d", 5.3);
        statistic.write(&path, false).unwrap();

        let read = Statistic::from_file(&path).unwrap();
        for key in ["a", "b", "c", "d"] {
            assert_eq!(read.get_string(key).unwrap(), statistic.get_string(key).unwrap());
        }
        assert_eq!(read.get_string("a").unwrap(), "abc");
        assert_eq!(read.get_integer("b").unwrap(), 2);
        assert!(read.get_boolean("c").unwrap());
        assert_eq!(read.get_double("d").unwrap(), 5.3);
        assert_eq!(read.keys(), &["a", "b", "c", "d"]);
    }

    #[test]
    fn test_append_overlays_existing_values() {
        let path = std::env::temp_dir().join("lintim_statistic_append.sta");
        let mut first = Statistic::new();
        first.put("kept", 1);
        first.put("changed", 1);
        first.write(&path, false).unwrap();

        let mut second = Statistic::new();
        second.put("changed", 2);
        second.put("new", "x");
        second.write(&path, true).unwrap();

        let read = Statistic::from_file(&path).unwrap();
        assert_eq!(read.get_integer("kept").unwrap(), 1);
        assert_eq!(read.get_integer("changed").unwrap(), 2);
        assert_eq!(read.get_string("new").unwrap(), "x");
    }

    #[test]
    fn test_missing_and_mismatch() {
        let mut statistic = Statistic::new();
        statistic.put("a", "abc");
        assert_eq!(
            statistic.get_integer("b").unwrap_err(),
            Error::StatisticKeyMissing("b".into())
        );
        assert!(matches!(
            statistic.get_boolean("a"),
            Err(Error::StatisticTypeMismatch { .. })
        ));
    }

    #[test]
    fn test_default_statistic() {
        Statistic::put_default("tim_obj", 42);
        assert_eq!(
            Statistic::default_statistic().get_integer("tim_obj").unwrap(),
            42
        );
    }
}
