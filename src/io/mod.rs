//! Readers and writers for the `;`-separated text formats of the toolkit.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

pub mod ean;
pub mod limits;
pub mod line;
pub mod od;
pub mod ptn;

/// One non-empty data line of an input file.
#[derive(Debug, Clone)]
pub struct Row {
    file: String,
    line: u64,
    record: csv::StringRecord,
}

impl Row {
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn len(&self) -> usize {
        self.record.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }

    pub fn field(&self, index: usize) -> &str {
        self.record.get(index).unwrap_or("")
    }

    pub fn expect_columns(&self, expected: usize) -> Result<()> {
        if self.record.len() != expected {
            return Err(Error::InputWrongColumnCount {
                file: self.file.clone(),
                line: self.line,
                found: self.record.len(),
                expected,
            });
        }
        Ok(())
    }

    pub fn expect_columns_between(&self, min: usize, max: usize) -> Result<()> {
        if self.record.len() < min || self.record.len() > max {
            return Err(Error::InputWrongColumnCount {
                file: self.file.clone(),
                line: self.line,
                found: self.record.len(),
                expected: min,
            });
        }
        Ok(())
    }

    /// Deserializes the whole row, e.g. into a tuple.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        self.record
            .deserialize(None)
            .map_err(|e| self.inconsistency(e.to_string()))
    }

    pub fn parse<T: FromStr>(&self, index: usize, what: &str) -> Result<T> {
        let value = self.field(index);
        value
            .parse()
            .map_err(|_| self.inconsistency(format!("{} '{}' is no {}", what, value, type_name::<T>())))
    }

    pub fn inconsistency(&self, message: String) -> Error {
        Error::InputTypeInconsistency {
            file: self.file.clone(),
            line: self.line,
            message,
        }
    }
}

fn type_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

/// Removes `#` comments and blank lines. Returns the remaining text and the
/// original line number of each remaining line.
pub fn strip_comments(text: &str) -> (String, Vec<u64>) {
    let mut stripped = String::with_capacity(text.len());
    let mut line_numbers = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let content = match line.find('#') {
            Some(position) => &line[..position],
            None => line,
        };
        if content.trim().is_empty() {
            continue;
        }
        stripped.push_str(content);
        stripped.push('\n');
        line_numbers.push(index as u64 + 1);
    }
    (stripped, line_numbers)
}

fn reader() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .trim(csv::Trim::All)
        .delimiter(b';')
        .has_headers(false)
        .quoting(false)
        .flexible(true);

    builder
}

pub fn parse_rows(text: &str, file: &str) -> Result<Vec<Row>> {
    let (stripped, line_numbers) = strip_comments(text);
    let mut rows = Vec::with_capacity(line_numbers.len());
    for (record, line) in reader()
        .from_reader(stripped.as_bytes())
        .records()
        .zip(line_numbers)
    {
        let record = record.map_err(|e| Error::InputTypeInconsistency {
            file: file.into(),
            line,
            message: e.to_string(),
        })?;
        rows.push(Row {
            file: file.into(),
            line,
            record,
        });
    }
    Ok(rows)
}

pub fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let text =
        std::fs::read_to_string(path).map_err(|_| Error::InputFileNotFound(path.to_path_buf()))?;
    parse_rows(&text, &path.to_string_lossy())
}

/// Writes `header` as a comment line followed by the given data lines.
pub fn write_lines(
    path: &Path,
    header: &str,
    lines: impl IntoIterator<Item = String>,
) -> Result<()> {
    let not_writable = |e: std::io::Error| Error::OutputFileNotWritable {
        file: PathBuf::from(path),
        message: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(not_writable)?;
        }
    }
    let mut file = std::io::BufWriter::new(File::create(path).map_err(not_writable)?);
    if !header.is_empty() {
        writeln!(file, "# {}", header).map_err(not_writable)?;
    }
    for line in lines {
        writeln!(file, "{}", line).map_err(not_writable)?;
    }
    file.flush().map_err(not_writable)
}

/// Removes one pair of surrounding double quotes.
pub fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_skip_comments_and_keep_line_numbers() {
        let text = "# header\n1; 2 ;3 # trailing\n\n   \n4;5;6\n";
        let rows = parse_rows(text, "test.giv").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line(), 2);
        assert_eq!(rows[0].field(1), "2");
        assert_eq!(rows[1].line(), 5);
        let values: (i64, i64, f64) = rows[1].deserialize().unwrap();
        assert_eq!(values, (4, 5, 6.0));
    }

    #[test]
    fn test_wrong_column_count_and_type() {
        let rows = parse_rows("1;a\n", "x.giv").unwrap();
        assert!(matches!(
            rows[0].expect_columns(3),
            Err(Error::InputWrongColumnCount { found: 2, expected: 3, .. })
        ));
        assert!(matches!(
            rows[0].parse::<i64>(1, "id"),
            Err(Error::InputTypeInconsistency { line: 1, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let path = Path::new("/definitely/not/there.giv");
        assert_eq!(
            read_rows(path).unwrap_err(),
            Error::InputFileNotFound(path.to_path_buf())
        );
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("abc"), "abc");
    }
}
