use std::cell::RefCell;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use log::{debug, LevelFilter};
use mip::SolverKind;

use crate::col::{map_new, HashMap};
use crate::error::{Error, Result};
use crate::io::{read_rows, unquote};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Fatal | LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FATAL" => Ok(LogLevel::Fatal),
            "ERROR" => Ok(LogLevel::Error),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            _ => Err(()),
        }
    }
}

/// String key/value configuration read from `.cnf` files.
#[derive(Debug, Clone, Default)]
pub struct Config {
    data: HashMap<String, String>,
}

thread_local! {
    static DEFAULT_CONFIG: RefCell<Config> = RefCell::new(Config::new());
}

impl Config {
    pub fn new() -> Self {
        Config { data: map_new() }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Config::new();
        config.read(path.as_ref())?;
        Ok(config)
    }

    /// Reads `path` into this config. Later keys overwrite earlier ones, included files are
    /// read at the position of their include line.
    pub fn read(&mut self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(Error::ConfigNoFileName);
        }
        debug!("Reading config file {}", path.display());
        for row in read_rows(path)? {
            row.expect_columns(2)?;
            let key = row.field(0);
            let value = unquote(row.field(1));
            match key {
                "include" => {
                    let include = resolve(path, value);
                    if !include.exists() {
                        return Err(Error::ConfigIncludeNotFound(include));
                    }
                    self.read(&include)?;
                }
                "include_if_exists" => {
                    let include = resolve(path, value);
                    if include.exists() {
                        self.read(&include)?;
                    } else {
                        debug!("Skipping missing config file {}", include.display());
                    }
                }
                _ => {
                    self.data.insert(key.into(), value.into());
                }
            }
        }
        Ok(())
    }

    pub fn put(&mut self, key: &str, value: impl Display) {
        self.data.insert(key.into(), value.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get_string(&self, key: &str) -> Result<&str> {
        self.data
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::ConfigKeyMissing(key.into()))
    }

    fn get_parsed<T: FromStr>(&self, key: &str, expected: &'static str) -> Result<T> {
        let value = self.get_string(key)?;
        value.trim().parse().map_err(|_| Error::ConfigTypeMismatch {
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
        let value = self.get_string(key)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(Error::ConfigTypeMismatch {
                key: key.into(),
                value: value.into(),
                expected: "boolean",
            }),
        }
    }

    pub fn get_log_level(&self, key: &str) -> Result<LogLevel> {
        self.get_parsed(key, "log level")
    }

    pub fn get_solver_kind(&self, key: &str) -> Result<SolverKind> {
        self.get_parsed(key, "solver kind")
    }

    /// Returns `Ok(None)` for a missing key but still fails on a malformed value.
    pub fn get_optional<T>(&self, key: &str, get: impl Fn(&Self, &str) -> Result<T>) -> Result<Option<T>> {
        if self.contains(key) {
            get(self, key).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn period_length(&self) -> Result<i64> {
        let period_length = self.get_integer("period_length")?;
        if period_length <= 0 {
            return Err(Error::AlgorithmInfeasibleParameterSettings {
                parameter: "period_length".into(),
                value: period_length.to_string(),
            });
        }
        Ok(period_length * self.time_units_per_minute()?)
    }

    pub fn time_units_per_minute(&self) -> Result<i64> {
        Ok(self
            .get_optional("time_units_per_minute", Config::get_integer)?
            .unwrap_or(1))
    }

    /// Applies `console_log_level` to the global logger, if present.
    pub fn apply_log_level(&self) -> Result<()> {
        if let Some(level) = self.get_optional("console_log_level", Config::get_log_level)? {
            log::set_max_level(level.level_filter());
        }
        Ok(())
    }

    pub fn put_default(key: &str, value: impl Display) {
        DEFAULT_CONFIG.with(|config| config.borrow_mut().put(key, value));
    }

    pub fn set_default(config: Config) {
        DEFAULT_CONFIG.with(|default| *default.borrow_mut() = config);
    }

    pub fn default_config() -> Config {
        DEFAULT_CONFIG.with(|config| config.borrow().clone())
    }
}

fn resolve(including: &Path, value: &str) -> std::path::PathBuf {
    let value = Path::new(value);
    if value.is_absolute() {
        return value.to_path_buf();
    }
    match including.parent() {
        Some(parent) => parent.join(value),
        None => value.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_typed_read_back() {
        let mut config = Config::new();
        config.put("x", "FATAL");
        config.put("s", "XPRESS");
        config.put("y", "5.3");
        config.put("b", "true");
        config.put("i", 7);
        assert_eq!(config.get_log_level("x").unwrap(), LogLevel::Fatal);
        assert_eq!(config.get_solver_kind("s").unwrap(), SolverKind::Xpress);
        assert_eq!(config.get_double("y").unwrap(), 5.3);
        assert!(config.get_boolean("b").unwrap());
        assert_eq!(config.get_integer("i").unwrap(), 7);
    }

    #[test]
    fn test_missing_and_mismatch() {
        let mut config = Config::new();
        config.put("y", "five");
        assert_eq!(
            config.get_integer("z").unwrap_err(),
            Error::ConfigKeyMissing("z".into())
        );
        assert!(matches!(
            config.get_double("y"),
            Err(Error::ConfigTypeMismatch { expected: "double", .. })
        ));
        assert_eq!(config.get_optional("z", Config::get_integer).unwrap(), None);
    }

    #[test]
    fn test_fatal_maps_to_error_filter() {
        assert_eq!(LogLevel::Fatal.level_filter(), LevelFilter::Error);
        assert_eq!(LogLevel::Debug.level_filter(), LevelFilter::Debug);
    }

    #[test]
    fn test_read_with_includes() {
        let dir = std::env::temp_dir().join("lintim_config_includes");
        fs::create_dir_all(dir.join("basis")).unwrap();
        fs::write(
            dir.join("basis/Config.cnf"),
            "# global\nperiod_length; 60\nptn_name; \"grid\"\ninclude_if_exists; \"Private.cnf\"\n",
        )
        .unwrap();
        fs::write(
            dir.join("Local.cnf"),
            "include; \"basis/Config.cnf\"\nperiod_length; 10 # overwritten\n",
        )
        .unwrap();
        let config = Config::from_file(dir.join("Local.cnf")).unwrap();
        assert_eq!(config.get_integer("period_length").unwrap(), 10);
        assert_eq!(config.get_string("ptn_name").unwrap(), "grid");

        fs::write(dir.join("Broken.cnf"), "include; \"missing.cnf\"\n").unwrap();
        assert!(matches!(
            Config::from_file(dir.join("Broken.cnf")),
            Err(Error::ConfigIncludeNotFound(_))
        ));
        assert_eq!(
            Config::from_file("").unwrap_err(),
            Error::ConfigNoFileName
        );
    }

    #[test]
    fn test_default_config() {
        Config::put_default("default_key", 3);
        assert_eq!(Config::default_config().get_integer("default_key").unwrap(), 3);
        Config::set_default(Config::new());
        assert!(!Config::default_config().contains("default_key"));
    }
}
