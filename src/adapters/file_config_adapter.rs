//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[backtest]
symbol = EURUSD
initial_balance = 10000

[strategy]
name = Golden Cross
type = sma_cross
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "symbol"),
            Some("EURUSD".to_string())
        );
        assert_eq!(
            adapter.get_string("strategy", "name"),
            Some("Golden Cross".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ninitial_balance = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\nmax_candles = 5000\nbad = abc\n").unwrap();
        assert_eq!(adapter.get_int("backtest", "max_candles", 0), 5000);
        assert_eq!(adapter.get_int("backtest", "missing", 42), 42);
        assert_eq!(adapter.get_int("backtest", "bad", 42), 42);
    }

    #[test]
    fn keys_lists_section_entries_sorted() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\ntype = sma_cross\nslow = 30\nname = X\nfast = 10\n",
        )
        .unwrap();
        assert_eq!(adapter.keys("strategy"), vec!["fast", "name", "slow", "type"]);
        assert!(adapter.keys("missing").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[data]\npath = /srv/market-data\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("data", "path"),
            Some("/srv/market-data".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(result.is_err());
    }
}
