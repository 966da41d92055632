use std::path::PathBuf;

use chrono::Duration;

pub const DEFAULT_DEBOUNCE_MS: i64 = 1000;
/// Longest accepted debounce window (one day).
pub const MAX_DEBOUNCE_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub file_logs: bool,
    pub log_dir: PathBuf,
    pub database_path: PathBuf,
    pub debounce_ms: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let file_logs = std::env::var("ENABLE_FILE_LOGS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let log_dir = non_empty_var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./logs"));

        let database_path = non_empty_var("MASTERY_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let debounce_ms = parse_debounce_ms(std::env::var("MASTERY_DEBOUNCE_MS").ok().as_deref());

        Self {
            log_level,
            file_logs,
            log_dir,
            database_path,
            debounce_ms,
        }
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::milliseconds(self.debounce_ms.clamp(0, MAX_DEBOUNCE_MS))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            file_logs: false,
            log_dir: PathBuf::from("./logs"),
            database_path: default_database_path(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Falls back to the default for unparsable, negative or overlong windows.
fn parse_debounce_ms(raw: Option<&str>) -> i64 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|value| (0..=MAX_DEBOUNCE_MS).contains(value))
        .unwrap_or(DEFAULT_DEBOUNCE_MS)
}

pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("competency-mastery")
        .join("progress.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_debounce_window() {
        let config = Config::default();
        assert_eq!(config.debounce_window(), Duration::seconds(1));
        assert_eq!(config.log_level, "info");
        assert!(!config.file_logs);
    }

    #[test]
    fn test_debounce_parsing() {
        assert_eq!(parse_debounce_ms(Some("250")), 250);
        assert_eq!(parse_debounce_ms(Some("0")), 0);
        assert_eq!(parse_debounce_ms(Some(" 1500 ")), 1500);
        assert_eq!(parse_debounce_ms(None), DEFAULT_DEBOUNCE_MS);
        assert_eq!(parse_debounce_ms(Some("soon")), DEFAULT_DEBOUNCE_MS);
        assert_eq!(parse_debounce_ms(Some("-5")), DEFAULT_DEBOUNCE_MS);
    }

    #[test]
    fn test_out_of_range_debounce_falls_back() {
        let huge = i64::MAX.to_string();
        assert_eq!(parse_debounce_ms(Some(&huge)), DEFAULT_DEBOUNCE_MS);
        assert_eq!(
            parse_debounce_ms(Some(&(MAX_DEBOUNCE_MS + 1).to_string())),
            DEFAULT_DEBOUNCE_MS
        );
        assert_eq!(parse_debounce_ms(Some(&MAX_DEBOUNCE_MS.to_string())), MAX_DEBOUNCE_MS);

        let config = Config {
            debounce_ms: i64::MAX,
            ..Config::default()
        };
        assert_eq!(config.debounce_window(), Duration::milliseconds(MAX_DEBOUNCE_MS));
    }

    #[test]
    fn test_default_database_path_file_name() {
        let path = default_database_path();
        assert!(path.ends_with("competency-mastery/progress.db"));
    }
}
