use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Docmatch";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_TESSERACT_CMD: &str = "tesseract";
const DEFAULT_OCR_LANG: &str = "spa";
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_BIND: &str = "127.0.0.1:5000";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024; // 20 MB

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid bind address {value:?}: {reason}")]
    InvalidBind { value: String, reason: String },

    #[error("Unknown match order {0:?} (expected lookup-first or insert-first)")]
    InvalidMatchOrder(String),

    #[error("Invalid upload size limit {0:?}")]
    InvalidUploadLimit(String),
}

/// When the duplicate lookup runs relative to the insert of the new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchOrder {
    /// Look up before inserting: reports whether the document was seen before.
    #[default]
    LookupFirst,
    /// Insert before looking up: a fresh record always matches itself.
    InsertFirst,
}

impl MatchOrder {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lookup-first" => Ok(Self::LookupFirst),
            "insert-first" => Ok(Self::InsertFirst),
            _ => Err(ConfigError::InvalidMatchOrder(value.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LookupFirst => "lookup-first",
            Self::InsertFirst => "insert-first",
        }
    }
}

/// Process-wide settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// OCR executable, resolved on PATH when not absolute.
    pub tesseract_cmd: PathBuf,
    /// Tesseract language code for the document corpus.
    pub ocr_lang: String,
    /// SQLite file holding the document records.
    pub db_path: PathBuf,
    /// Where uploads and downloaded media are staged.
    pub upload_dir: PathBuf,
    pub bind: SocketAddr,
    pub match_order: MatchOrder,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup("DOCMATCH_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidBind {
                value: bind_raw.clone(),
                reason: e.to_string(),
            })?;

        let match_order = match lookup("DOCMATCH_MATCH_ORDER") {
            Some(v) => MatchOrder::parse(&v)?,
            None => MatchOrder::default(),
        };

        let max_upload_bytes = match lookup("DOCMATCH_MAX_UPLOAD_BYTES") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidUploadLimit(v))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            tesseract_cmd: lookup("TESSERACT_CMD")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TESSERACT_CMD)),
            ocr_lang: lookup("DOCMATCH_OCR_LANG").unwrap_or_else(|| DEFAULT_OCR_LANG.to_string()),
            db_path: lookup("DOCMATCH_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
            upload_dir: lookup("DOCMATCH_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            bind,
            match_order,
            max_upload_bytes,
        })
    }
}

/// Get the application data directory
/// ~/Docmatch/ when a home directory is known, the working directory otherwise.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default record store file
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("documentos.db")
}

/// Tracing filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "docmatch_lib=info,docmatch=info,tower_http=info"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.tesseract_cmd, PathBuf::from("tesseract"));
        assert_eq!(config.ocr_lang, "spa");
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.bind.port(), 5000);
        assert_eq!(config.match_order, MatchOrder::LookupFirst);
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
        assert!(config.db_path.ends_with("documentos.db"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("TESSERACT_CMD", "/opt/tesseract/bin/tesseract"),
            ("DOCMATCH_OCR_LANG", "spa+eng"),
            ("DOCMATCH_DB_PATH", "/tmp/records.db"),
            ("DOCMATCH_BIND", "0.0.0.0:8080"),
            ("DOCMATCH_MATCH_ORDER", "insert-first"),
            ("DOCMATCH_MAX_UPLOAD_BYTES", "1024"),
        ]))
        .unwrap();
        assert_eq!(
            config.tesseract_cmd,
            PathBuf::from("/opt/tesseract/bin/tesseract")
        );
        assert_eq!(config.ocr_lang, "spa+eng");
        assert_eq!(config.db_path, PathBuf::from("/tmp/records.db"));
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.match_order, MatchOrder::InsertFirst);
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn rejects_bad_bind_address() {
        let err = AppConfig::from_lookup(lookup_from(&[("DOCMATCH_BIND", "not-an-addr")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBind { .. }));
    }

    #[test]
    fn rejects_unknown_match_order() {
        let err = AppConfig::from_lookup(lookup_from(&[("DOCMATCH_MATCH_ORDER", "sometimes")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidMatchOrder("sometimes".into()));
    }

    #[test]
    fn rejects_zero_upload_limit() {
        let err = AppConfig::from_lookup(lookup_from(&[("DOCMATCH_MAX_UPLOAD_BYTES", "0")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidUploadLimit("0".into()));
    }

    #[test]
    fn match_order_parse_is_case_insensitive() {
        assert_eq!(MatchOrder::parse("Insert-First").unwrap(), MatchOrder::InsertFirst);
        assert_eq!(MatchOrder::LookupFirst.as_str(), "lookup-first");
    }

    #[test]
    fn app_data_dir_named_after_app() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(app_data_dir(), home.join("Docmatch"));
        }
    }
}
