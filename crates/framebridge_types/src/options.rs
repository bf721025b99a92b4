//! CSV read options.
//!
//! [`ReadOptions`] is the sparse record callers and config files deal in:
//! every field may be absent. Absent fields are only filled in when the
//! worker resolves the record into a [`CsvReadConfig`] right before calling
//! the engine, so a caller that sets nothing lets the worker decide.

use serde::{Deserialize, Serialize};

pub const DEFAULT_INFER_SCHEMA_LENGTH: usize = 100;
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;
pub const DEFAULT_SEPARATOR: &str = ",";
pub const DEFAULT_ENCODING: &str = "utf8";

/// Errors raised while resolving read options
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    #[error("separator must be a single byte, got {0:?}")]
    InvalidSeparator(String),

    #[error("encoding {0:?} is not supported (expected \"utf8\" or \"utf8-lossy\")")]
    UnsupportedEncoding(String),

    #[error("chunkSize must be greater than zero")]
    ZeroChunkSize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sparse Options
// ─────────────────────────────────────────────────────────────────────────────

/// CSV read options as supplied by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReadOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infer_schema_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_header: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_errors: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_rows: Option<usize>,
    #[serde(default, alias = "sep", skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rechunk: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_memory: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_dates: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_rows_after_header: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_rows: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<usize>,
}

impl ReadOptions {
    /// The built-in defaults. `num_rows` and `num_threads` stay unset so the
    /// engine applies its own policy.
    pub fn defaults() -> Self {
        Self {
            infer_schema_length: Some(DEFAULT_INFER_SCHEMA_LENGTH),
            has_header: Some(true),
            ignore_errors: Some(true),
            chunk_size: Some(DEFAULT_CHUNK_SIZE),
            skip_rows: Some(0),
            separator: Some(DEFAULT_SEPARATOR.to_string()),
            rechunk: Some(false),
            encoding: Some(DEFAULT_ENCODING.to_string()),
            low_memory: Some(false),
            parse_dates: Some(false),
            skip_rows_after_header: Some(0),
            num_rows: None,
            num_threads: None,
        }
    }

    /// Overlay `over` on `self`: every field set in `over` wins.
    pub fn merge(&self, over: &ReadOptions) -> ReadOptions {
        fn pick<T: Clone>(base: &Option<T>, over: &Option<T>) -> Option<T> {
            over.clone().or_else(|| base.clone())
        }

        ReadOptions {
            infer_schema_length: pick(&self.infer_schema_length, &over.infer_schema_length),
            has_header: pick(&self.has_header, &over.has_header),
            ignore_errors: pick(&self.ignore_errors, &over.ignore_errors),
            chunk_size: pick(&self.chunk_size, &over.chunk_size),
            skip_rows: pick(&self.skip_rows, &over.skip_rows),
            separator: pick(&self.separator, &over.separator),
            rechunk: pick(&self.rechunk, &over.rechunk),
            encoding: pick(&self.encoding, &over.encoding),
            low_memory: pick(&self.low_memory, &over.low_memory),
            parse_dates: pick(&self.parse_dates, &over.parse_dates),
            skip_rows_after_header: pick(&self.skip_rows_after_header, &over.skip_rows_after_header),
            num_rows: pick(&self.num_rows, &over.num_rows),
            num_threads: pick(&self.num_threads, &over.num_threads),
        }
    }

    /// Fill absent fields from the built-in defaults and validate the result.
    pub fn resolve(&self) -> Result<CsvReadConfig, OptionsError> {
        let full = ReadOptions::defaults().merge(self);

        let separator = full.separator.unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());
        let separator = match separator.as_bytes() {
            [b] => *b,
            _ => return Err(OptionsError::InvalidSeparator(separator)),
        };

        let encoding = full
            .encoding
            .as_deref()
            .unwrap_or(DEFAULT_ENCODING)
            .parse::<Encoding>()?;

        let chunk_size = full.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(OptionsError::ZeroChunkSize);
        }

        Ok(CsvReadConfig {
            infer_schema_length: full.infer_schema_length.unwrap_or(DEFAULT_INFER_SCHEMA_LENGTH),
            has_header: full.has_header.unwrap_or(true),
            ignore_errors: full.ignore_errors.unwrap_or(true),
            chunk_size,
            skip_rows: full.skip_rows.unwrap_or(0),
            separator,
            rechunk: full.rechunk.unwrap_or(false),
            encoding,
            low_memory: full.low_memory.unwrap_or(false),
            parse_dates: full.parse_dates.unwrap_or(false),
            skip_rows_after_header: full.skip_rows_after_header.unwrap_or(0),
            num_rows: full.num_rows,
            num_threads: full.num_threads,
        })
    }

    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = Some(has_header);
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn with_num_rows(mut self, num_rows: usize) -> Self {
        self.num_rows = Some(num_rows);
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads);
        self
    }

    pub fn with_skip_rows(mut self, skip_rows: usize) -> Self {
        self.skip_rows = Some(skip_rows);
        self
    }

    pub fn with_ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = Some(ignore_errors);
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolved Options
// ─────────────────────────────────────────────────────────────────────────────

/// Text encoding of CSV input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    /// Invalid sequences are replaced instead of failing the read
    LossyUtf8,
}

impl std::str::FromStr for Encoding {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "utf8" => Ok(Encoding::Utf8),
            "utf8-lossy" => Ok(Encoding::LossyUtf8),
            other => Err(OptionsError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Fully resolved options handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvReadConfig {
    pub infer_schema_length: usize,
    pub has_header: bool,
    pub ignore_errors: bool,
    pub chunk_size: usize,
    pub skip_rows: usize,
    pub separator: u8,
    pub rechunk: bool,
    pub encoding: Encoding,
    pub low_memory: bool,
    pub parse_dates: bool,
    pub skip_rows_after_header: usize,
    pub num_rows: Option<usize>,
    pub num_threads: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_with_empty_is_identity() {
        let defaults = ReadOptions::defaults();
        assert_eq!(defaults.merge(&ReadOptions::default()), defaults);
        assert_eq!(ReadOptions::default().merge(&defaults), defaults);
    }

    #[test]
    fn test_merge_override_wins() {
        let over = ReadOptions::default().with_separator(";").with_num_rows(10);
        let merged = ReadOptions::defaults().merge(&over);
        assert_eq!(merged.separator.as_deref(), Some(";"));
        assert_eq!(merged.num_rows, Some(10));
        assert_eq!(merged.has_header, Some(true));
        assert_eq!(merged.num_threads, None);
    }

    #[test]
    fn test_resolve_empty_uses_defaults() {
        let cfg = ReadOptions::default().resolve().unwrap();
        assert_eq!(cfg.infer_schema_length, 100);
        assert!(cfg.has_header);
        assert!(cfg.ignore_errors);
        assert_eq!(cfg.chunk_size, 10_000);
        assert_eq!(cfg.skip_rows, 0);
        assert_eq!(cfg.separator, b',');
        assert!(!cfg.rechunk);
        assert_eq!(cfg.encoding, Encoding::Utf8);
        assert!(!cfg.low_memory);
        assert!(!cfg.parse_dates);
        assert_eq!(cfg.skip_rows_after_header, 0);
        assert_eq!(cfg.num_rows, None);
        assert_eq!(cfg.num_threads, None);
        assert_eq!(ReadOptions::defaults().resolve().unwrap(), cfg);
    }

    #[test]
    fn test_resolve_rejects_bad_values() {
        assert_eq!(
            ReadOptions::default().with_separator("::").resolve(),
            Err(OptionsError::InvalidSeparator("::".to_string()))
        );
        assert_eq!(
            ReadOptions::default().with_encoding("latin1").resolve(),
            Err(OptionsError::UnsupportedEncoding("latin1".to_string()))
        );
        let zero = ReadOptions {
            chunk_size: Some(0),
            ..Default::default()
        };
        assert_eq!(zero.resolve(), Err(OptionsError::ZeroChunkSize));
    }

    #[test]
    fn test_camel_case_with_sep_alias() {
        let opts: ReadOptions = serde_json::from_str(
            r#"{"hasHeader": false, "sep": "\t", "inferSchemaLength": 5, "numThreads": 2}"#,
        )
        .unwrap();
        assert_eq!(opts.has_header, Some(false));
        assert_eq!(opts.separator.as_deref(), Some("\t"));
        assert_eq!(opts.infer_schema_length, Some(5));
        assert_eq!(opts.num_threads, Some(2));
        assert_eq!(opts.resolve().unwrap().separator, b'\t');
    }

    #[test]
    fn test_unset_fields_are_not_serialized() {
        let json = serde_json::to_string(&ReadOptions::default().with_has_header(true)).unwrap();
        assert_eq!(json, r#"{"hasHeader":true}"#);
    }

    #[test]
    fn test_from_toml() {
        let opts: ReadOptions = toml::from_str("skipRows = 2\nencoding = \"utf8-lossy\"\n").unwrap();
        let cfg = opts.resolve().unwrap();
        assert_eq!(cfg.skip_rows, 2);
        assert_eq!(cfg.encoding, Encoding::LossyUtf8);
    }
}
