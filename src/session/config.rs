use serde::{Deserialize, Serialize};

use crate::error::SqlDriverError;

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Translate `{...}` escapes before PREPARE unless a call overrides it.
    pub escape_processing: bool,
    /// Default wait for [`Session::is_alive`](super::Session::is_alive).
    pub probe_timeout_ms: u64,
    /// Zone for unzoned temporal parameters, seconds east of UTC.
    pub calendar_offset_seconds: Option<i32>,
    /// Upper bound on pending batch entries per statement.
    pub max_batch_entries: Option<usize>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            escape_processing: true,
            probe_timeout_ms: 5_000,
            calendar_offset_seconds: None,
            max_batch_entries: None,
        }
    }
}

impl SessionOptions {
    /// Parse options from JSON; missing fields take their defaults.
    ///
    /// ```rust
    /// use sql_driver_core::prelude::*;
    ///
    /// let opts = SessionOptions::from_json(r#"{"escape_processing": false}"#).unwrap();
    /// assert!(!opts.escape_processing);
    /// assert_eq!(opts.probe_timeout_ms, 5_000);
    /// ```
    ///
    /// # Errors
    /// Returns [`SqlDriverError::Config`] for malformed JSON or an out-of-range calendar offset.
    pub fn from_json(json: &str) -> Result<Self, SqlDriverError> {
        let opts: SessionOptions = serde_json::from_str(json)
            .map_err(|e| SqlDriverError::Config(format!("invalid session options: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    #[must_use]
    pub fn builder() -> SessionOptionsBuilder {
        SessionOptionsBuilder::new()
    }

    /// # Errors
    /// Returns [`SqlDriverError::Config`] when the calendar offset is a day or more from UTC or
    /// the batch limit is zero.
    pub fn validate(&self) -> Result<(), SqlDriverError> {
        if let Some(seconds) = self.calendar_offset_seconds {
            if seconds.unsigned_abs() >= 86_400 {
                return Err(SqlDriverError::Config(format!(
                    "calendar offset {seconds}s is out of range"
                )));
            }
        }
        if self.max_batch_entries == Some(0) {
            return Err(SqlDriverError::Config(
                "max_batch_entries must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for [`SessionOptions`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptionsBuilder {
    opts: SessionOptions,
}

impl SessionOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn escape_processing(mut self, enabled: bool) -> Self {
        self.opts.escape_processing = enabled;
        self
    }

    #[must_use]
    pub fn probe_timeout_ms(mut self, millis: u64) -> Self {
        self.opts.probe_timeout_ms = millis;
        self
    }

    #[must_use]
    pub fn calendar_offset_seconds(mut self, seconds: i32) -> Self {
        self.opts.calendar_offset_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn max_batch_entries(mut self, max: usize) -> Self {
        self.opts.max_batch_entries = Some(max);
        self
    }

    /// # Errors
    /// Same as [`SessionOptions::validate`].
    pub fn finish(self) -> Result<SessionOptions, SqlDriverError> {
        self.opts.validate()?;
        Ok(self.opts)
    }
}
