//! Configuration for the indent core.
//!
//! Two layers:
//!
//! - [`IndentConfig`]: behavioural options (debounce windows, grouping rule,
//!   export naming, pre-stamped signatories). Plain data with defaults, can
//!   be deserialised from JSON handed over by the UI shell.
//! - [`BackendConfig`]: connection settings loaded from the environment.
//!
//! # Environment Variables
//!
//! ## Required
//! - `INDENT_BACKEND_URL` - Base URL of the hosted backend (used for public asset URLs)
//! - `INDENT_BACKEND_KEY` - Backend API key
//!
//! ## Optional
//! - `INDENT_DATABASE_PATH` - Local SQLite file (default: `indent.db`)
//! - `INDENT_STORAGE_BUCKET` - Asset bucket for drug images (default: `drug-images`)

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grouping::GroupingRule;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Date formats accepted by date inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateInputFormat {
    /// `DD/MM/YYYY`
    DayMonthYear,
    /// `DDMMYY`
    Compact,
}

impl DateInputFormat {
    fn pattern(&self) -> &'static str {
        match self {
            DateInputFormat::DayMonthYear => "%d/%m/%Y",
            DateInputFormat::Compact => "%d%m%y",
        }
    }
}

/// A staff member whose details are pre-stamped on the indent form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatoryConfig {
    pub name: String,
    pub position: String,
    /// JPEG scan of the signature
    #[serde(default)]
    pub signature_path: Option<PathBuf>,
}

/// Behavioural options for the indent core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndentConfig {
    /// Delay before numeric stock edits mark the form as changed
    pub edit_debounce_ms: u64,
    /// Minimum spacing between change-triggered refetches
    pub refetch_window_ms: u64,
    /// How cart rows are bucketed by source
    pub grouping: GroupingRule,
    /// Sort rows by item name inside each bucket
    pub sort_by_name: bool,
    /// Refuse to save a quick edit whose quantity is blank or zero
    pub reject_zero_quantity: bool,
    /// Prefix of exported PDF file names
    pub filename_prefix: String,
    /// Prefix of exported spreadsheet file names
    pub workbook_prefix: String,
    /// Accepted date input formats, tried in order
    pub date_input_formats: Vec<DateInputFormat>,
    /// Pre-stamped requester block
    pub requester: Option<SignatoryConfig>,
    /// Pre-stamped receiver block
    pub receiver: Option<SignatoryConfig>,
}

impl Default for IndentConfig {
    fn default() -> Self {
        Self {
            edit_debounce_ms: 500,
            refetch_window_ms: 1000,
            grouping: GroupingRule::default(),
            sort_by_name: true,
            reject_zero_quantity: true,
            filename_prefix: "OPD_Indent".to_string(),
            workbook_prefix: "Indent_Cart".to_string(),
            date_input_formats: vec![DateInputFormat::DayMonthYear, DateInputFormat::Compact],
            requester: None,
            receiver: None,
        }
    }
}

impl IndentConfig {
    /// Parse from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn edit_debounce(&self) -> Duration {
        Duration::from_millis(self.edit_debounce_ms)
    }

    pub fn refetch_window(&self) -> Duration {
        Duration::from_millis(self.refetch_window_ms)
    }

    /// Parse a typed date using the accepted input formats.
    pub fn parse_date_input(&self, input: &str) -> Option<NaiveDate> {
        let trimmed = input.trim();
        self.date_input_formats
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(trimmed, f.pattern()).ok())
    }
}

/// Backend connection settings.
///
/// Implements `Debug` manually to redact the key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL of the hosted backend
    pub url: String,
    /// API key
    pub key: SecretString,
    /// Local SQLite database file
    pub database_path: PathBuf,
    /// Storage bucket for drug images
    pub storage_bucket: String,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url)
            .field("key", &"[REDACTED]")
            .field("database_path", &self.database_path)
            .field("storage_bucket", &self.storage_bucket)
            .finish()
    }
}

impl BackendConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let url = get_required_env("INDENT_BACKEND_URL")?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidEnvVar(
                "INDENT_BACKEND_URL".to_string(),
                "must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            key: SecretString::from(get_required_env("INDENT_BACKEND_KEY")?),
            database_path: PathBuf::from(get_env_or_default("INDENT_DATABASE_PATH", "indent.db")),
            storage_bucket: get_env_or_default("INDENT_STORAGE_BUCKET", "drug-images"),
        })
    }

    /// Headers authenticating a request to the backend.
    pub fn auth_headers(&self) -> Vec<(&'static str, String)> {
        let key = self.key.expose_secret();
        vec![
            ("apikey", key.to_string()),
            ("Authorization", format!("Bearer {key}")),
        ]
    }

    /// Public URL prefix for objects in the image bucket.
    pub fn public_asset_base(&self) -> String {
        format!("{}/storage/v1/object/public/{}", self.url, self.storage_bucket)
    }
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
