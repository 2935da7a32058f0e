//! Application-level settings for the dispatcher.
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```
//! use verbs::AppConfig;
//!
//! let config: AppConfig =
//!     serde_json::from_str(r#"{ "program_name": "todo", "grace_period_ms": 250 }"#).unwrap();
//! assert_eq!(config.program_name, "todo");
//! assert!(config.handle_signals);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::schema::NameConversion;

/// Order of the "Commands:" list in help output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandOrder {
    #[default]
    Registration,
    Alphabetical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Shown in usage lines. Empty means the executable's file name.
    pub program_name: String,

    /// Printed by `--version`. `None` falls back to the engine build version.
    pub version: Option<String>,

    /// One-line summary at the top of the overview.
    pub description: Option<String>,

    pub name_conversion: NameConversion,

    pub command_order: CommandOrder,

    /// How long a handler may keep running after cancellation is requested.
    pub grace_period_ms: u64,

    /// Install a Ctrl+C / SIGTERM listener for each dispatch.
    pub handle_signals: bool,

    /// Style help output with ANSI escapes.
    pub color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            program_name: String::new(),
            version: None,
            description: None,
            name_conversion: NameConversion::KebabCase,
            command_order: CommandOrder::Registration,
            grace_period_ms: 5000,
            handle_signals: true,
            color: false,
        }
    }
}

impl AppConfig {
    pub fn new(program_name: impl Into<String>) -> Self {
        Self {
            program_name: program_name.into(),
            ..Default::default()
        }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// `program_name`, or the current executable's file name.
    pub fn resolved_program_name(&self) -> String {
        if !self.program_name.is_empty() {
            return self.program_name.clone();
        }
        std::env::args()
            .next()
            .as_deref()
            .map(std::path::Path::new)
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string())
    }
}
