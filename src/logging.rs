//! Opt-in `tracing` subscriber for layout diagnostics.
//!
//! Layout code emits events under the `layout` target. Embedders that already install a
//! subscriber see them there; everyone else can call [`init_logging`].

use std::env;
use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt as subscriber_fmt};

pub const LOG_FORMAT_ENV: &str = "SHARED_LAYOUT_LOG_FORMAT";
pub const LOG_LEVEL_ENV: &str = "SHARED_LAYOUT_LOG_LEVEL";

/// Event target used by every layout diagnostic.
pub const LAYOUT_TARGET: &str = "layout";

/// Rendering of layout events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if ["compact", "text", "plain"]
            .iter()
            .any(|alias| name.eq_ignore_ascii_case(alias))
        {
            Some(Self::Compact)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    pub format: LogFormat,
    /// Most verbose layout event that is recorded. Refusals log at `WARN`.
    pub level: Level,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            format: LogFormat::Compact,
            level: Level::WARN,
        }
    }
}

impl LogOptions {
    /// Defaults overridden by `SHARED_LAYOUT_LOG_FORMAT` and `SHARED_LAYOUT_LOG_LEVEL`.
    /// Unrecognised values keep the default.
    #[must_use]
    pub fn from_env() -> Self {
        let format = env::var(LOG_FORMAT_ENV).ok();
        let level = env::var(LOG_LEVEL_ENV).ok();
        Self::from_values(format.as_deref(), level.as_deref())
    }

    fn from_values(format: Option<&str>, level: Option<&str>) -> Self {
        let defaults = Self::default();
        Self {
            format: format
                .and_then(LogFormat::from_name)
                .unwrap_or(defaults.format),
            level: level
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(defaults.level),
        }
    }

    fn directive(self) -> String {
        format!(
            "{LAYOUT_TARGET}={}",
            self.level.as_str().to_ascii_lowercase()
        )
    }
}

/// Install a global subscriber for layout events. Later calls, and calls after another
/// subscriber was installed, do nothing.
///
/// `RUST_LOG` replaces the configured level when it parses.
pub fn init_logging(options: LogOptions) {
    static INSTALLED: OnceLock<()> = OnceLock::new();

    INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(options.directive()));
        let builder = subscriber_fmt::fmt()
            .with_env_filter(filter)
            .with_ansi(env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal())
            .with_writer(std::io::stderr)
            .with_target(true);

        let installed = match options.format {
            LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
            LogFormat::Compact => {
                tracing::subscriber::set_global_default(builder.compact().finish())
            }
        };
        if installed.is_ok() {
            tracing::debug!(
                target: LAYOUT_TARGET,
                stage = "logging.init",
                format = ?options.format,
                level = %options.level
            );
        }
    });
}
