use serde::Deserialize;

/// Prefix of the environment variables read by [`BootstrapSettings::load`].
pub const ENV_PREFIX: &str = "YTMSHELL";

/// Process-level settings needed before the settings store exists.
///
/// Defaults are layered under `YTMSHELL_*` environment variables, e.g.
/// `YTMSHELL_DATA_DIR=/tmp/ytm YTMSHELL_DEBUG=true`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BootstrapSettings {
    pub data_dir: String,
    pub log_dir: String,
    pub debug: bool,
    pub console_log: bool,
    /// Write the log file as JSON lines instead of plain text.
    pub json_log: bool,
    /// Keep running on a defaulted snapshot after a fatal config error.
    /// Only honoured in debug builds.
    pub continue_on_fatal: bool,
}

impl BootstrapSettings {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    pub fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .set_default("data_dir", "ytmshell-data")?
            .set_default("log_dir", "logs")?
            .set_default("debug", false)?
            .set_default("console_log", true)?
            .set_default("json_log", false)?
            .set_default("continue_on_fatal", false)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Whether a fatal startup error may be logged and skipped.
    pub fn may_continue_after_fatal(&self) -> bool {
        cfg!(debug_assertions) && self.continue_on_fatal
    }
}
