use std::{collections::HashMap, sync::RwLock};

use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

static LOGGER_CONFIG: Lazy<RwLock<LoggingConfig>> =
    Lazy::new(|| RwLock::new(LoggingConfig::default()));

#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub enum LogLevel {
    INFO,
    VERBOSE,
}

// All macros expect a `const CC: &str` on the calling impl naming the component.

#[macro_export]
macro_rules! logln {
    ($($arg:tt)*) => {
        if $crate::util::logging::is_enabled(Self::CC) {
            tracing::info!(cc = Self::CC, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! logvbln {
    ($($arg:tt)*) => {
        if $crate::util::logging::is_enabled(Self::CC)
            && $crate::util::logging::is_at_level(Self::CC, $crate::util::logging::LogLevel::VERBOSE)
        {
            tracing::debug!(cc = Self::CC, $($arg)*);
        }
    };
}

#[macro_export]
macro_rules! logwarn {
    ($($arg:tt)*) => {
        if $crate::util::logging::is_enabled(Self::CC) {
            tracing::warn!(cc = Self::CC, $($arg)*);
        }
    };
}

/// Install the global `tracing` subscriber and the component switches.
/// `RUST_LOG` wins over `verbose`.
pub fn init(settings: &crate::config::LoggingConfig) {
    let default_directive = if settings.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A subscriber may already be installed (tests, embedding binaries).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();

    if let Ok(mut config) = LOGGER_CONFIG.write() {
        *config = LoggingConfig::from_settings(settings);
    }
}

pub fn is_enabled(cc: &str) -> bool {
    LOGGER_CONFIG
        .read()
        .map(|config| config.cc_enabled(cc))
        .unwrap_or(true)
}

pub fn is_at_level(cc: &str, level: LogLevel) -> bool {
    LOGGER_CONFIG
        .read()
        .map(|config| config.cc_at_level(cc, level))
        .unwrap_or(false)
}

pub struct LoggingConfig {
    global_level: LogLevel,
    flags: HashMap<String, (bool, LogLevel)>, // <component, (enabled, level)>
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: LogLevel::INFO,
            flags: Default::default(),
        }
    }
}

impl LoggingConfig {
    pub fn from_settings(settings: &crate::config::LoggingConfig) -> Self {
        let mut config = Self::default();

        if settings.verbose {
            config.set_global_level(LogLevel::VERBOSE);
        }
        for cc in &settings.verbose_components {
            config.enable_cc(cc, LogLevel::VERBOSE);
        }
        for cc in &settings.muted {
            config.disable_cc(cc);
        }

        config
    }

    pub fn cc_enabled(&self, cc: &str) -> bool {
        self.flags.get(cc).unwrap_or(&(true, LogLevel::INFO)).0
    }

    pub fn cc_at_level(&self, cc: &str, level: LogLevel) -> bool {
        if self.global_level >= level {
            return true;
        }

        self.flags.get(cc).unwrap_or(&(true, LogLevel::INFO)).1 >= level
    }

    pub fn enable_cc(&mut self, cc: &str, level: LogLevel) {
        self.flags.insert(cc.to_string(), (true, level));
    }

    pub fn disable_cc(&mut self, cc: &str) {
        self.flags.insert(cc.to_string(), (false, LogLevel::INFO));
    }

    pub fn set_global_level(&mut self, level: LogLevel) {
        self.global_level = level;
    }
}
