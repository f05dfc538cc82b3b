// Logging utilities for the Trifle PKI engine
//
// This module provides:
// - Component-based structured logging over the `log` facade
// - A context id (device alias, authority name) carried through child loggers
// - Per-component level overrides applied through `env_logger`

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Arguments, Display, Formatter};

/// Predefined components for logging categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Keys,
    Request,
    Authority,
    Validator,
    SignedData,
    Custom(&'static str),
}

impl Component {
    /// Get the string representation of the component
    pub fn as_str(&self) -> &str {
        match self {
            Component::Keys => "Keys",
            Component::Request => "Request",
            Component::Authority => "Authority",
            Component::Validator => "Validator",
            Component::SignedData => "SignedData",
            Component::Custom(name) => name,
        }
    }

    /// Log target used for records emitted by this component.
    ///
    /// Targets share the `trifle::` prefix so a single `env_logger` module
    /// filter can address every component at once.
    pub fn target(&self) -> &'static str {
        match self {
            Component::Keys => "trifle::keys",
            Component::Request => "trifle::request",
            Component::Authority => "trifle::authority",
            Component::Validator => "trifle::validator",
            Component::SignedData => "trifle::signed_data",
            Component::Custom(_) => "trifle::custom",
        }
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct ComponentPrefixDisplay {
    parent: Option<Component>,
    component: Component,
}

impl Display for ComponentPrefixDisplay {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.parent {
            Some(parent) => write!(f, "{}.{}", parent.as_str(), self.component.as_str()),
            None => write!(f, "{}", self.component.as_str()),
        }
    }
}

/// A component-scoped logger carrying a context id
#[derive(Debug, Clone)]
pub struct Logger {
    /// Component this logger is for
    component: Component,
    /// Device alias or authority name
    context_id: String,
    /// Parent component for hierarchical logging (if any)
    parent_component: Option<Component>,
}

impl Logger {
    /// Create a root logger for a component and context id
    pub fn new_root(component: Component, context_id: &str) -> Self {
        Self {
            component,
            context_id: context_id.to_string(),
            parent_component: None,
        }
    }

    /// Create a child logger with the same context id but a different component
    pub fn with_component(&self, component: Component) -> Self {
        Self {
            component,
            context_id: self.context_id.clone(),
            parent_component: Some(self.component),
        }
    }

    /// Like [`Logger::with_component`], but returns a plain clone when this
    /// logger already belongs to `component`
    pub fn scoped(&self, component: Component) -> Self {
        if self.component == component {
            self.clone()
        } else {
            self.with_component(component)
        }
    }

    /// Create a logger with the same component but a different context id
    pub fn with_context_id(&self, context_id: impl Into<String>) -> Self {
        Self {
            component: self.component,
            context_id: context_id.into(),
            parent_component: self.parent_component,
        }
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    fn prefix(&self) -> ComponentPrefixDisplay {
        ComponentPrefixDisplay {
            parent: self.parent_component,
            component: self.component,
        }
    }

    /// Log a debug message
    pub fn debug(&self, message: impl Into<String>) {
        if log::log_enabled!(target: self.component.target(), log::Level::Debug) {
            debug!(
                target: self.component.target(),
                "[{}][{}] {}",
                self.context_id,
                self.prefix(),
                message.into()
            );
        }
    }

    /// Log a debug message using fmt::Arguments (avoids allocating message String)
    pub fn debug_args(&self, args: Arguments) {
        if log::log_enabled!(target: self.component.target(), log::Level::Debug) {
            debug!(
                target: self.component.target(),
                "[{}][{}] {}",
                self.context_id,
                self.prefix(),
                args
            );
        }
    }

    /// Log an info message
    pub fn info(&self, message: impl Into<String>) {
        if log::log_enabled!(target: self.component.target(), log::Level::Info) {
            info!(
                target: self.component.target(),
                "[{}][{}] {}",
                self.context_id,
                self.prefix(),
                message.into()
            );
        }
    }

    /// Log an info message using fmt::Arguments
    pub fn info_args(&self, args: Arguments) {
        if log::log_enabled!(target: self.component.target(), log::Level::Info) {
            info!(
                target: self.component.target(),
                "[{}][{}] {}",
                self.context_id,
                self.prefix(),
                args
            );
        }
    }

    /// Log a warning message
    pub fn warn(&self, message: impl Into<String>) {
        if log::log_enabled!(target: self.component.target(), log::Level::Warn) {
            warn!(
                target: self.component.target(),
                "[{}][{}] {}",
                self.context_id,
                self.prefix(),
                message.into()
            );
        }
    }

    /// Log a warning using fmt::Arguments
    pub fn warn_args(&self, args: Arguments) {
        if log::log_enabled!(target: self.component.target(), log::Level::Warn) {
            warn!(
                target: self.component.target(),
                "[{}][{}] {}",
                self.context_id,
                self.prefix(),
                args
            );
        }
    }

    /// Log an error message
    pub fn error(&self, message: impl Into<String>) {
        if log::log_enabled!(target: self.component.target(), log::Level::Error) {
            error!(
                target: self.component.target(),
                "[{}][{}] {}",
                self.context_id,
                self.prefix(),
                message.into()
            );
        }
    }
}

/// Log level used by [`LoggingConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Logging configuration: a default level plus per-component overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub default_level: LogLevel,
    #[serde(default)]
    pub component_levels: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingConfig {
    /// Create a configuration that logs warnings and errors only
    pub fn new() -> Self {
        Self {
            default_level: LogLevel::Warn,
            component_levels: HashMap::new(),
        }
    }

    /// Info-level default used by long-running issuers
    pub fn default_info() -> Self {
        Self::new().with_default_level(LogLevel::Info)
    }

    pub fn with_default_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        self
    }

    /// Override the level for one component
    pub fn with_component_level(mut self, component: Component, level: LogLevel) -> Self {
        self.component_levels
            .insert(component.target().to_string(), level);
        self
    }

    /// Level that applies to records from `component`
    pub fn level_for(&self, component: Component) -> LogLevel {
        self.component_levels
            .get(component.target())
            .copied()
            .unwrap_or(self.default_level)
    }

    /// Install this configuration as the global logger.
    ///
    /// Only the first call in a process takes effect; later calls are ignored
    /// so tests and embedders can call it freely.
    pub fn apply(&self) {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(self.default_level.to_level_filter());
        for (target, level) in &self.component_levels {
            builder.filter_module(target, level.to_level_filter());
        }
        let _ = builder.try_init();
    }
}
