use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no config directory available on this platform")]
    NoConfigDir,

    #[error("check interval must be greater than zero")]
    ZeroInterval,

    #[error("deadline phase must be greater than zero")]
    ZeroDeadline,

    #[error("phase 0 cannot be used as an escalation phase")]
    ZeroPhase,

    #[error("phase {0} is listed as both a check and a connect phase")]
    OverlappingPhase(u32),

    #[error("phase {phase} must be below the deadline phase {deadline}")]
    PhaseBeyondDeadline { phase: u32, deadline: u32 },
}

/// Why a status reply was discarded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplyError {
    #[error("empty reply payload")]
    Empty,

    #[error("malformed reply: {0}")]
    Malformed(String),

    #[error("reply for `{actual}` while waiting for `{expected}`")]
    Unmatched { expected: String, actual: String },
}

/// Errors talking to a running monitor task
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("monitor for `{0}` has been torn down")]
    Closed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("device `{0}` is already monitored")]
    AlreadyMonitored(String),

    #[error("device `{0}` is not monitored")]
    NotMonitored(String),
}
