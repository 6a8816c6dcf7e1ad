use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported config format for {0} (expected .toml, .yaml or .yml)")]
    UnsupportedFormat(PathBuf),

    #[error("indicator name must not be empty")]
    EmptyIndicatorName,

    #[error("indicator '{0}' is registered more than once")]
    DuplicateIndicator(String),

    #[error("indicator '{name}' is invalid: {reason}")]
    InvalidIndicator { name: String, reason: String },

    #[error("health group '{group}' references unknown indicator '{member}'")]
    UnknownGroupMember { group: String, member: String },

    #[error("health group '{0}' is reserved and cannot be configured")]
    ReservedGroup(String),

    #[error("liveness group must not include remote dependency '{0}'")]
    RemoteInLiveness(String),

    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting { field: String, reason: String },
}
