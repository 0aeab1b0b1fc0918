//! Domain error types.

/// A parse error with position information, used by the take-profit ladder parser.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for tradefuse.
///
/// Only the broker/persistence boundary, adapters, and configuration loading
/// produce these. Indicator, condition, scoring and decision code is total.
#[derive(Debug, thiserror::Error)]
pub enum TradefuseError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    LadderParse(#[from] ParseError),

    #[error("no price data for {symbol} ({timeframe})")]
    NoData { symbol: String, timeframe: String },

    #[error("broker rejected order for {symbol}: {reason}")]
    Broker { symbol: String, reason: String },

    #[error("invalid order: {reason}")]
    InvalidOrder { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradefuseError {
    /// True for failures at the broker boundary (submission error, timeout).
    pub fn is_broker_failure(&self) -> bool {
        matches!(self, TradefuseError::Broker { .. })
    }
}

impl From<&TradefuseError> for std::process::ExitCode {
    fn from(err: &TradefuseError) -> Self {
        let code: u8 = match err {
            TradefuseError::Io(_) => 1,
            TradefuseError::ConfigParse { .. }
            | TradefuseError::ConfigMissing { .. }
            | TradefuseError::ConfigInvalid { .. } => 2,
            TradefuseError::Database { .. } | TradefuseError::DatabaseQuery { .. } => 3,
            TradefuseError::LadderParse(_) => 4,
            TradefuseError::NoData { .. } => 5,
            TradefuseError::Broker { .. } | TradefuseError::InvalidOrder { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
