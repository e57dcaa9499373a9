//! Errors surfaced by the analytics provider.
//!
//! Only fatal problems become an [`AnalyticsError`]: a missing tracking id, a pageview without a
//! path, an event without category and action, a timing without a numeric value, or `set` fields
//! that are not an object. Such a call is rejected before any command reaches a sink.
//!
//! Malformed optional fields (`value`, `nonInteraction`, `transport`, `fatal`) are not errors.
//! They are reported with `log::warn!`, dropped from the command, and the call goes through.
//! Sink and network failures stay inside the sink and are logged the same way.

use std::fmt::{Display, Formatter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalyticsErrorCode {
    /// Fatal validation failure of a caller argument or configuration value.
    InvalidArgument,
    Internal,
    Network,
}

impl AnalyticsErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsErrorCode::InvalidArgument => "ga-provider/invalid-argument",
            AnalyticsErrorCode::Internal => "ga-provider/internal",
            AnalyticsErrorCode::Network => "ga-provider/network",
        }
    }
}

/// `code` tells validation failures ([`AnalyticsErrorCode::InvalidArgument`]) apart from
/// configuration and transport problems.
#[derive(Clone, Debug)]
pub struct AnalyticsError {
    pub code: AnalyticsErrorCode,
    message: String,
}

impl AnalyticsError {
    pub fn new(code: AnalyticsErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_invalid_argument(&self) -> bool {
        self.code == AnalyticsErrorCode::InvalidArgument
    }
}

impl Display for AnalyticsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code_str())
    }
}

impl std::error::Error for AnalyticsError {}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

pub fn invalid_argument(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::InvalidArgument, message)
}

pub fn internal_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::Internal, message)
}

pub fn network_error(message: impl Into<String>) -> AnalyticsError {
    AnalyticsError::new(AnalyticsErrorCode::Network, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code() {
        let err = invalid_argument("path is required in pageview()");
        assert!(err.is_invalid_argument());
        assert_eq!(
            err.to_string(),
            "path is required in pageview() (ga-provider/invalid-argument)"
        );
        assert_eq!(network_error("boom").code_str(), "ga-provider/network");
    }
}
