//! Retry mode selectors

use opsched_errors::ContractError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which adjustment to apply before running an operation again.
///
/// The string tokens are stable; they are what settings files and the CLI use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetryMode {
    /// Placeholder for "do not retry". Passing it to a retry is a contract violation.
    #[serde(rename = "")]
    NoRetry,
    #[serde(rename = "Retry")]
    Retry,
    #[serde(rename = "RetryAsAdmin")]
    RetryAsAdmin,
    #[serde(rename = "RetryInteractive")]
    RetryInteractive,
    #[serde(rename = "RetryNoHashCheck")]
    RetrySkipIntegrityCheck,
}

impl RetryMode {
    /// Stable token for this mode
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::NoRetry => "",
            Self::Retry => "Retry",
            Self::RetryAsAdmin => "RetryAsAdmin",
            Self::RetryInteractive => "RetryInteractive",
            Self::RetrySkipIntegrityCheck => "RetryNoHashCheck",
        }
    }
}

impl fmt::Display for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for RetryMode {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::NoRetry),
            "Retry" => Ok(Self::Retry),
            "RetryAsAdmin" => Ok(Self::RetryAsAdmin),
            "RetryInteractive" => Ok(Self::RetryInteractive),
            "RetryNoHashCheck" => Ok(Self::RetrySkipIntegrityCheck),
            other => Err(ContractError::UnknownRetryMode {
                token: other.to_string(),
            }),
        }
    }
}

// Only real retry modes are offered on the command line
impl clap::ValueEnum for RetryMode {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            Self::Retry,
            Self::RetryAsAdmin,
            Self::RetryInteractive,
            Self::RetrySkipIntegrityCheck,
        ]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::NoRetry => None,
            Self::Retry => Some(clap::builder::PossibleValue::new("retry")),
            Self::RetryAsAdmin => Some(clap::builder::PossibleValue::new("admin")),
            Self::RetryInteractive => Some(clap::builder::PossibleValue::new("interactive")),
            Self::RetrySkipIntegrityCheck => {
                Some(clap::builder::PossibleValue::new("skip-integrity"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_round_trip_through_from_str() {
        for mode in [
            RetryMode::NoRetry,
            RetryMode::Retry,
            RetryMode::RetryAsAdmin,
            RetryMode::RetryInteractive,
            RetryMode::RetrySkipIntegrityCheck,
        ] {
            assert_eq!(mode.token().parse::<RetryMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_unknown_token_is_rejected() {
        let err = "RetryTwice".parse::<RetryMode>().unwrap_err();
        assert_eq!(
            err,
            ContractError::UnknownRetryMode {
                token: "RetryTwice".into()
            }
        );
    }

    #[test]
    fn test_no_retry_not_offered_on_cli() {
        use clap::ValueEnum;
        assert!(RetryMode::NoRetry.to_possible_value().is_none());
        assert!(!RetryMode::value_variants().contains(&RetryMode::NoRetry));
    }
}
