//! Status classification and reason phrases.
//!
//! Classification looks at the class range of a three-digit code and nothing else:
//!
//! | Codes | [`StatusType`] |
//! |---|---|
//! | `1xx`, `2xx`, `3xx` | `success` |
//! | `4xx` | `fail` |
//! | `5xx` | `error` |
//! | anything outside `100..=599` | `unknown` |
//!
//! `1xx` and `3xx` count as success here even though neither carries a final
//! representation. Clients of the `api` body rely on this mapping.

use std::fmt;

use serde::Serialize;

/// Coarse outcome class of a status code, as written into `api` bodies.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusType {
    Success,
    Fail,
    Error,
    Unknown,
}

impl StatusType {
    /// Classifies `code` by its class range. Codes outside 100..=599 are unknown.
    pub fn of(code: u16) -> Self {
        match code {
            100..=399 => Self::Success,
            400..=499 => Self::Fail,
            500..=599 => Self::Error,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail    => "fail",
            Self::Error   => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registered reason phrase for `code`, or `""` when there is none.
pub fn phrase(code: u16) -> &'static str {
    http::StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("")
}
