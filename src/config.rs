//! Kernel settings.
//!
//! All configuration is driven by environment variables prefixed `KILN_`.
//! Loading configuration files is left to the application.

use serde::{Deserialize, Serialize};

use crate::response::ContentKind;

/// Process-wide kernel settings. Built once at startup, shared read-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Writer used by content negotiation.
    pub response_type: ContentKind,
    /// Splits `"Class@method"` callback references.
    pub separator: String,
    /// Populates the `output` meta field from the diagnostic sink.
    pub test_mode: bool,
    /// Name of the error translator to resolve at startup.
    pub error_translator: String,
    /// Top-level key names of the `api` body.
    pub keys: BodyKeys,
    /// Base statuses picked by content negotiation.
    pub status: StatusCodes,
}

/// Top-level key names of the `api` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BodyKeys {
    pub body: String,
    pub meta: String,
    pub status: String,
}

/// Base statuses picked by content negotiation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCodes {
    pub success: u16,
    pub not_found: u16,
    pub not_implemented: u16,
    /// Default failure status for errors outside the taxonomy.
    pub fail: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            response_type: ContentKind::Api,
            separator: "@".to_owned(),
            test_mode: false,
            error_translator: "default".to_owned(),
            keys: BodyKeys {
                body: "data".to_owned(),
                meta: "meta".to_owned(),
                status: "status".to_owned(),
            },
            status: StatusCodes {
                success: 200,
                not_found: 404,
                not_implemented: 501,
                fail: 500,
            },
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    ///
    /// Unparseable numeric values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Ok(v) = std::env::var("KILN_RESPONSE_TYPE") {
            settings.response_type = ContentKind::from_name(&v);
        }
        if let Ok(v) = std::env::var("KILN_SEPARATOR") {
            settings.separator = v;
        }
        if let Ok(v) = std::env::var("KILN_TEST_MODE") {
            settings.test_mode = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("KILN_ERROR_TRANSLATOR") {
            settings.error_translator = v;
        }
        if let Ok(v) = std::env::var("KILN_BODY_KEY") {
            settings.keys.body = v;
        }
        if let Ok(v) = std::env::var("KILN_META_KEY") {
            settings.keys.meta = v;
        }
        if let Ok(v) = std::env::var("KILN_STATUS_KEY") {
            settings.keys.status = v;
        }
        status_var("KILN_STATUS_SUCCESS", &mut settings.status.success);
        status_var("KILN_STATUS_NOT_FOUND", &mut settings.status.not_found);
        status_var("KILN_STATUS_NOT_IMPLEMENTED", &mut settings.status.not_implemented);
        status_var("KILN_STATUS_FAIL", &mut settings.status.fail);

        settings
    }
}

fn status_var(name: &str, slot: &mut u16) {
    let Ok(raw) = std::env::var(name) else { return };
    match raw.parse() {
        Ok(code) => *slot = code,
        Err(_) => tracing::warn!(var = name, value = %raw, "ignoring non-numeric status"),
    }
}

/// Comma-separated list from an environment variable; empty when unset.
pub fn list_var(name: &str) -> Vec<String> {
    std::env::var(name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}
