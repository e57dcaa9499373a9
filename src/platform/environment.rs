//! Execution context detection.

use std::env;

use serde::{Deserialize, Serialize};

/// Environment variable that forces the detected runtime (`interactive` or `headless`).
pub const RUNTIME_ENV_VAR: &str = "GA_PROVIDER_RUNTIME";

/// Whether commands can reach a live analytics backend. In a headless runtime every provider
/// operation is a no-op.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    Interactive,
    Headless,
}

impl Runtime {
    pub fn is_interactive(&self) -> bool {
        matches!(self, Runtime::Interactive)
    }
}

pub fn detect_runtime() -> Runtime {
    parse_runtime(env::var(RUNTIME_ENV_VAR).ok().as_deref())
}

fn parse_runtime(forced: Option<&str>) -> Runtime {
    match forced.map(str::trim) {
        Some(value) if value.eq_ignore_ascii_case("headless") => Runtime::Headless,
        Some(value) if value.eq_ignore_ascii_case("interactive") || value.is_empty() => {
            Runtime::Interactive
        }
        Some(value) => {
            log::warn!("unknown {RUNTIME_ENV_VAR} value `{value}`; assuming interactive");
            Runtime::Interactive
        }
        None => Runtime::Interactive,
    }
}
