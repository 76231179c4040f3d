use std::path::PathBuf;

pub fn default_root() -> PathBuf {
    PathBuf::from(".")
}

pub fn default_application_root() -> String {
    "/".to_string()
}

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    8080
}

/// One year, the usual ceiling for immutable assets.
pub fn default_max_age_secs() -> u64 {
    31_536_000
}

/// Editor-only script companions that never belong on a page.
pub fn default_ignore() -> Vec<String> {
    vec![
        "*.intellisense.js".to_string(),
        "*-vsdoc.js".to_string(),
    ]
}

pub fn default_timeout_secs() -> u64 {
    sluice::engine::DEFAULT_TIMEOUT_SECS
}

pub fn default_true() -> bool {
    true
}
