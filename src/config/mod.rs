//! Default locations and environment overrides.
//!
//! The rate limit state file is resolved in this order:
//!
//! 1. `$NAVARRO_STATE_FILE`, when set and non-empty
//! 2. `<config dir>/navarro/rate_limits.json`
//! 3. `~/.navarro_rate_limits.json`

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable overriding the state file location.
pub const STATE_FILE_ENV: &str = "NAVARRO_STATE_FILE";

pub const STATE_DIR_NAME: &str = "navarro";
pub const STATE_FILE_NAME: &str = "rate_limits.json";
pub const LEGACY_STATE_FILE_NAME: &str = ".navarro_rate_limits.json";

/// Default state file, or `None` when no home or config directory exists.
pub fn default_state_path() -> Option<PathBuf> {
    resolve_state_path(
        std::env::var_os(STATE_FILE_ENV),
        dirs::config_dir().as_deref(),
        dirs::home_dir().as_deref(),
    )
}

fn resolve_state_path(
    env_override: Option<OsString>,
    config_dir: Option<&Path>,
    home_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = env_override
        && !path.is_empty()
    {
        return Some(PathBuf::from(path));
    }
    if let Some(dir) = config_dir {
        return Some(dir.join(STATE_DIR_NAME).join(STATE_FILE_NAME));
    }
    home_dir.map(|home| home.join(LEGACY_STATE_FILE_NAME))
}
