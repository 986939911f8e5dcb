//! Environment overrides.

use std::path::PathBuf;

use const_format::concatcp;
use log::{info, warn};

pub const ENV_PREFIX: &str = "VPN_BRIDGE_";
pub const IPC_PORT_VAR: &str = concatcp!(ENV_PREFIX, "IPC_PORT");
pub const IPC_TOKEN_VAR: &str = concatcp!(ENV_PREFIX, "IPC_TOKEN");
pub const LOG_LEVEL_VAR: &str = concatcp!(ENV_PREFIX, "LOG_LEVEL");

/// Load a `.env` file from the current directory, else from next to the executable.
///
/// Returns the file that was loaded. Variables already set in the process win.
pub fn try_load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded .env from: {:?}", path);
        return Some(path);
    }

    let exe_path = std::env::current_exe().ok()?;
    let env_path = exe_path.parent()?.join(".env");
    if !env_path.exists() {
        return None;
    }

    match dotenvy::from_path(&env_path) {
        Ok(()) => {
            info!("Loaded .env from: {:?}", env_path);
            Some(env_path)
        }
        Err(e) => {
            warn!("Failed to parse .env at {:?}: {}", env_path, e);
            None
        }
    }
}
