use super::Config;
use std::path::PathBuf;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("LANGMETRES_BACKEND_URL")
            && !url.trim().is_empty()
        {
            self.backend_url = url.trim().to_string();
        }

        if let Ok(data_dir) = std::env::var("LANGMETRES_DATA_DIR")
            && !data_dir.is_empty()
        {
            self.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(timeout_str) = std::env::var("LANGMETRES_TIMEOUT_SECS")
            && let Ok(timeout) = timeout_str.trim().parse::<u64>()
            && timeout > 0
        {
            self.request_timeout_secs = timeout;
        }
    }
}
