use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Clausewright";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable that relocates the application data directory.
pub const DATA_DIR_ENV: &str = "CLAUSEWRIGHT_DATA_DIR";

/// Get the application data directory.
/// `CLAUSEWRIGHT_DATA_DIR` if set, otherwise ~/Clausewright/.
pub fn app_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// SQLite file holding suspended workflow sessions and compiled artifacts.
pub fn sessions_db_path() -> PathBuf {
    app_data_dir().join("sessions.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "clausewright_lib=debug,info"
    } else {
        "clausewright_lib=info,warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_db_under_app_data() {
        let db = sessions_db_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("sessions.db"));
    }

    #[test]
    fn app_name_is_clausewright() {
        assert_eq!(APP_NAME, "Clausewright");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }

    #[test]
    fn log_filter_targets_library() {
        assert!(default_log_filter().starts_with("clausewright_lib="));
    }
}
