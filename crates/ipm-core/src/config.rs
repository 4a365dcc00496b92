//! Optional config from .ipmrc or ~/.ipmrc (JSON). Options and env override it.

use std::path::{Path, PathBuf};

pub const RC_FILE: &str = ".ipmrc";

/// Settings read from an rc file. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    pub home_path: Option<PathBuf>,
    pub app_data_path: Option<PathBuf>,
    pub api_url: Option<String>,
    pub registry: Option<String>,
}

/// Load config from .ipmrc in dir, then ~/.ipmrc. First file found wins;
/// missing or invalid file = default.
pub fn load_config(dir: &Path) -> Config {
    let mut candidates = vec![dir.join(RC_FILE)];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(RC_FILE));
    }
    for path in &candidates {
        if path.is_file() {
            return read_config(path);
        }
    }
    Config::default()
}

fn read_config(path: &Path) -> Config {
    let mut cfg = Config::default();
    let Ok(s) = std::fs::read_to_string(path) else {
        return cfg;
    };
    let Ok(v) = serde_json::from_str::<serde_json::Value>(&s) else {
        tracing::warn!("Ignoring invalid config file {}", path.display());
        return cfg;
    };
    let string = |key: &str| {
        v.get(key)
            .and_then(|x| x.as_str())
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .map(String::from)
    };
    cfg.home_path = string("homePath").map(PathBuf::from);
    cfg.app_data_path = string("appDataPath").map(PathBuf::from);
    cfg.api_url = string("apiUrl").map(|u| u.trim_end_matches('/').to_string());
    cfg.registry = string("registry").map(|u| u.trim_end_matches('/').to_string());
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_rc_file_from_dir() {
        let td = tempfile::tempdir().unwrap();
        std::fs::write(
            td.path().join(RC_FILE),
            r#"{ "homePath": "/opt/host", "apiUrl": "https://api.example.test/", "registry": " https://npm.example.test/ " }"#,
        )
        .unwrap();

        let cfg = load_config(td.path());
        assert_eq!(cfg.home_path, Some(PathBuf::from("/opt/host")));
        assert_eq!(cfg.api_url.as_deref(), Some("https://api.example.test"));
        assert_eq!(cfg.registry.as_deref(), Some("https://npm.example.test"));
        assert_eq!(cfg.app_data_path, None);
    }

    #[test]
    fn invalid_rc_file_is_ignored() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join(RC_FILE);
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(read_config(&path), Config::default());
    }
}
