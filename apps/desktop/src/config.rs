use std::{collections::HashMap, fs, io, path::Path};

use anyhow::Context;
use client_core::DEFAULT_SERVER_URL;

pub const SETTINGS_FILE: &str = "storyboard.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub username: Option<String>,
    pub token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            username: None,
            token: None,
        }
    }
}

impl Settings {
    /// Command-line flags win over everything loaded from file or environment.
    pub fn with_overrides(
        mut self,
        server_url: Option<String>,
        username: Option<String>,
        token: Option<String>,
    ) -> Self {
        if let Some(v) = server_url {
            self.server_url = v;
        }
        if let Some(v) = username {
            self.username = Some(v);
        }
        if let Some(v) = token {
            self.token = Some(v);
        }
        self
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg = toml::from_str::<HashMap<String, String>>(&raw)
                .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
            if let Some(v) = file_cfg.get("server_url") {
                settings.server_url = v.clone();
            }
            if let Some(v) = file_cfg.get("username") {
                settings.username = Some(v.clone());
            }
            if let Some(v) = file_cfg.get("token") {
                settings.token = Some(v.clone());
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()));
        }
    }

    if let Some(v) = env("STORYBOARD_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = env("STORYBOARD_USERNAME") {
        settings.username = Some(v);
    }

    if let Some(v) = env("STORYBOARD_TOKEN") {
        settings.token = Some(v);
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        path::PathBuf,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    fn temp_settings_file(contents: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = env::temp_dir().join(format!("storyboard_config_test_{suffix}"));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join(SETTINGS_FILE);
        fs::write(&path, contents).expect("write settings");
        path
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = env::temp_dir().join("storyboard_config_test_missing/storyboard.toml");
        let settings = load_settings_from(&path, no_env).expect("settings");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
    }

    #[test]
    fn file_values_then_env_then_flags() {
        let path = temp_settings_file(
            "server_url = \"http://file.local\"\nusername = \"ann\"\ntoken = \"file-token\"\n",
        );

        let from_file = load_settings_from(&path, no_env).expect("settings");
        assert_eq!(from_file.server_url, "http://file.local");
        assert_eq!(from_file.username.as_deref(), Some("ann"));
        assert_eq!(from_file.token.as_deref(), Some("file-token"));

        let from_env = load_settings_from(&path, |key| match key {
            "STORYBOARD_SERVER_URL" => Some("http://env.local".to_string()),
            "APP__SERVER_URL" => Some("http://app.local".to_string()),
            "STORYBOARD_TOKEN" => Some("env-token".to_string()),
            _ => None,
        })
        .expect("settings");
        assert_eq!(from_env.server_url, "http://app.local");
        assert_eq!(from_env.username.as_deref(), Some("ann"));
        assert_eq!(from_env.token.as_deref(), Some("env-token"));

        let flagged = from_env.with_overrides(None, Some("bob".to_string()), None);
        assert_eq!(flagged.username.as_deref(), Some("bob"));
        assert_eq!(flagged.token.as_deref(), Some("env-token"));

        fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
    }

    #[test]
    fn malformed_file_is_reported() {
        let path = temp_settings_file("server_url = [not valid");
        let err = load_settings_from(&path, no_env).expect_err("must fail");
        assert!(err.to_string().contains("failed to parse settings file"));
        fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
    }
}
