use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variables checked (in order) for the backend URL.
const URL_ENV_VARS: [&str; 3] = [
    "MYMUSIC_SUPABASE_URL",
    "SUPABASE_URL",
    "NEXT_PUBLIC_SUPABASE_URL",
];

/// Environment variables checked (in order) for the anonymous API key.
const KEY_ENV_VARS: [&str; 3] = [
    "MYMUSIC_SUPABASE_ANON_KEY",
    "SUPABASE_ANON_KEY",
    "NEXT_PUBLIC_SUPABASE_ANON_KEY",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub supabase_url: String,
    #[serde(default)]
    pub supabase_anon_key: String,
    #[serde(default = "default_songs_table")]
    pub songs_table: String,
    #[serde(default = "default_image_bucket")]
    pub image_bucket: String,
    #[serde(default = "default_audio_bucket")]
    pub audio_bucket: String,
    #[serde(default = "default_search_debounce_ms")]
    pub search_debounce_ms: u64,
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default)]
    pub muted: bool,
}

fn default_songs_table() -> String {
    "songs".to_string()
}

fn default_image_bucket() -> String {
    "images".to_string()
}

fn default_audio_bucket() -> String {
    "audio".to_string()
}

fn default_search_debounce_ms() -> u64 {
    300
}

fn default_search_limit() -> u32 {
    5
}

fn default_volume() -> f32 {
    1.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            songs_table: default_songs_table(),
            image_bucket: default_image_bucket(),
            audio_bucket: default_audio_bucket(),
            search_debounce_ms: default_search_debounce_ms(),
            search_limit: default_search_limit(),
            volume: default_volume(),
            muted: false,
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> AppResult<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::Config("Cannot find home directory".into()))?;
        Ok(home.join(".mymusic"))
    }

    pub fn config_path() -> AppResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found at {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay backend credentials from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Overlay backend credentials from `lookup`; the first non-empty
    /// variable in each list wins.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .find(|value| !value.trim().is_empty())
        };
        if let Some(url) = first(&URL_ENV_VARS) {
            self.supabase_url = url;
        }
        if let Some(key) = first(&KEY_ENV_VARS) {
            self.supabase_anon_key = key;
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.supabase_url.trim().is_empty() || self.supabase_anon_key.trim().is_empty() {
            return Err(AppError::Config(
                "Missing backend credentials. Set SUPABASE_URL and SUPABASE_ANON_KEY.".into(),
            ));
        }
        url::Url::parse(&self.supabase_url)
            .map_err(|e| AppError::Config(format!("Invalid backend URL: {}", e)))?;
        if self.search_limit == 0 {
            return Err(AppError::Config("search_limit must be >= 1".into()));
        }
        Ok(())
    }

    /// Volume the output device should use right now.
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume.clamp(0.0, 1.0)
        }
    }
}
