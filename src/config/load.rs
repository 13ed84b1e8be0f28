use crate::config::types::{Config, UserSettings};
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// 預設設定檔位置（目前工作目錄）
pub const SETTINGS_FILE: &str = "settings.json";

impl Config {
    pub fn new() -> Result<Self> {
        Self::from_path(Path::new(SETTINGS_FILE))
    }

    /// 從指定檔案載入設定，檔案不存在時使用預設值
    pub fn from_path(path: &Path) -> Result<Self> {
        let settings = Self::load_settings(path)?;
        settings.validate()?;
        Ok(Self { settings })
    }

    fn load_settings(path: &Path) -> Result<UserSettings> {
        if !path.exists() {
            debug!("找不到設定檔 {}，使用預設值", path.display());
            return Ok(UserSettings::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))
    }
}
