use crate::error::{ReconError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use warehouse_recon_common::ColumnKeywords;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub max_image_size: u32,
    pub timeout_seconds: u64,
    pub concurrency: usize,
    pub workspace_dir: PathBuf,
    /// 列キーワード設定JSON（省略時は組み込み）
    pub columns: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".into(),
            max_image_size: 1568,
            timeout_seconds: 60,
            concurrency: 4,
            workspace_dir: PathBuf::from("warehouse-session"),
            columns: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ReconError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("warehouse-recon").join("config.json"))
    }

    pub fn get_api_key(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.api_key.clone().ok_or(ReconError::MissingApiKey)
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    /// 列キーワード設定を読み込む
    pub fn column_keywords(&self) -> Result<ColumnKeywords> {
        match &self.columns {
            Some(path) => Ok(ColumnKeywords::from_file(path)?),
            None => Ok(ColumnKeywords::default()),
        }
    }
}
