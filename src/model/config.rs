//! アプリケーション設定管理モジュール
//!
//! 計算デバイスや同梱リソースのパスをJSON形式で保存・読み込みします。

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::labels::BlankLinePolicy;

/// 計算デバイスの種類
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DeviceType {
    /// NdArray (CPU) バックエンド
    #[default]
    Cpu,
    /// WGPU (GPU) バックエンド（`wgpu` feature が必要）
    Wgpu,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

/// 同梱リソースの場所
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSettings {
    /// モデルバンドル（tar.gz）のパス
    pub model_path: PathBuf,
    /// ラベルファイルのパス
    pub labels_path: PathBuf,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("resources/model.tar.gz"),
            labels_path: PathBuf::from("resources/labels.txt"),
        }
    }
}

/// ラベル読み込み設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelSettings {
    /// 空行を保持するか読み飛ばすか
    #[serde(default)]
    pub blank_lines: BlankLinePolicy,
}

/// アプリケーション設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 計算デバイスの種類
    #[serde(default)]
    pub device_type: DeviceType,
    /// リソース設定
    #[serde(default)]
    pub resources: ResourceSettings,
    /// ラベル設定
    #[serde(default)]
    pub labels: LabelSettings,
}

impl AppConfig {
    /// 設定ファイルのデフォルトパス
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    /// 設定を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// 設定を読み込む、存在しない場合はデフォルト設定を返す
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if path.exists() {
            match Self::load(path) {
                Ok(config) => {
                    tracing::info!("設定ファイルを読み込みました: {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "設定ファイルの読み込みに失敗しました ({}): {:#}。デフォルト設定を使用します",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::info!("設定ファイルが存在しません。デフォルト設定を使用します");
            Self::default()
        }
    }

    /// 設定を保存する
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// リソースパスを基準ディレクトリからの相対パスとして解決する
    pub fn with_resource_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        let root = root.as_ref();
        self.resources.model_path = root.join(&self.resources.model_path);
        self.resources.labels_path = root.join(&self.resources.labels_path);
        self
    }

    /// 設定情報を表示
    pub fn display(&self) {
        println!("=== アプリケーション設定 ===");
        println!("計算デバイス: {}", self.device_type);
        println!("モデルパス: {}", self.resources.model_path.display());
        println!("ラベルパス: {}", self.resources.labels_path.display());
        println!("空行の扱い: {:?}", self.labels.blank_lines);
        println!("========================\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.device_type, DeviceType::Cpu);
        assert_eq!(config.resources.labels_path, PathBuf::from("resources/labels.txt"));
        assert_eq!(config.labels.blank_lines, BlankLinePolicy::Keep);
    }

    #[test]
    fn test_serialize_deserialize() {
        let mut config = AppConfig::default();
        config.device_type = DeviceType::Wgpu;
        config.labels.blank_lines = BlankLinePolicy::Skip;

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: AppConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.device_type, DeviceType::Wgpu);
        assert_eq!(deserialized.labels.blank_lines, BlankLinePolicy::Skip);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"labels": {"blank_lines": "skip"}}"#).unwrap();
        assert_eq!(config.device_type, DeviceType::Cpu);
        assert_eq!(config.labels.blank_lines, BlankLinePolicy::Skip);
        assert_eq!(config.resources.model_path, PathBuf::from("resources/model.tar.gz"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("whats_my_breed_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let config = AppConfig::default().with_resource_root("/opt/pets");
        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.resources.model_path, PathBuf::from("/opt/pets/resources/model.tar.gz"));
    }

    #[test]
    fn test_load_or_default_on_broken_file() {
        let dir = std::env::temp_dir().join(format!("whats_my_breed_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let config = AppConfig::load_or_default(&path);
        assert_eq!(config.device_type, DeviceType::Cpu);
    }

    #[test]
    fn test_device_type_display() {
        assert_eq!(format!("{}", DeviceType::Wgpu), "WGPU (GPU)");
        assert_eq!(format!("{}", DeviceType::Cpu), "CPU (NdArray)");
    }
}
