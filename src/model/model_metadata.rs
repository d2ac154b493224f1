//! モデルメタデータの定義
//!
//! モデルバンドル（tar.gz）に metadata.json として格納され、
//! 重みを復元する前にネットワーク構成を決めるために使います。

use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};
use crate::ml::ml_model::ModelConfig;

/// モデルメタデータ
///
/// tar.gz形式で保存される情報：
/// - metadata.json: このメタデータ（JSON形式）
/// - model.bin: モデルの重み（バイナリ）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    /// モデル名（表示用）
    pub model_name: String,

    /// 出力クラス数。同梱のラベル数と一致している必要がある
    pub num_classes: usize,

    /// モデル入力サイズ（正方形、通常224）
    pub input_size: usize,

    /// 最初の畳み込み層のチャネル数
    pub base_channels: usize,

    /// エクスポート時刻（ISO8601形式）
    pub exported_at: String,
}

impl ModelMetadata {
    /// モデル設定からメタデータを作成
    pub fn new(model_name: impl Into<String>, config: &ModelConfig) -> Self {
        Self {
            model_name: model_name.into(),
            num_classes: config.num_classes,
            input_size: config.image_size,
            base_channels: config.base_channels,
            exported_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// 重みを復元するためのモデル設定
    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::new(self.num_classes)
            .with_base_channels(self.base_channels)
            .with_image_size(self.input_size)
    }

    /// メタデータをJSON文字列に変換
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ClassifierError::ModelLoad(format!("failed to serialize metadata: {}", e)))
    }

    /// JSON文字列からメタデータを生成
    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ClassifierError::ModelLoad(format!("invalid metadata.json: {}", e)))
    }
}
