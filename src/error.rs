//! 分類パイプラインのエラー定義
//!
//! 起動時エラー（リソース欠落・モデル読み込み失敗）と
//! 画像ごとのエラー（デコード失敗・非対応フォーマット）を区別します。

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClassifierError>;

#[derive(Debug, Error)]
pub enum ClassifierError {
    /// 同梱リソース（モデル・ラベル）を開けない
    #[error("packaged resource missing: {}", path.display())]
    ResourceMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// モデルアーティファクトは存在するが解析できない
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("classifier used before initialize() completed")]
    NotInitialized,

    #[error("model returned an empty score vector")]
    EmptyScoreVector,

    /// バックエンドから出力を取り出せなかった、または推論タスクが異常終了した
    #[error("inference failed: {0}")]
    Inference(String),

    /// 重みをバイナリへ書き出せなかった
    #[error("failed to export model: {0}")]
    ModelExport(String),
}

impl ClassifierError {
    pub fn resource_missing(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ClassifierError::ResourceMissing {
            path: path.into(),
            source,
        }
    }

    /// 画像単位のエラーかどうか
    ///
    /// true の場合は別の画像で再試行できる。それ以外は設定・統合の誤りで、
    /// 起動時に致命的なものとして扱う。
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClassifierError::Decode(_) | ClassifierError::UnsupportedFormat(_)
        )
    }
}
