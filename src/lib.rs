//! 犬猫の品種判定コア
//!
//! 写真を 224x224 の RGB テンソルに変換し、同梱の学習済みモデルで推論して
//! 品種名と猫/犬の区分を返します。画面・カメラ・権限まわりは呼び出し側の責務です。

pub mod error;
pub mod labels;
pub mod resolver;
pub mod logging;
pub mod model;
pub mod ml;
pub mod classifier;

pub use classifier::{BreedClassifier, ImageSource, Pipeline};
pub use error::{ClassifierError, Result};
pub use labels::{BlankLinePolicy, CatBreedSet, LabelTable};
pub use model::{AppConfig, DeviceType};
pub use resolver::{resolve, Category, PredictionResult, ScoreVector, UNKNOWN_LABEL};

/// CPU バックエンド
pub type CpuBackend = burn::backend::NdArray;

/// GPU バックエンド
#[cfg(feature = "wgpu")]
pub type GpuBackend = burn::backend::Wgpu;
