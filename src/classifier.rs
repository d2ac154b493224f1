//! 呼び出し側（UI層）向けの分類API
//!
//! モデルとラベルテーブルを所有するコンテキストオブジェクトです。
//! グローバル状態は持たず、UI層が1つ生成して保持します。

use burn::tensor::backend::Backend;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{ClassifierError, Result};
use crate::labels::{BlankLinePolicy, CatBreedSet, LabelTable};
use crate::ml::inference::InferenceEngine;
use crate::ml::preprocess::{decode_image, preprocess, RawImage};
use crate::model::{AppConfig, ModelMetadata};
use crate::resolver::{resolve, PredictionResult};

/// 分類対象の画像
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// エンコード済み画像のバイト列
    Bytes(Vec<u8>),
    /// 画像ファイルのパス
    Path(PathBuf),
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

/// 初期化済みの読み取り専用パイプライン（前処理 → 推論 → ラベル解決）
#[derive(Debug, Clone)]
pub struct Pipeline<B: Backend> {
    engine: InferenceEngine<B>,
    labels: Arc<LabelTable>,
    cat_breeds: Arc<CatBreedSet>,
}

impl<B: Backend> Pipeline<B> {
    pub fn classify_image(&self, image: &RawImage) -> Result<PredictionResult> {
        let input = preprocess(image);
        let scores = self.engine.predict(&input)?;
        resolve(&scores, &self.labels, &self.cat_breeds)
    }

    pub fn classify(&self, source: &ImageSource) -> Result<PredictionResult> {
        let image = match source {
            ImageSource::Bytes(bytes) => decode_image(bytes)?,
            ImageSource::Path(path) => RawImage::open(path)?,
        };
        self.classify_image(&image)
    }
}

/// 品種分類器
pub struct BreedClassifier<B: Backend> {
    model_path: PathBuf,
    labels_path: PathBuf,
    blank_lines: BlankLinePolicy,
    cat_breeds: Arc<CatBreedSet>,
    device: B::Device,
    pipeline: Option<Pipeline<B>>,
}

impl<B: Backend> BreedClassifier<B> {
    pub fn new(config: &AppConfig, device: B::Device) -> Self {
        Self {
            model_path: config.resources.model_path.clone(),
            labels_path: config.resources.labels_path.clone(),
            blank_lines: config.labels.blank_lines,
            cat_breeds: Arc::new(CatBreedSet::default()),
            device,
            pipeline: None,
        }
    }

    /// 猫品種セットを差し替える（initialize より前に呼ぶ）
    pub fn with_cat_breeds(mut self, cat_breeds: CatBreedSet) -> Self {
        self.cat_breeds = Arc::new(cat_breeds);
        self
    }

    /// ラベルとモデルを読み込む
    ///
    /// 2回目以降の呼び出しは何もしない。失敗した場合は未初期化のまま残り、
    /// 再度呼び出せる。
    pub fn initialize(&mut self) -> Result<()> {
        if self.pipeline.is_some() {
            tracing::debug!("[BreedClassifier] already initialized");
            return Ok(());
        }

        let labels = LabelTable::load(&self.labels_path, self.blank_lines)?;

        let mut engine = InferenceEngine::new(self.device.clone());
        engine.load_model(&self.model_path)?;

        if let Some(metadata) = engine.metadata() {
            warn_on_label_mismatch(metadata, &labels);
        }

        self.pipeline = Some(Pipeline {
            engine,
            labels: Arc::new(labels),
            cat_breeds: self.cat_breeds.clone(),
        });
        tracing::info!("[BreedClassifier] ready");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn labels(&self) -> Option<&LabelTable> {
        self.pipeline.as_ref().map(|p| p.labels.as_ref())
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.pipeline.as_ref().and_then(|p| p.engine.metadata())
    }

    fn pipeline(&self) -> Result<&Pipeline<B>> {
        self.pipeline.as_ref().ok_or(ClassifierError::NotInitialized)
    }

    /// 画像を1枚分類する（呼び出しスレッドで同期実行）
    pub fn classify(&self, source: &ImageSource) -> Result<PredictionResult> {
        let pipeline = self.pipeline()?;
        let result = pipeline.classify(source);
        log_outcome(&result);
        result
    }

    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<PredictionResult> {
        let pipeline = self.pipeline()?;
        let result = decode_image(bytes).and_then(|image| pipeline.classify_image(&image));
        log_outcome(&result);
        result
    }

    pub fn classify_path<P: Into<PathBuf>>(&self, path: P) -> Result<PredictionResult> {
        self.classify(&ImageSource::Path(path.into()))
    }

    /// デコード済みの画像をそのまま分類（一時ファイルを介さない）
    pub fn classify_image(&self, image: &RawImage) -> Result<PredictionResult> {
        let pipeline = self.pipeline()?;
        let result = pipeline.classify_image(image);
        log_outcome(&result);
        result
    }

    /// 別スレッドで分類する
    ///
    /// 呼び出し時点のパイプラインを複製してブロッキングプールで実行する。
    /// Future を破棄しても推論は止まらず、結果が捨てられるだけ。
    pub fn classify_async(
        &self,
        source: ImageSource,
    ) -> impl Future<Output = Result<PredictionResult>> + Send + 'static {
        let pipeline = self.pipeline().cloned();

        async move {
            let pipeline = pipeline?;
            let result = tokio::task::spawn_blocking(move || pipeline.classify(&source))
                .await
                .map_err(|e| ClassifierError::Inference(format!("classification task failed: {}", e)))?;
            log_outcome(&result);
            result
        }
    }
}

fn warn_on_label_mismatch(metadata: &ModelMetadata, labels: &LabelTable) {
    if metadata.num_classes != labels.len() {
        tracing::warn!(
            "[BreedClassifier] model has {} classes but {} labels were loaded; out-of-range predictions resolve to \"Unknown\"",
            metadata.num_classes,
            labels.len()
        );
    }
}

fn log_outcome(result: &Result<PredictionResult>) {
    match result {
        Ok(prediction) => tracing::info!(
            "[classify] {} ({}) score={:.4}",
            prediction.top_label,
            prediction.category,
            prediction.score
        ),
        Err(e) if e.is_recoverable() => tracing::warn!("[classify] rejected image: {}", e),
        Err(e) => tracing::error!("[classify] {}", e),
    }
}
