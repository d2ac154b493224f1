//! モデル推論機能

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder},
    tensor::{backend::Backend, Tensor},
};
use std::path::Path;

use crate::error::{ClassifierError, Result};
use crate::ml::ml_model::{expects_default_input, BreedNet};
use crate::ml::preprocess::InputTensor;
use crate::model::{load_model_bundle, ModelMetadata};
use crate::resolver::ScoreVector;

/// 学習済みモデルを重みのバイナリへ変換
pub fn record_model_bytes<B: Backend>(model: BreedNet<B>) -> Result<Vec<u8>> {
    NamedMpkBytesRecorder::<FullPrecisionSettings>::default()
        .record(model.into_record(), ())
        .map_err(|e| ClassifierError::ModelExport(format!("failed to record weights: {:?}", e)))
}

/// 推論エンジン
///
/// `load_model` が成功するまで `predict` は `NotInitialized` を返す。
#[derive(Debug, Clone)]
pub struct InferenceEngine<B: Backend> {
    model: Option<BreedNet<B>>,
    metadata: Option<ModelMetadata>,
    device: B::Device,
}

impl<B: Backend> InferenceEngine<B> {
    pub fn new(device: B::Device) -> Self {
        Self {
            model: None,
            metadata: None,
            device,
        }
    }

    /// モデルバンドルを読み込む
    pub fn load_model<P: AsRef<Path>>(&mut self, model_path: P) -> Result<()> {
        let model_path = model_path.as_ref();
        let (metadata, model_binary) = load_model_bundle(model_path)?;
        self.load_model_from_parts(metadata, model_binary)?;

        tracing::info!("[InferenceEngine] model loaded from {}", model_path.display());
        Ok(())
    }

    /// メタデータと重みバイナリからモデルを復元
    pub fn load_model_from_parts(
        &mut self,
        metadata: ModelMetadata,
        model_binary: Vec<u8>,
    ) -> Result<()> {
        let model_config = metadata.model_config();
        if !expects_default_input(&model_config) {
            return Err(ClassifierError::ModelLoad(format!(
                "model expects {}x{} input, preprocessing produces 224x224",
                metadata.input_size, metadata.input_size
            )));
        }
        if metadata.num_classes == 0 || metadata.base_channels == 0 {
            return Err(ClassifierError::ModelLoad(format!(
                "degenerate architecture: {} classes, {} base channels",
                metadata.num_classes, metadata.base_channels
            )));
        }

        let model = model_config.init::<B>(&self.device);
        let expected_shapes = model.parameter_shapes();

        // 壊れたバイト列はパニックではなくエラーとして返る
        let recorder = NamedMpkBytesRecorder::<FullPrecisionSettings>::default();
        let record = recorder
            .load(model_binary, &self.device)
            .map_err(|e| ClassifierError::ModelLoad(format!("invalid weights: {:?}", e)))?;
        let model = model.load_record(record);

        // load_record は形状を検証しないので、メタデータの構成と突き合わせる
        for ((layer, expected), (_, actual)) in
            expected_shapes.iter().zip(model.parameter_shapes().iter())
        {
            if expected != actual {
                return Err(ClassifierError::ModelLoad(format!(
                    "weights do not match metadata: {} has shape {:?}, expected {:?}",
                    layer, actual, expected
                )));
            }
        }

        tracing::debug!(
            "[InferenceEngine] {} ({} classes, exported {})",
            metadata.model_name,
            metadata.num_classes,
            metadata.exported_at
        );

        self.model = Some(model);
        self.metadata = Some(metadata);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.metadata.as_ref()
    }

    /// 1枚分の入力テンソルを推論し、クラスごとのスコアを返す
    pub fn predict(&self, input: &InputTensor) -> Result<ScoreVector> {
        let model = self.model.as_ref().ok_or(ClassifierError::NotInitialized)?;

        let tensor = Tensor::<B, 1>::from_floats(input.as_slice(), &self.device)
            .reshape(InputTensor::SHAPE);

        let output = model.forward_nhwc(tensor);

        let scores = output
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ClassifierError::Inference(format!("failed to read output tensor: {:?}", e)))?;

        Ok(ScoreVector::new(scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ml_model::ModelConfig;
    use crate::ml::preprocess::{preprocess, RawImage};
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray;

    fn small_config() -> ModelConfig {
        ModelConfig::new(4).with_base_channels(4)
    }

    fn sample_input() -> InputTensor {
        let pixels = RgbImage::from_fn(300, 200, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
        preprocess(&RawImage::from_rgb(pixels).unwrap())
    }

    #[test]
    fn test_predict_before_load() {
        let engine = InferenceEngine::<TestBackend>::new(Default::default());
        assert!(!engine.is_loaded());
        let err = engine.predict(&sample_input()).unwrap_err();
        assert!(matches!(err, ClassifierError::NotInitialized));
    }

    #[test]
    fn test_restored_weights_reproduce_scores() {
        let device = Default::default();
        let config = small_config();
        let model = config.init::<TestBackend>(&device);
        let input = sample_input();

        let expected = {
            let tensor = Tensor::<TestBackend, 1>::from_floats(input.as_slice(), &device)
                .reshape(InputTensor::SHAPE);
            model.forward_nhwc(tensor).into_data().to_vec::<f32>().unwrap()
        };

        let binary = record_model_bytes(model).unwrap();
        let mut engine = InferenceEngine::<TestBackend>::new(device);
        engine
            .load_model_from_parts(ModelMetadata::new("test", &config), binary)
            .unwrap();

        let scores = engine.predict(&input).unwrap();
        assert_eq!(scores.len(), 4);
        for (a, b) in scores.as_slice().iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
        assert_eq!(engine.metadata().unwrap().num_classes, 4);
    }

    #[test]
    fn test_garbage_weights() {
        let mut engine = InferenceEngine::<TestBackend>::new(Default::default());
        let err = engine
            .load_model_from_parts(ModelMetadata::new("test", &small_config()), b"garbage".to_vec())
            .unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad(_)));
        assert!(!engine.is_loaded());
    }

    #[test]
    fn test_truncated_weights() {
        let binary = record_model_bytes(small_config().init::<TestBackend>(&Default::default())).unwrap();
        let truncated = binary[..binary.len() / 2].to_vec();

        let mut engine = InferenceEngine::<TestBackend>::new(Default::default());
        let err = engine
            .load_model_from_parts(ModelMetadata::new("test", &small_config()), truncated)
            .unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad(_)));
        assert!(!engine.is_loaded());
    }

    #[test]
    fn test_weights_must_match_metadata() {
        let trained = ModelConfig::new(5).with_base_channels(4);
        let binary = record_model_bytes(trained.init::<TestBackend>(&Default::default())).unwrap();

        // クラス数が違う
        let mut engine = InferenceEngine::<TestBackend>::new(Default::default());
        let err = engine
            .load_model_from_parts(
                ModelMetadata::new("test", &ModelConfig::new(37).with_base_channels(4)),
                binary.clone(),
            )
            .unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad(ref msg) if msg.contains("fc2")));
        assert!(!engine.is_loaded());

        // チャネル数が違う
        let err = engine
            .load_model_from_parts(
                ModelMetadata::new("test", &ModelConfig::new(5).with_base_channels(8)),
                binary,
            )
            .unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad(ref msg) if msg.contains("conv1")));
        assert!(!engine.is_loaded());
    }

    #[test]
    fn test_wrong_input_size_rejected() {
        let mut engine = InferenceEngine::<TestBackend>::new(Default::default());
        let config = small_config().with_image_size(96);
        let err = engine
            .load_model_from_parts(ModelMetadata::new("test", &config), Vec::new())
            .unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad(_)));
    }

    #[test]
    fn test_missing_bundle() {
        let mut engine = InferenceEngine::<TestBackend>::new(Default::default());
        let path = std::env::temp_dir().join("whats_my_breed_no_model.tar.gz");
        let err = engine.load_model(path).unwrap_err();
        assert!(matches!(err, ClassifierError::ResourceMissing { .. }));
    }
}
