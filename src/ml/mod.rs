pub mod ml_model;
pub mod preprocess;
pub mod inference;

pub use ml_model::{BreedNet, ModelConfig};
pub use preprocess::{decode_image, preprocess, InputTensor, RawImage, INPUT_LEN, INPUT_SIZE};
pub use inference::{record_model_bytes, InferenceEngine};
