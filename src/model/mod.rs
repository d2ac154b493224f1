pub mod model_metadata;
pub mod model_storage;
pub mod config;

pub use model_metadata::ModelMetadata;
pub use model_storage::{save_model_bundle, load_model_bundle, read_model_bundle, load_metadata, print_metadata_info};
pub use config::{AppConfig, DeviceType, LabelSettings, ResourceSettings};
