//! モデルバンドルの永続化
//!
//! Tar.gz形式でモデルとメタデータを1ファイルに統合して保存・読み込みします。
//!
//! ファイル構成（tar.gz内部）:
//! - metadata.json   - メタデータ（クラス数、入力サイズなど）
//! - model.bin       - モデルの重み（burn バイナリレコード）

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tar::{Archive, Builder};

use crate::error::{ClassifierError, Result};
use crate::model::model_metadata::ModelMetadata;

const METADATA_ENTRY: &str = "metadata.json";
const MODEL_ENTRY: &str = "model.bin";

fn malformed(e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::ModelLoad(format!("malformed model bundle: {}", e))
}

/// メタデータと共にモデルをTar.gz形式で保存
pub fn save_model_bundle(
    output_path: &Path,
    metadata: &ModelMetadata,
    model_binary: &[u8],
) -> std::io::Result<()> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tar_gz_file = File::create(output_path)?;
    let encoder = GzEncoder::new(tar_gz_file, Compression::default());
    let mut tar_builder = Builder::new(encoder);

    let json_str = metadata
        .to_json_string()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    append_entry(&mut tar_builder, METADATA_ENTRY, json_str.as_bytes())?;
    append_entry(&mut tar_builder, MODEL_ENTRY, model_binary)?;

    // gzip のフッタまで書き切る
    tar_builder.into_inner()?.finish()?;

    tracing::info!(
        "[ModelStorage] saved {} ({} bytes of weights)",
        output_path.display(),
        model_binary.len()
    );
    Ok(())
}

fn append_entry<W: std::io::Write>(
    builder: &mut Builder<W>,
    name: &str,
    data: &[u8],
) -> std::io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_path(name)?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append(&header, data)
}

/// メタデータとモデルバイナリを共に読み込む
///
/// ファイルを開けない場合は `ResourceMissing`、アーカイブが壊れている・
/// 必要なエントリがない場合は `ModelLoad`。
pub fn load_model_bundle(tar_gz_path: &Path) -> Result<(ModelMetadata, Vec<u8>)> {
    let tar_gz_file = File::open(tar_gz_path)
        .map_err(|e| ClassifierError::resource_missing(tar_gz_path, e))?;
    read_model_bundle(tar_gz_file)
}

/// 任意のリーダーからバンドルを読み込む
pub fn read_model_bundle<R: Read>(reader: R) -> Result<(ModelMetadata, Vec<u8>)> {
    let decoder = GzDecoder::new(reader);
    let mut archive = Archive::new(decoder);

    let mut metadata_opt: Option<ModelMetadata> = None;
    let mut model_binary_opt: Option<Vec<u8>> = None;

    for entry in archive.entries().map_err(malformed)? {
        let mut entry = entry.map_err(malformed)?;
        let path = entry.path().map_err(malformed)?.into_owned();

        match path.to_str() {
            Some(METADATA_ENTRY) => {
                let mut json_str = String::new();
                entry.read_to_string(&mut json_str).map_err(malformed)?;
                metadata_opt = Some(ModelMetadata::from_json_string(&json_str)?);
            }
            Some(MODEL_ENTRY) => {
                let mut buffer = Vec::new();
                entry.read_to_end(&mut buffer).map_err(malformed)?;
                model_binary_opt = Some(buffer);
            }
            _ => {}
        }
    }

    match (metadata_opt, model_binary_opt) {
        (Some(metadata), Some(binary)) => Ok((metadata, binary)),
        (None, _) => Err(malformed("metadata.json not found in tar.gz archive")),
        (_, None) => Err(malformed("model.bin not found in tar.gz archive")),
    }
}

/// Tar.gzからモデルメタデータだけを読み込む
pub fn load_metadata(tar_gz_path: &Path) -> Result<ModelMetadata> {
    load_model_bundle(tar_gz_path).map(|(metadata, _)| metadata)
}

/// メタデータをコンソールに表示
pub fn print_metadata_info(metadata: &ModelMetadata) {
    println!("\n=== モデルメタデータ ===");
    println!("モデル名: {}", metadata.model_name);
    println!("クラス数: {}", metadata.num_classes);
    println!("入力サイズ: {}x{}", metadata.input_size, metadata.input_size);
    println!("ベースチャネル数: {}", metadata.base_channels);
    println!("エクスポート日時: {}", metadata.exported_at);
    println!("========================");
}
