//! 確認用: 設定ファイルのリソースで分類器を初期化し、指定画像を分類して表示する簡易バイナリ
//!
//! Usage:
//!   breed_check [--config <config.json>] <image>...
//!   breed_check [--config <config.json>] --init-bundle <model.tar.gz>
//!
//! `--init-bundle` はラベル数に合わせたランダム重みのバンドルを書き出す（動作確認用）。

use anyhow::{bail, Context, Result};
use burn::tensor::backend::Backend;
use std::path::PathBuf;

use whats_my_breed_lib::labels::LabelTable;
use whats_my_breed_lib::ml::{record_model_bytes, ModelConfig};
use whats_my_breed_lib::model::{print_metadata_info, save_model_bundle, ModelMetadata};
use whats_my_breed_lib::{logging, AppConfig, BreedClassifier, CpuBackend, DeviceType};

struct Args {
    config_path: PathBuf,
    init_bundle: Option<PathBuf>,
    images: Vec<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        config_path: AppConfig::default_path(),
        init_bundle: None,
        images: Vec::new(),
    };

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                parsed.config_path = args.next().context("--config requires a path")?.into();
            }
            "--init-bundle" => {
                parsed.init_bundle = Some(args.next().context("--init-bundle requires a path")?.into());
            }
            _ => parsed.images.push(PathBuf::from(arg)),
        }
    }

    if parsed.init_bundle.is_none() && parsed.images.is_empty() {
        bail!("Usage: breed_check [--config <config.json>] (<image>... | --init-bundle <model.tar.gz>)");
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    logging::init_tracing()?;

    let args = parse_args()?;
    let config = AppConfig::load_or_default(&args.config_path);
    config.display();

    if let Some(output) = &args.init_bundle {
        return init_bundle(&config, output);
    }

    match config.device_type {
        DeviceType::Cpu => run::<CpuBackend>(&config, &args.images),
        #[cfg(feature = "wgpu")]
        DeviceType::Wgpu => run::<whats_my_breed_lib::GpuBackend>(&config, &args.images),
        #[cfg(not(feature = "wgpu"))]
        DeviceType::Wgpu => {
            tracing::warn!("wgpu feature is disabled, falling back to CPU");
            run::<CpuBackend>(&config, &args.images)
        }
    }
}

fn run<B: Backend>(config: &AppConfig, images: &[PathBuf]) -> Result<()> {
    let mut classifier = BreedClassifier::<B>::new(config, Default::default());
    classifier
        .initialize()
        .context("分類器の初期化に失敗しました")?;

    if let Some(metadata) = classifier.metadata() {
        print_metadata_info(metadata);
    }

    for image in images {
        match classifier.classify_path(image) {
            Ok(result) => println!(
                "✓ {}: {} [{}] (score {:.4})",
                image.display(),
                result.display_text(),
                result.category,
                result.score
            ),
            // 画像ごとのエラーは報告して次へ
            Err(e) if e.is_recoverable() => eprintln!("✗ {}: {}", image.display(), e),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn init_bundle(config: &AppConfig, output: &PathBuf) -> Result<()> {
    let labels = LabelTable::load(&config.resources.labels_path, config.labels.blank_lines)?;

    let model_config = ModelConfig::new(labels.len());
    let model = model_config.init::<CpuBackend>(&Default::default());
    let metadata = ModelMetadata::new("untrained", &model_config);

    save_model_bundle(output, &metadata, &record_model_bytes(model)?)
        .with_context(|| format!("Failed to write bundle: {}", output.display()))?;

    println!("ランダム重みのバンドルを書き出しました: {}", output.display());
    print_metadata_info(&metadata);
    Ok(())
}
