//! 入力画像の前処理
//!
//! 任意サイズの画像を 224x224 にリサイズし、R,G,B をそれぞれ 255 で割った
//! f32 を行優先・チャネルインターリーブで並べます。

use image::error::{ImageFormatHint, UnsupportedErrorKind};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, RgbImage};
use std::path::Path;

use crate::error::{ClassifierError, Result};

/// モデル入力の一辺
pub const INPUT_SIZE: u32 = 224;

/// 入力チャネル数（RGB）
pub const INPUT_CHANNELS: usize = 3;

/// 入力テンソルの要素数
pub const INPUT_LEN: usize = (INPUT_SIZE as usize) * (INPUT_SIZE as usize) * INPUT_CHANNELS;

/// リサンプリングフィルタ（バイリニア）
///
/// 実装間で予測を再現できるよう固定。
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// デコード済みの 8bit RGB 画像
#[derive(Debug, Clone)]
pub struct RawImage {
    pixels: RgbImage,
}

impl RawImage {
    /// メモリ上の画像を RGB に変換して取り込む（アルファは破棄）
    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ClassifierError::UnsupportedFormat(format!(
                "empty bitmap ({}x{})",
                image.width(),
                image.height()
            )));
        }
        let pixels = match image {
            DynamicImage::ImageRgb8(rgb) => rgb,
            other => other.to_rgb8(),
        };
        Ok(Self { pixels })
    }

    pub fn from_rgb(pixels: RgbImage) -> Result<Self> {
        Self::from_dynamic(DynamicImage::ImageRgb8(pixels))
    }

    /// 画像ファイルを読み込む
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| ClassifierError::Decode(format!("{}: {}", path.display(), e)))?;
        decode_image(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.pixels
    }
}

/// バイト列を画像としてデコード
pub fn decode_image(bytes: &[u8]) -> Result<RawImage> {
    let image = image::load_from_memory(bytes).map_err(classify_image_error)?;
    tracing::debug!(
        "[preprocess] decoded {}x{} {:?}",
        image.width(),
        image.height(),
        image.color()
    );
    RawImage::from_dynamic(image)
}

/// 形式が判別できないものはデコードエラー、判別できたが扱えないものは非対応
fn classify_image_error(err: ImageError) -> ClassifierError {
    match err {
        ImageError::Unsupported(ref unsupported) => match unsupported.kind() {
            UnsupportedErrorKind::Format(ImageFormatHint::Unknown) => {
                ClassifierError::Decode(err.to_string())
            }
            _ => ClassifierError::UnsupportedFormat(err.to_string()),
        },
        other => ClassifierError::Decode(other.to_string()),
    }
}

/// モデル入力 `[1, 224, 224, 3]`（NHWC, f32, 0.0〜1.0）
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
}

impl InputTensor {
    pub const SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS];

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// ネイティブバイトオーダーの f32 バッファ
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        self.data.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }
}

/// 224x224 にリサイズ（アスペクト比は保持しない）して正規化
pub fn preprocess(image: &RawImage) -> InputTensor {
    let resized = imageops::resize(image.as_rgb(), INPUT_SIZE, INPUT_SIZE, RESIZE_FILTER);

    let mut data = Vec::with_capacity(INPUT_LEN);
    for pixel in resized.pixels() {
        let [r, g, b] = pixel.0;
        data.push(r as f32 / 255.0);
        data.push(g as f32 / 255.0);
        data.push(b as f32 / 255.0);
    }

    InputTensor { data }
}
