//! 品種分類モデルの定義
//!
//! 224x224 の RGB 画像を品種数のクラスに分類する CNN です。
//! 重みは同梱のモデルバンドルから復元します。

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Linear, LinearConfig, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::ml::preprocess::INPUT_SIZE;

/// モデル設定
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 分類クラス数（ラベル数）
    pub num_classes: usize,
    /// 最初の畳み込み層のチャネル数（以降 2 倍、4 倍）
    #[config(default = 16)]
    pub base_channels: usize,
    /// 入力画像サイズ（正方形）
    #[config(default = 224)]
    pub image_size: usize,
}

impl ModelConfig {
    /// モデルを初期化（重みはランダム）
    pub fn init<B: Backend>(&self, device: &B::Device) -> BreedNet<B> {
        let c1 = self.base_channels;
        let c2 = c1 * 2;
        let c3 = c1 * 4;

        tracing::debug!(
            "[Model] input {}x{}, channels 3 -> {} -> {} -> {}, classes {}",
            self.image_size,
            self.image_size,
            c1,
            c2,
            c3,
            self.num_classes
        );

        BreedNet {
            // 3x3, stride 2 (no padding): 224 -> 111 -> 55 -> 27
            conv1: Conv2dConfig::new([3, c1], [3, 3])
                .with_stride([2, 2])
                .init(device),
            conv2: Conv2dConfig::new([c1, c2], [3, 3])
                .with_stride([2, 2])
                .init(device),
            conv3: Conv2dConfig::new([c2, c3], [3, 3])
                .with_stride([2, 2])
                .init(device),
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc1: LinearConfig::new(c3, c2).init(device),
            fc2: LinearConfig::new(c2, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

/// 品種分類用 CNN
///
/// # アーキテクチャ
/// - {Conv 3x3 stride 2 + ReLU} x 3層
/// - Global Average Pooling
/// - FC: 4c -> 2c + ReLU
/// - FC: 2c -> num_classes（ロジットをそのまま返す）
#[derive(Module, Debug)]
pub struct BreedNet<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    pool: AdaptiveAvgPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    activation: Relu,
}

impl<B: Backend> BreedNet<B> {
    /// 順伝播
    ///
    /// - `images`: [batch_size, 3, size, size]
    /// - 戻り値: [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        let x = self.activation.forward(self.conv1.forward(images));
        let x = self.activation.forward(self.conv2.forward(x));
        let x = self.activation.forward(self.conv3.forward(x));

        let x = self.pool.forward(x);
        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);

        let x = self.activation.forward(self.fc1.forward(x));
        self.fc2.forward(x)
    }

    /// チャネル最後 [batch, size, size, 3] の入力を受け付ける
    pub fn forward_nhwc(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(images.permute([0, 3, 1, 2]))
    }

    /// 重みを持つ層の名前と重みテンソルの形状
    pub fn parameter_shapes(&self) -> Vec<(&'static str, Vec<usize>)> {
        vec![
            ("conv1", self.conv1.weight.val().dims().to_vec()),
            ("conv2", self.conv2.weight.val().dims().to_vec()),
            ("conv3", self.conv3.weight.val().dims().to_vec()),
            ("fc1", self.fc1.weight.val().dims().to_vec()),
            ("fc2", self.fc2.weight.val().dims().to_vec()),
        ]
    }
}

/// 前処理済みテンソルと同じ形状の入力を想定しているか
pub fn expects_default_input(config: &ModelConfig) -> bool {
    config.image_size == INPUT_SIZE as usize
}
