//! スコアベクトルからラベルと猫/犬カテゴリを決定

use serde::Serialize;
use std::fmt;

use crate::error::{ClassifierError, Result};
use crate::labels::{CatBreedSet, LabelTable};

/// モデルとラベルの数が合わない場合のラベル
pub const UNKNOWN_LABEL: &str = "Unknown";

/// 1回の推論で得られるクラスごとのスコア（正規化は仮定しない）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreVector(Vec<f32>);

impl ScoreVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    /// 最大スコアのインデックス
    ///
    /// 同点の場合は小さいインデックスが勝つ。NaN は選ばれない
    /// （すべて NaN のときは 0）。空なら None。
    pub fn argmax(&self) -> Option<usize> {
        if self.0.is_empty() {
            return None;
        }
        let mut best: Option<(usize, f32)> = None;
        for (index, &score) in self.0.iter().enumerate() {
            if score.is_nan() {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((index, score)),
            }
        }
        Some(best.map_or(0, |(index, _)| index))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

impl From<Vec<f32>> for ScoreVector {
    fn from(scores: Vec<f32>) -> Self {
        Self(scores)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    Cat,
    Dog,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Cat => write!(f, "Cat"),
            Category::Dog => write!(f, "Dog"),
        }
    }
}

/// 1枚の画像に対する予測結果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub top_label: String,
    pub category: Category,
    pub top_index: usize,
    pub score: f32,
}

impl PredictionResult {
    /// 画面表示用の文字列
    pub fn display_text(&self) -> String {
        format!("My Breed: {}", self.top_label)
    }
}

/// 猫品種セットに含まれていれば Cat、それ以外はすべて Dog
///
/// 「犬でも猫でもない」という判定は存在しない。
pub fn categorize(label: &str, cat_breeds: &CatBreedSet) -> Category {
    if cat_breeds.contains(label) {
        Category::Cat
    } else {
        Category::Dog
    }
}

pub fn resolve(
    scores: &ScoreVector,
    labels: &LabelTable,
    cat_breeds: &CatBreedSet,
) -> Result<PredictionResult> {
    let top_index = scores.argmax().ok_or(ClassifierError::EmptyScoreVector)?;

    let top_label = match labels.get(top_index) {
        Some(label) => label.to_string(),
        None => {
            tracing::warn!(
                "[resolve] index {} is out of range for {} labels",
                top_index,
                labels.len()
            );
            UNKNOWN_LABEL.to_string()
        }
    };
    let category = categorize(&top_label, cat_breeds);

    Ok(PredictionResult {
        top_label,
        category,
        top_index,
        score: scores.as_slice()[top_index],
    })
}
