//! ラベルテーブルと猫品種セット
//!
//! ラベルテーブルの i 番目はモデル出力の i 番目のニューロンに対応します。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{ClassifierError, Result};

/// 空行の扱い
///
/// 空行を捨てるとインデックスがずれるため、既定では保持する。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlankLinePolicy {
    #[default]
    Keep,
    Skip,
}

/// 品種名の順序付きリスト（読み込み後は不変）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// 改行区切りのラベルファイルを読み込む
    pub fn load<P: AsRef<Path>>(path: P, policy: BlankLinePolicy) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).map_err(|e| ClassifierError::resource_missing(path, e))?;
        let table = Self::from_reader(BufReader::new(file), policy)
            .map_err(|e| ClassifierError::resource_missing(path, e))?;

        tracing::info!(
            "[LabelTable] {} labels loaded from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// 各行の前後の空白を除去し、出現順にラベルとする
    pub fn from_reader<R: BufRead>(reader: R, policy: BlankLinePolicy) -> std::io::Result<Self> {
        let mut labels = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let label = line.trim();
            if label.is_empty() && policy == BlankLinePolicy::Skip {
                continue;
            }
            labels.push(label.to_string());
        }
        Ok(Self { labels })
    }

    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

/// Oxford-IIIT Pet データセットの猫品種
pub const CAT_BREEDS: [&str; 12] = [
    "abyssinian",
    "bengal",
    "birman",
    "bombay",
    "british_shorthair",
    "egyptian_mau",
    "maine_coon",
    "persian",
    "ragdoll",
    "russian_blue",
    "siamese",
    "sphynx",
];

/// 猫品種名の集合（小文字）
///
/// ここに含まれないラベルはすべて犬として扱う。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatBreedSet {
    breeds: HashSet<String>,
}

impl CatBreedSet {
    pub fn new<I, S>(breeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            breeds: breeds
                .into_iter()
                .map(|b| b.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// 小文字化したラベルで所属判定
    pub fn contains(&self, label: &str) -> bool {
        self.breeds.contains(&label.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.breeds.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.breeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breeds.is_empty()
    }
}

impl Default for CatBreedSet {
    /// アンダースコア表記とスペース表記の両方を登録
    fn default() -> Self {
        Self::new(
            CAT_BREEDS
                .iter()
                .flat_map(|b| [b.to_string(), b.replace('_', " ")]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_trims_and_keeps_order() {
        let text = "  abyssinian \nbeagle\r\n\tpug\n";
        let table = LabelTable::from_reader(Cursor::new(text), BlankLinePolicy::Keep).unwrap();
        let labels: Vec<&str> = table.iter().collect();
        assert_eq!(labels, vec!["abyssinian", "beagle", "pug"]);
    }

    #[test]
    fn test_blank_lines_kept_by_default() {
        let text = "abyssinian\n\n   \nbeagle\n";
        let table =
            LabelTable::from_reader(Cursor::new(text), BlankLinePolicy::default()).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(1), Some(""));
        assert_eq!(table.get(3), Some("beagle"));
    }

    #[test]
    fn test_blank_lines_skipped() {
        let text = "abyssinian\n\n   \nbeagle\n";
        let table = LabelTable::from_reader(Cursor::new(text), BlankLinePolicy::Skip).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1), Some("beagle"));
    }

    #[test]
    fn test_load_missing_file() {
        let path = std::env::temp_dir().join("whats_my_breed_no_such_labels.txt");
        let err = LabelTable::load(&path, BlankLinePolicy::Keep).unwrap_err();
        assert!(matches!(err, ClassifierError::ResourceMissing { .. }));
    }

    #[test]
    fn test_load_packaged_labels() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("resources/labels.txt");
        let table = LabelTable::load(path, BlankLinePolicy::Keep).unwrap();
        assert_eq!(table.len(), 37);
        assert_eq!(table.get(0), Some("Abyssinian"));
    }

    #[test]
    fn test_cat_set_is_case_insensitive() {
        let cats = CatBreedSet::default();
        assert!(cats.contains("Maine_Coon"));
        assert!(cats.contains("british shorthair"));
        assert!(!cats.contains("beagle"));
        assert!(!cats.contains("unknown"));
        assert_eq!(cats.len(), 16);
    }
}
