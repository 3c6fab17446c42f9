//! 解析結果キャッシュモジュール
//!
//! 知識ベースの内容フィンガープリントと材料テキストのSHA-256をキーにして
//! 解析結果をキャッシュし、同じ材料テキストの再解析をスキップする。
//! 知識ベースの中身が変わればバージョン文字列が同じでもキーが変わる。

use crate::error::Result;
use allergen_scan_common::{AnalysisResult, KnowledgeBase};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

const CACHE_FILE_NAME: &str = ".allergen-cache.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// テキストハッシュ → 解析結果のマップ
    entries: HashMap<String, CacheEntry>,
}

/// キャッシュエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 最初に解析したレシピID
    pub recipe_id: String,
    /// 解析結果
    pub result: AnalysisResult,
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;

    pub fn cache_path(folder: &Path) -> PathBuf {
        folder.join(CACHE_FILE_NAME)
    }

    /// キャッシュファイルを読み込み
    ///
    /// 存在しない・壊れている・バージョン違いの場合は空のキャッシュを返す。
    pub fn load(folder: &Path) -> Self {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Self::default();
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(_) => return Self::default(),
        };

        let reader = BufReader::new(file);
        match serde_json::from_reader::<_, CacheFile>(reader) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(cache) => {
                tracing::warn!(found = cache.version, "キャッシュバージョン不一致、再生成します");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "キャッシュを読み込めません、再生成します");
                Self::default()
            }
        }
    }

    /// キャッシュファイルを保存
    pub fn save(&self, folder: &Path) -> Result<()> {
        let file = File::create(Self::cache_path(folder))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// キャッシュファイルを削除（存在した場合true）
    pub fn clear(folder: &Path) -> Result<bool> {
        let cache_path = Self::cache_path(folder);
        if cache_path.exists() {
            std::fs::remove_file(cache_path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// キャッシュをルックアップ
    pub fn get(&self, hash: &str) -> Option<&AnalysisResult> {
        self.entries.get(hash).map(|e| &e.result)
    }

    /// キャッシュに追加
    pub fn insert(&mut self, hash: String, recipe_id: String, result: AnalysisResult) {
        self.entries.insert(hash, CacheEntry { recipe_id, result });
    }

    /// キャッシュ件数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// 知識ベース全体のフィンガープリント（シリアライズ結果のSHA-256）
///
/// 用語・重み・閾値のどれが変わっても値が変わる。
pub fn knowledge_base_fingerprint(kb: &KnowledgeBase) -> Result<String> {
    let bytes = serde_json::to_vec(kb)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// キャッシュキー（知識ベースのフィンガープリント + 材料テキストのSHA-256）
pub fn compute_text_hash(knowledge_base_key: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(knowledge_base_key.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// キャッシュ済みと未解析のレシピを振り分ける
///
/// どちらも入力順のインデックス付きで返す。未解析側にはキャッシュキーを添える。
pub fn filter_cached_texts(
    texts: &[String],
    cache: &CacheFile,
    knowledge_base_key: &str,
) -> (Vec<(usize, AnalysisResult)>, Vec<(usize, String)>) {
    let mut cached_results = Vec::new();
    let mut uncached = Vec::new();

    for (index, text) in texts.iter().enumerate() {
        let hash = compute_text_hash(knowledge_base_key, text);
        if let Some(result) = cache.get(&hash) {
            cached_results.push((index, result.clone()));
        } else {
            uncached.push((index, hash));
        }
    }

    (cached_results, uncached)
}
