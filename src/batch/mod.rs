//! レシピのバッチ解析
//!
//! 1つのスナップショットを全ワーカーで共有し、rayonで並列に解析する。
//! 出力順は入力順と同じ。

pub mod cache;
mod types;

pub use cache::CacheFile;
pub use types::{RecipeAnalysisRecord, RecipeInput};

use crate::error::{AllergenScanError, Result};
use allergen_scan_common::{AnalysisResult, KnowledgeSnapshot};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;

/// キャッシュ利用状況
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// レシピJSON（配列）を読み込む
pub fn load_recipes(path: &Path) -> Result<Vec<RecipeInput>> {
    if !path.exists() {
        return Err(AllergenScanError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    let recipes: Vec<RecipeInput> = serde_json::from_str(&content)
        .map_err(|e| AllergenScanError::InvalidBatchInput(e.to_string()))?;

    for recipe in &recipes {
        if recipe.id.trim().is_empty() {
            return Err(AllergenScanError::InvalidBatchInput(
                "レシピIDが空です".into(),
            ));
        }
        if recipe.ingredient_text().is_none() {
            return Err(AllergenScanError::InvalidBatchInput(format!(
                "レシピ '{}' に ingredients / ingredients_text がありません",
                recipe.id
            )));
        }
    }
    Ok(recipes)
}

/// レシピをまとめて解析
pub fn analyze_recipes(
    recipes: &[RecipeInput],
    snapshot: &KnowledgeSnapshot,
    jobs: usize,
    show_progress: bool,
) -> Result<Vec<RecipeAnalysisRecord>> {
    let texts = ingredient_texts(recipes);
    let indices: Vec<usize> = (0..texts.len()).collect();
    let results = run_parallel(&texts, &indices, snapshot, jobs, show_progress)?;

    Ok(recipes
        .iter()
        .zip(results)
        .map(|(recipe, (_, analysis))| RecipeAnalysisRecord::new(recipe, analysis))
        .collect())
}

/// キャッシュを使ってレシピをまとめて解析
///
/// - キャッシュにある材料テキストはキャッシュから取得
/// - ないものだけ解析し、結果をキャッシュに追記して保存
pub fn analyze_recipes_with_cache(
    recipes: &[RecipeInput],
    snapshot: &KnowledgeSnapshot,
    cache_folder: &Path,
    jobs: usize,
    show_progress: bool,
) -> Result<(Vec<RecipeAnalysisRecord>, CacheStats)> {
    let texts = ingredient_texts(recipes);
    let mut cache = CacheFile::load(cache_folder);
    let fingerprint = cache::knowledge_base_fingerprint(snapshot.knowledge_base())?;
    let (cached, uncached) = cache::filter_cached_texts(&texts, &cache, &fingerprint);

    let stats = CacheStats {
        hits: cached.len(),
        misses: uncached.len(),
    };
    tracing::info!(hits = stats.hits, misses = stats.misses, "cache lookup");

    let indices: Vec<usize> = uncached.iter().map(|(i, _)| *i).collect();
    let fresh = run_parallel(&texts, &indices, snapshot, jobs, show_progress)?;

    let mut slots: Vec<Option<AnalysisResult>> = vec![None; recipes.len()];
    for (index, result) in cached {
        slots[index] = Some(result);
    }
    for ((index, hash), (_, result)) in uncached.into_iter().zip(fresh) {
        cache.insert(hash, recipes[index].id.clone(), result.clone());
        slots[index] = Some(result);
    }

    if stats.misses > 0 {
        cache.save(cache_folder)?;
    }

    let records = recipes
        .iter()
        .zip(slots)
        .map(|(recipe, slot)| {
            RecipeAnalysisRecord::new(recipe, slot.unwrap_or_else(|| snapshot.analyze("")))
        })
        .collect();
    Ok((records, stats))
}

fn ingredient_texts(recipes: &[RecipeInput]) -> Vec<String> {
    recipes
        .iter()
        .map(|r| r.ingredient_text().unwrap_or_default())
        .collect()
}

/// 指定インデックスの材料テキストを並列解析（インデックス順で返す）
fn run_parallel(
    texts: &[String],
    indices: &[usize],
    snapshot: &KnowledgeSnapshot,
    jobs: usize,
    show_progress: bool,
) -> Result<Vec<(usize, AnalysisResult)>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| AllergenScanError::Config(format!("ワーカープール作成失敗: {}", e)))?;

    let progress = if show_progress {
        let bar = ProgressBar::new(indices.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let results = pool.install(|| {
        indices
            .par_iter()
            .map(|&index| {
                let result = snapshot.analyze(&texts[index]);
                progress.inc(1);
                (index, result)
            })
            .collect::<Vec<_>>()
    });

    progress.finish_and_clear();
    Ok(results)
}
