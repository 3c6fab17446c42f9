//! 確信度スコア
//!
//! カテゴリごとの一致を飽和型の式で1つの確信度にまとめる:
//! `confidence = 1 − Π(1 − weight)`（(フレーズ, 戦略) の組ごとに1回）。
//! 同じフレーズで同じ戦略が何度一致しても1回分としか数えない。
//! 値は構成上 [0, 1] に収まり、一致が増えても減らない。

use crate::types::{CategoryScore, Match, MatchStrategy};
use std::collections::{BTreeMap, BTreeSet};

/// 重みの列を飽和結合する
pub fn combine<I>(weights: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    1.0 - weights
        .into_iter()
        .map(|w| 1.0 - w.clamp(0.0, 1.0))
        .product::<f64>()
}

/// 1カテゴリ分の一致からスコアを計算
pub fn score_category(category_id: &str, matches: &[Match]) -> CategoryScore {
    let mut distinct: BTreeMap<(usize, MatchStrategy), f64> = BTreeMap::new();
    for m in matches {
        let weight = distinct.entry((m.phrase_index, m.strategy)).or_insert(0.0);
        *weight = weight.max(m.weight);
    }
    let confidence = combine(distinct.values().copied());

    let mut contributing = matches.to_vec();
    // 安定ソートなので同じ重みの中では元の順序（フレーズ順）を保つ
    contributing.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    CategoryScore {
        category_id: category_id.to_string(),
        confidence,
        matches: contributing,
    }
}

/// 全一致をカテゴリ別にまとめてスコア化（一致のないカテゴリは含まない）
pub fn score_all(matches: &[Match]) -> BTreeMap<String, CategoryScore> {
    let ids: BTreeSet<&str> = matches.iter().map(|m| m.category_id.as_str()).collect();
    ids.into_iter()
        .map(|id| {
            let own: Vec<Match> = matches
                .iter()
                .filter(|m| m.category_id == id)
                .cloned()
                .collect();
            (id.to_string(), score_category(id, &own))
        })
        .collect()
}
