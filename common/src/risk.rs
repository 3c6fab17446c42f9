//! 総合リスクの集約
//!
//! 重症度スコア = 検出カテゴリの max(確信度 × 重症度重み)。
//! 合計や平均ではなく最大値を使うので、確信度の高い重篤なアレルゲンが
//! 1つあれば他のカテゴリの数に関係なく結果を支配する。
//!
//! 複合ルール: 検出カテゴリのうち2つ以上が、確信度で中リスク境界
//! （`risk_thresholds.medium`）以上なら1段階引き上げる（criticalで頭打ち）。

use crate::knowledge::KnowledgeBase;
use crate::types::{CategoryScore, RiskLevel};
use std::collections::{BTreeMap, BTreeSet};

/// 集約結果
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub severity_score: f64,
    /// 複合ルールで引き上げられたか
    pub escalated: bool,
    pub detected: BTreeSet<String>,
}

/// 検出閾値以上のカテゴリ
pub fn detected_categories(
    scores: &BTreeMap<String, CategoryScore>,
    kb: &KnowledgeBase,
) -> BTreeSet<String> {
    scores
        .values()
        .filter(|s| s.confidence >= kb.detection_threshold(&s.category_id))
        .map(|s| s.category_id.clone())
        .collect()
}

/// スコア全体から総合リスクを決める
pub fn assess(scores: &BTreeMap<String, CategoryScore>, kb: &KnowledgeBase) -> RiskAssessment {
    let detected = detected_categories(scores, kb);

    let severity_score = detected
        .iter()
        .filter_map(|id| scores.get(id))
        .map(|s| s.confidence * kb.severity_weight(&s.category_id))
        .fold(0.0, f64::max);

    let base = kb.risk_thresholds.level_for(severity_score);

    let compounding = detected
        .iter()
        .filter_map(|id| scores.get(id))
        .filter(|s| s.confidence >= kb.risk_thresholds.medium)
        .count();
    let escalated = kb.compounding_escalation && compounding >= 2;

    let level = if escalated { base.escalate() } else { base };
    if escalated {
        tracing::debug!(from = %base, to = %level, categories = compounding, "compounding escalation");
    }

    RiskAssessment {
        level,
        severity_score,
        escalated: escalated && level != base,
        detected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::AllergenCategory;

    fn kb() -> KnowledgeBase {
        let mut a = AllergenCategory::new("a", "A", 1.0);
        a.canonical_terms.push("alpha".into());
        let mut b = AllergenCategory::new("b", "B", 1.0);
        b.canonical_terms.push("beta".into());
        let mut c = AllergenCategory::new("c", "C", 0.3);
        c.canonical_terms.push("gamma".into());
        c.detection_threshold = Some(0.9);
        KnowledgeBase {
            version: "test".into(),
            default_detection_threshold: 0.5,
            strategy_weights: Default::default(),
            risk_thresholds: Default::default(),
            compounding_escalation: true,
            honor_negation: false,
            strip_terms: Vec::new(),
            categories: vec![a, b, c],
        }
    }

    fn scores(values: &[(&str, f64)]) -> BTreeMap<String, CategoryScore> {
        values
            .iter()
            .map(|(id, c)| {
                (
                    id.to_string(),
                    CategoryScore {
                        category_id: id.to_string(),
                        confidence: *c,
                        matches: Vec::new(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_is_none() {
        let r = assess(&BTreeMap::new(), &kb());
        assert_eq!(r.level, RiskLevel::None);
        assert_eq!(r.severity_score, 0.0);
        assert!(r.detected.is_empty());
    }

    #[test]
    fn test_compounding_escalates_one_level() {
        let kb = kb();
        let single = assess(&scores(&[("a", 0.7)]), &kb);
        assert_eq!(single.level, RiskLevel::High);
        assert!(!single.escalated);

        let both = assess(&scores(&[("a", 0.7), ("b", 0.7)]), &kb);
        assert_eq!(both.level, RiskLevel::Critical);
        assert!(both.escalated);
    }

    #[test]
    fn test_compounding_can_be_disabled() {
        let mut kb = kb();
        kb.compounding_escalation = false;
        let r = assess(&scores(&[("a", 0.7), ("b", 0.7)]), &kb);
        assert_eq!(r.level, RiskLevel::High);
    }

    #[test]
    fn test_escalation_capped_at_critical() {
        let r = assess(&scores(&[("a", 1.0), ("b", 1.0)]), &kb());
        assert_eq!(r.level, RiskLevel::Critical);
        assert!(!r.escalated);
    }

    #[test]
    fn test_max_not_sum() {
        // 低い確信度が多数あっても最大値で決まる
        let r = assess(&scores(&[("a", 0.5), ("b", 0.5)]), &kb());
        assert_eq!(r.severity_score, 0.5);
        assert_eq!(r.level, RiskLevel::Medium);
    }

    #[test]
    fn test_below_category_threshold_not_detected() {
        let r = assess(&scores(&[("c", 0.85)]), &kb());
        assert!(r.detected.is_empty());
        assert_eq!(r.level, RiskLevel::None);
    }

    #[test]
    fn test_severity_weight_scales_score() {
        let r = assess(&scores(&[("c", 1.0)]), &kb());
        assert!(r.detected.contains("c"));
        assert!((r.severity_score - 0.3).abs() < 1e-12);
        assert_eq!(r.level, RiskLevel::Low);
    }
}
