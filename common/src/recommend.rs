//! 推奨文の生成
//!
//! 一致の戦略構成からテンプレートで文を組み立てる（自由生成はしない）。
//! 同じスコアからは常に同じ文字列列が得られる。

use crate::knowledge::KnowledgeBase;
use crate::risk::RiskAssessment;
use crate::types::{CategoryScore, MatchStrategy, RiskLevel};
use std::collections::BTreeMap;

/// 入力不足時の文言
pub const INSUFFICIENT_INPUT: &str =
    "Insufficient information: no ingredients could be read from the input, so this is not a clean result. Provide the full ingredient list.";

/// 交差汚染の注意
pub const CROSS_CONTAMINATION: &str =
    "Check for cross-contamination warnings on packaging (\"may contain\", \"made in a facility that\").";

/// 推奨文を生成
pub fn generate(
    scores: &BTreeMap<String, CategoryScore>,
    assessment: &RiskAssessment,
    kb: &KnowledgeBase,
    insufficient_input: bool,
) -> Vec<String> {
    if insufficient_input {
        return vec![INSUFFICIENT_INPUT.to_string()];
    }

    let mut lines = Vec::new();

    if assessment.detected.is_empty() {
        lines.push(format!(
            "No known allergens detected (knowledge base {}). Always verify product labels.",
            kb.version
        ));
    } else {
        lines.push(format!("Overall allergen risk: {}.", assessment.level));

        let mut detected: Vec<&CategoryScore> = assessment
            .detected
            .iter()
            .filter_map(|id| scores.get(id))
            .collect();
        detected.sort_by(|a, b| {
            let sa = a.confidence * kb.severity_weight(&a.category_id);
            let sb = b.confidence * kb.severity_weight(&b.category_id);
            sb.total_cmp(&sa).then_with(|| a.category_id.cmp(&b.category_id))
        });

        // 直接の一致がなく隠れ原料だけのカテゴリがあるか
        let hidden_only = detected.iter().any(|s| {
            s.has_strategy(MatchStrategy::HiddenSource)
                && !s.matches.iter().any(|m| m.strategy.is_direct())
        });
        for score in detected {
            category_lines(score, kb, &mut lines);
        }

        if assessment.escalated {
            let names: Vec<String> = assessment
                .detected
                .iter()
                .filter(|id| {
                    scores
                        .get(*id)
                        .is_some_and(|s| s.confidence >= kb.risk_thresholds.medium)
                })
                .map(|id| display_name(kb, id))
                .collect();
            lines.push(format!(
                "Multiple allergens present together ({}); risk raised to {}.",
                names.join(", "),
                assessment.level
            ));
        }

        if assessment.level >= RiskLevel::High || hidden_only {
            lines.push(CROSS_CONTAMINATION.to_string());
        }
    }

    // 閾値未満の一致も黙って捨てない
    for score in scores.values() {
        if assessment.detected.contains(&score.category_id) {
            continue;
        }
        lines.push(format!(
            "Possible {} ({}) below the detection threshold; check the label if sensitive.",
            display_name(kb, &score.category_id),
            evidence(score, |_| true)
        ));
    }

    lines
}

fn category_lines(score: &CategoryScore, kb: &KnowledgeBase, lines: &mut Vec<String>) {
    let name = display_name(kb, &score.category_id);
    let direct = score.matches.iter().any(|m| m.strategy.is_direct());
    let scientific = score.has_strategy(MatchStrategy::ScientificName);
    let hidden = score.has_strategy(MatchStrategy::HiddenSource);

    if direct {
        lines.push(format!(
            "Contains {} ({}): avoid if allergic to {}.",
            name,
            evidence(score, MatchStrategy::is_direct),
            name.to_lowercase()
        ));
        if scientific {
            lines.push(format!(
                "Scientific-name alert: {} is another name for {}.",
                evidence(score, |s| *s == MatchStrategy::ScientificName),
                name
            ));
        }
        return;
    }

    if scientific {
        lines.push(format!(
            "Unfamiliar ingredient name: {} is a scientific name for {}; treat it as {} if allergic.",
            evidence(score, |s| *s == MatchStrategy::ScientificName),
            name,
            name.to_lowercase()
        ));
    }
    if hidden {
        lines.push(format!(
            "May contain {} via {}; verify with manufacturer.",
            name,
            evidence(score, |s| *s == MatchStrategy::HiddenSource)
        ));
    }
}

fn display_name(kb: &KnowledgeBase, id: &str) -> String {
    kb.category(id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| id.to_string())
}

/// 根拠文字列を重複なしで引用形式に連結
fn evidence<F>(score: &CategoryScore, filter: F) -> String
where
    F: Fn(&MatchStrategy) -> bool,
{
    let mut seen: Vec<String> = Vec::new();
    for m in score.matches.iter().filter(|m| filter(&m.strategy)) {
        let key = m.evidence.to_lowercase();
        if !seen.iter().any(|s| s.to_lowercase() == key) {
            seen.push(m.evidence.clone());
        }
    }
    seen.iter()
        .map(|e| format!("\"{}\"", e))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::assess;
    use crate::types::Match;

    fn kb() -> KnowledgeBase {
        KnowledgeBase::builtin().unwrap()
    }

    fn score(id: &str, parts: &[(MatchStrategy, &str, f64)]) -> CategoryScore {
        let matches: Vec<Match> = parts
            .iter()
            .enumerate()
            .map(|(i, (strategy, evidence, weight))| Match {
                category_id: id.to_string(),
                term: evidence.to_lowercase(),
                evidence: evidence.to_string(),
                start: 0,
                end: evidence.len(),
                strategy: *strategy,
                phrase_index: i,
                weight: *weight,
            })
            .collect();
        crate::scorer::score_category(id, &matches)
    }

    fn run(scores: Vec<CategoryScore>) -> Vec<String> {
        let kb = kb();
        let map: BTreeMap<String, CategoryScore> = scores
            .into_iter()
            .map(|s| (s.category_id.clone(), s))
            .collect();
        let assessment = assess(&map, &kb);
        generate(&map, &assessment, &kb, false)
    }

    #[test]
    fn test_insufficient_input() {
        let kb = kb();
        let assessment = assess(&BTreeMap::new(), &kb);
        let lines = generate(&BTreeMap::new(), &assessment, &kb, true);
        assert_eq!(lines, vec![INSUFFICIENT_INPUT.to_string()]);
    }

    #[test]
    fn test_clean_result_is_distinct_from_insufficient() {
        let lines = run(Vec::new());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("No known allergens"));
    }

    #[test]
    fn test_direct_match_avoidance() {
        let lines = run(vec![score("milk", &[(MatchStrategy::Exact, "Milk", 1.0)])]);
        assert!(lines[0].starts_with("Overall allergen risk"));
        assert!(lines.iter().any(|l| l == "Contains Milk (\"Milk\"): avoid if allergic to milk."));
    }

    #[test]
    fn test_hidden_only_verify_with_manufacturer() {
        let lines = run(vec![score("soy", &[(MatchStrategy::HiddenSource, "lecithin", 0.5)])]);
        assert!(lines.iter().any(|l| l.contains("verify with manufacturer")));
        assert!(!lines.iter().any(|l| l.starts_with("Contains")));
    }

    #[test]
    fn test_scientific_only_unfamiliar_name() {
        let lines = run(vec![score(
            "peanuts",
            &[(MatchStrategy::ScientificName, "Arachis hypogaea", 0.8)],
        )]);
        assert!(lines.iter().any(|l| l.starts_with("Unfamiliar ingredient name")));
    }

    #[test]
    fn test_scientific_alert_alongside_direct() {
        let lines = run(vec![score(
            "milk",
            &[
                (MatchStrategy::Exact, "butter", 1.0),
                (MatchStrategy::ScientificName, "lactoglobulin", 0.8),
            ],
        )]);
        assert!(lines.iter().any(|l| l.starts_with("Scientific-name alert")));
    }

    #[test]
    fn test_below_threshold_mentioned_as_possible() {
        // sulfites の閾値は 0.6
        let lines = run(vec![score("sulfites", &[(MatchStrategy::HiddenSource, "wine", 0.5)])]);
        assert!(lines[0].starts_with("No known allergens"));
        assert!(lines.iter().any(|l| l.starts_with("Possible Sulfites")));
    }

    #[test]
    fn test_compounding_line() {
        let lines = run(vec![
            score("sesame", &[(MatchStrategy::Synonym, "tahini", 0.85)]),
            score("mustard", &[(MatchStrategy::Synonym, "dijon", 0.85)]),
        ]);
        assert!(lines.iter().any(|l| l.starts_with("Multiple allergens present together")));
    }

    #[test]
    fn test_cross_contamination_at_high_risk() {
        let lines = run(vec![score("peanuts", &[(MatchStrategy::Exact, "peanuts", 1.0)])]);
        assert_eq!(lines.iter().filter(|l| *l == CROSS_CONTAMINATION).count(), 1);
    }

    #[test]
    fn test_cross_contamination_for_hidden_only() {
        let lines = run(vec![score("soy", &[(MatchStrategy::HiddenSource, "lecithin", 0.5)])]);
        assert!(lines.contains(&CROSS_CONTAMINATION.to_string()));
    }

    #[test]
    fn test_no_cross_contamination_for_low_direct_risk() {
        // celery 直接一致だけなら high 未満
        let lines = run(vec![score("celery", &[(MatchStrategy::Exact, "celery", 1.0)])]);
        assert!(!lines.contains(&CROSS_CONTAMINATION.to_string()));
    }

    #[test]
    fn test_categories_ordered_by_weighted_severity() {
        let lines = run(vec![
            score("celery", &[(MatchStrategy::Exact, "celery", 1.0)]),
            score("peanuts", &[(MatchStrategy::Exact, "peanuts", 1.0)]),
        ]);
        let peanut = lines.iter().position(|l| l.contains("Peanuts")).unwrap();
        let celery = lines.iter().position(|l| l.contains("Celery")).unwrap();
        assert!(peanut < celery);
    }
}
