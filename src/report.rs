//! 解析結果の端末表示

use allergen_scan_common::{AnalysisResult, KnowledgeBase, RiskLevel};
use std::fmt::Write;

fn risk_marker(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::None => "✅",
        RiskLevel::Low => "🟢",
        RiskLevel::Medium => "🟡",
        RiskLevel::High => "🟠",
        RiskLevel::Critical => "🔴",
    }
}

/// 1件の解析結果をテキストに整形
pub fn render_text(result: &AnalysisResult, kb: &KnowledgeBase) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} リスク: {} (重症度スコア {:.2})",
        risk_marker(result.risk_level),
        result.risk_level,
        result.severity_score
    );
    let _ = writeln!(
        out,
        "  材料フレーズ: {}件 / 知識ベース: {}",
        result.phrase_count, result.knowledge_base_version
    );

    if !result.category_scores.is_empty() {
        let _ = writeln!(out, "\nカテゴリ別:");
        for (id, score) in &result.category_scores {
            let name = kb.category(id).map(|c| c.name.as_str()).unwrap_or(id);
            let mark = if result.is_detected(id) { "●" } else { "○" };
            let strategies: Vec<&str> = score.strategies().iter().map(|s| s.as_str()).collect();
            let _ = writeln!(
                out,
                "  {} {:<12} 確信度 {:.2}  [{}]",
                mark,
                name,
                score.confidence,
                strategies.join(", ")
            );
            for m in &score.matches {
                let _ = writeln!(out, "      - \"{}\" ({}, {})", m.evidence, m.strategy, m.term);
            }
        }
    }

    let _ = writeln!(out, "\n推奨:");
    for line in &result.recommendations {
        let _ = writeln!(out, "  - {}", line);
    }

    out
}
