//! 解析パイプライン（結果の組み立て）
//!
//! 正規化 → 照合 → スコア → リスク集約 → 推奨文 を順に実行し、
//! 1入力につき1つの`AnalysisResult`を返す。入力起因の問題は
//! エラーにせず結果の形（`insufficient_input`）で表す。

use crate::knowledge::KnowledgeSnapshot;
use crate::normalizer::normalize;
use crate::recommend;
use crate::risk;
use crate::scorer;
use crate::types::AnalysisResult;
use std::time::Instant;

/// 材料テキストを解析
pub fn analyze(text: &str, snapshot: &KnowledgeSnapshot) -> AnalysisResult {
    let started = Instant::now();
    let kb = snapshot.knowledge_base();

    let phrases = normalize(text, snapshot.rules());
    let insufficient_input = phrases.is_empty();

    let matches = snapshot.index().find_matches(text, &phrases, kb);
    let category_scores = scorer::score_all(&matches);
    let assessment = risk::assess(&category_scores, kb);
    let recommendations =
        recommend::generate(&category_scores, &assessment, kb, insufficient_input);

    let result = AnalysisResult {
        risk_level: assessment.level,
        severity_score: assessment.severity_score,
        detected_allergens: assessment.detected,
        category_scores,
        recommendations,
        processing_time: started.elapsed(),
        knowledge_base_version: kb.version.clone(),
        phrase_count: phrases.len(),
        insufficient_input,
    };

    tracing::debug!(
        phrases = result.phrase_count,
        matches = matches.len(),
        risk = %result.risk_level,
        elapsed_us = result.processing_time.as_micros() as u64,
        "analysis finished"
    );

    result
}
