//! 判定結果の型定義
//!
//! CLI・バッチ処理・Web APIで共有される型:
//! - IngredientPhrase: 正規化済みの材料フレーズ（元テキストのバイト位置付き）
//! - Match: 1件の用語一致（解析1回の中だけで使われる）
//! - CategoryScore: カテゴリごとの確信度
//! - AnalysisResult: 最終出力

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// 照合戦略
///
/// 宣言順がそのまま優先順位（exact > synonym > hidden_source > scientific_name）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Exact,
    Synonym,
    HiddenSource,
    ScientificName,
}

impl MatchStrategy {
    /// 優先順位順の全戦略
    pub const ALL: [MatchStrategy; 4] = [
        MatchStrategy::Exact,
        MatchStrategy::Synonym,
        MatchStrategy::HiddenSource,
        MatchStrategy::ScientificName,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Synonym => "synonym",
            MatchStrategy::HiddenSource => "hidden_source",
            MatchStrategy::ScientificName => "scientific_name",
        }
    }

    /// 直接名指しの一致か（exact / synonym）
    pub fn is_direct(&self) -> bool {
        matches!(self, MatchStrategy::Exact | MatchStrategy::Synonym)
    }
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 総合リスクレベル（順序付き）
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// 1段階引き上げる（criticalで頭打ち）
    pub fn escalate(self) -> Self {
        match self {
            RiskLevel::None => RiskLevel::Low,
            RiskLevel::Low => RiskLevel::Medium,
            RiskLevel::Medium => RiskLevel::High,
            RiskLevel::High | RiskLevel::Critical => RiskLevel::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(RiskLevel::None),
            "low" => Ok(RiskLevel::Low),
            "medium" | "med" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(format!(
                "Unknown risk level: {}. Use none, low, medium, high, or critical",
                s
            )),
        }
    }
}

/// フレーズ内の1語
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseWord {
    /// 小文字化済みの語
    pub text: String,
    /// 元テキスト上の開始バイト位置
    pub start: usize,
    /// 元テキスト上の終了バイト位置（排他）
    pub end: usize,
    /// 否定表現（"no", "-free" など）の影響下にあるか
    pub negated: bool,
}

/// 正規化済みの材料フレーズ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientPhrase {
    /// フレーズ番号（入力内の出現順）
    pub index: usize,
    /// 正規化テキスト（語をスペース区切りで連結）
    pub text: String,
    /// 元テキスト上の開始バイト位置
    pub start: usize,
    /// 元テキスト上の終了バイト位置（排他）
    pub end: usize,
    pub words: Vec<PhraseWord>,
}

impl IngredientPhrase {
    /// 元テキストから該当部分を切り出す
    pub fn original<'a>(&self, input: &'a str) -> &'a str {
        input.get(self.start..self.end).unwrap_or("")
    }
}

/// 1件の用語一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub category_id: String,
    /// 知識ベース上の用語
    pub term: String,
    /// 元テキストから切り出した根拠文字列
    pub evidence: String,
    /// 元テキスト上の開始バイト位置
    pub start: usize,
    /// 元テキスト上の終了バイト位置（排他）
    pub end: usize,
    pub strategy: MatchStrategy,
    pub phrase_index: usize,
    /// 戦略の基本重み
    pub weight: f64,
}

/// カテゴリごとの確信度
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category_id: String,
    /// 確信度 [0, 1]
    pub confidence: f64,
    /// 寄与した一致（重みの降順）
    pub matches: Vec<Match>,
}

impl CategoryScore {
    /// 指定戦略の一致を含むか
    pub fn has_strategy(&self, strategy: MatchStrategy) -> bool {
        self.matches.iter().any(|m| m.strategy == strategy)
    }

    /// 一致に使われた戦略（重複なし・優先順位順）
    pub fn strategies(&self) -> BTreeSet<MatchStrategy> {
        self.matches.iter().map(|m| m.strategy).collect()
    }
}

/// アレルゲン解析結果
///
/// 等価比較と`to_canonical_json`は`processing_time`を無視する。
/// 同じ入力と同じ知識ベースからは常に同じ正規形が得られる。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub risk_level: RiskLevel,

    /// 重み付き重症度スコア（max(確信度 × 重症度)）
    #[serde(default)]
    pub severity_score: f64,

    /// 検出閾値以上のカテゴリID
    #[serde(default)]
    pub detected_allergens: BTreeSet<String>,

    /// 一致が1件以上あったカテゴリのスコア
    #[serde(default)]
    pub category_scores: BTreeMap<String, CategoryScore>,

    #[serde(default)]
    pub recommendations: Vec<String>,

    #[serde(default)]
    pub processing_time: Duration,

    #[serde(default)]
    pub knowledge_base_version: String,

    /// 解析できた材料フレーズ数
    #[serde(default)]
    pub phrase_count: usize,

    /// 材料を1つも解析できなかった（「アレルゲンなし」とは区別する）
    #[serde(default)]
    pub insufficient_input: bool,
}

impl AnalysisResult {
    /// カテゴリの確信度（一致なしは0.0）
    pub fn confidence(&self, category_id: &str) -> f64 {
        self.category_scores
            .get(category_id)
            .map(|s| s.confidence)
            .unwrap_or(0.0)
    }

    /// 検出カテゴリ中の最大確信度
    pub fn max_confidence(&self) -> f64 {
        self.detected_allergens
            .iter()
            .map(|id| self.confidence(id))
            .fold(0.0, f64::max)
    }

    pub fn is_detected(&self, category_id: &str) -> bool {
        self.detected_allergens.contains(category_id)
    }

    /// 処理時間を除いた正規形JSON
    pub fn to_canonical_json(&self) -> serde_json::Result<String> {
        let canonical = AnalysisResult {
            processing_time: Duration::ZERO,
            ..self.clone()
        };
        serde_json::to_string(&canonical)
    }

    /// 1行サマリー
    pub fn summary(&self) -> String {
        if self.insufficient_input {
            return format!("risk={} (insufficient input)", self.risk_level);
        }
        if self.detected_allergens.is_empty() {
            return format!("risk={} detected=none", self.risk_level);
        }
        let detected: Vec<String> = self
            .detected_allergens
            .iter()
            .map(|id| format!("{}({:.2})", id, self.confidence(id)))
            .collect();
        format!("risk={} detected={}", self.risk_level, detected.join(", "))
    }
}

impl PartialEq for AnalysisResult {
    fn eq(&self, other: &Self) -> bool {
        self.risk_level == other.risk_level
            && self.severity_score == other.severity_score
            && self.detected_allergens == other.detected_allergens
            && self.category_scores == other.category_scores
            && self.recommendations == other.recommendations
            && self.knowledge_base_version == other.knowledge_base_version
            && self.phrase_count == other.phrase_count
            && self.insufficient_input == other.insufficient_input
    }
}
