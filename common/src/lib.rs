//! Allergen Scan Common Library
//!
//! CLIとバッチ処理で共有されるアレルゲン判定エンジン
//!
//! 材料テキスト → 正規化 → 多戦略照合 → 確信度 → 総合リスク → 推奨文。
//! 解析は知識ベースのスナップショットに対する純粋関数で、
//! 並列に呼び出してもロックは不要。

pub mod types;
pub mod error;
pub mod knowledge;
pub mod normalizer;
pub mod matcher;
pub mod scorer;
pub mod risk;
pub mod recommend;
pub mod analyzer;

pub use types::{
    AnalysisResult, CategoryScore, IngredientPhrase, Match, MatchStrategy, PhraseWord, RiskLevel,
};
pub use error::{Error, Result};
pub use knowledge::{
    AllergenCategory, CategoryPatch, KnowledgeBase, KnowledgeBaseStore, KnowledgeSnapshot,
    RiskThresholds, StrategyWeights,
};
pub use normalizer::{normalize, NormalizerRules};
pub use matcher::TermIndex;
pub use risk::RiskAssessment;
pub use analyzer::analyze;
