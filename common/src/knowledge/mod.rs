//! アレルゲン知識ベース
//!
//! カテゴリごとの正規名・同義語・隠れ原料・学名と、判定に使う
//! 重み・閾値をまとめたバージョン付きカタログ。
//!
//! 解析中は読み取り専用。更新はキュレーション側でコピーを編集し、
//! [`KnowledgeBaseStore`] でスナップショットごと差し替える。

mod category;
mod snapshot;

pub use category::{AllergenCategory, CategoryPatch};
pub use snapshot::{KnowledgeBaseStore, KnowledgeSnapshot};

use crate::error::{Error, Result};
use crate::types::{MatchStrategy, RiskLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// 組み込み知識ベース（コンパイル時に埋め込み）
const BUILTIN_KNOWLEDGE_BASE: &str = include_str!("../../data/knowledge_base.json");

/// 戦略ごとの基本重み
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyWeights {
    pub exact: f64,
    pub synonym: f64,
    pub scientific_name: f64,
    pub hidden_source: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            exact: 1.0,
            synonym: 0.85,
            scientific_name: 0.8,
            hidden_source: 0.5,
        }
    }
}

impl StrategyWeights {
    pub fn weight(&self, strategy: MatchStrategy) -> f64 {
        match strategy {
            MatchStrategy::Exact => self.exact,
            MatchStrategy::Synonym => self.synonym,
            MatchStrategy::ScientificName => self.scientific_name,
            MatchStrategy::HiddenSource => self.hidden_source,
        }
    }
}

/// 重症度スコア→リスクレベルの境界
///
/// 各値はそのレベルの上限（排他）。`high`以上はcritical。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub none: f64,
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            none: 0.2,
            low: 0.4,
            medium: 0.65,
            high: 0.85,
        }
    }
}

impl RiskThresholds {
    pub fn level_for(&self, severity_score: f64) -> RiskLevel {
        if severity_score < self.none {
            RiskLevel::None
        } else if severity_score < self.low {
            RiskLevel::Low
        } else if severity_score < self.medium {
            RiskLevel::Medium
        } else if severity_score < self.high {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }
}

fn default_detection_threshold() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}

/// 知識ベース全体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    /// バージョン（結果に記録される）
    pub version: String,

    /// 個別指定のないカテゴリの検出閾値
    #[serde(default = "default_detection_threshold")]
    pub default_detection_threshold: f64,

    #[serde(default)]
    pub strategy_weights: StrategyWeights,

    #[serde(default)]
    pub risk_thresholds: RiskThresholds,

    /// 2カテゴリ以上が中リスク境界を超えたら1段階引き上げる
    #[serde(default = "default_true")]
    pub compounding_escalation: bool,

    /// "no milk" や "dairy-free" の一致を除外する
    #[serde(default)]
    pub honor_negation: bool,

    /// 正規化で取り除く単位・分量語
    #[serde(default)]
    pub strip_terms: Vec<String>,

    pub categories: Vec<AllergenCategory>,
}

impl KnowledgeBase {
    /// 組み込みの知識ベースを読み込む
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_KNOWLEDGE_BASE)
    }

    /// JSONファイルから読み込み
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::Config(format!(
                "knowledge base not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read knowledge base {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// JSON文字列から読み込み（検証込み）
    pub fn from_json(json: &str) -> Result<Self> {
        let kb: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("knowledge base is not valid JSON: {}", e)))?;
        kb.validate()?;
        Ok(kb)
    }

    /// JSONファイルへ書き出し
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// 整合性チェック
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(Error::Config("knowledge base version is empty".into()));
        }
        if self.categories.is_empty() {
            return Err(Error::Config("knowledge base has no categories".into()));
        }

        check_unit("default_detection_threshold", self.default_detection_threshold)?;
        for strategy in MatchStrategy::ALL {
            check_unit(
                &format!("strategy weight '{}'", strategy),
                self.strategy_weights.weight(strategy),
            )?;
        }

        let t = &self.risk_thresholds;
        for (name, value) in [("none", t.none), ("low", t.low), ("medium", t.medium), ("high", t.high)] {
            check_unit(&format!("risk threshold '{}'", name), value)?;
        }
        if !(t.none < t.low && t.low < t.medium && t.medium < t.high) {
            return Err(Error::Config(
                "risk thresholds must be strictly ascending (none < low < medium < high)".into(),
            ));
        }

        let mut seen = HashSet::new();
        for category in &self.categories {
            category.validate()?;
            if !seen.insert(category.id.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate category id '{}'",
                    category.id
                )));
            }
        }
        Ok(())
    }

    /// カテゴリ一覧（定義順）
    pub fn list_categories(&self) -> &[AllergenCategory] {
        &self.categories
    }

    pub fn category(&self, id: &str) -> Option<&AllergenCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn category_position(&self, id: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.id == id)
    }

    /// カテゴリの検出閾値（個別指定がなければ既定値）
    pub fn detection_threshold(&self, id: &str) -> f64 {
        self.category(id)
            .and_then(|c| c.detection_threshold)
            .unwrap_or(self.default_detection_threshold)
    }

    /// カテゴリの重症度重み（未知のカテゴリは最大扱い）
    pub fn severity_weight(&self, id: &str) -> f64 {
        self.category(id).map(|c| c.severity_weight).unwrap_or(1.0)
    }

    /// カテゴリを追加、または同じIDのものを置き換える
    pub fn upsert_category(&mut self, category: AllergenCategory) -> Result<()> {
        category.validate()?;
        match self.categories.iter_mut().find(|c| c.id == category.id) {
            Some(existing) => *existing = category,
            None => self.categories.push(category),
        }
        Ok(())
    }

    /// 既存カテゴリに差分を適用
    pub fn patch_category(&mut self, id: &str, patch: &CategoryPatch) -> Result<()> {
        let category = self
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::Config(format!("unknown category '{}'", id)))?;

        let mut updated = category.clone();
        updated.apply(patch);
        updated.validate()?;
        *category = updated;
        Ok(())
    }

    /// カテゴリを削除（存在した場合true）
    pub fn remove_category(&mut self, id: &str) -> bool {
        let before = self.categories.len();
        self.categories.retain(|c| c.id != id);
        self.categories.len() != before
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!("{} must be within [0, 1], got {}", name, value)))
    }
}
