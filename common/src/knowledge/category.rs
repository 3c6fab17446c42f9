//! アレルゲンカテゴリとキュレーション用の差分

use crate::error::{Error, Result};
use crate::types::MatchStrategy;
use serde::{Deserialize, Serialize};

/// アレルゲンカテゴリ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllergenCategory {
    /// 安定ID（例: "milk"）
    pub id: String,
    /// 表示名
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// 重症度重み [0, 1]
    pub severity_weight: f64,
    /// 検出閾値（未指定なら知識ベースの既定値）
    #[serde(default)]
    pub detection_threshold: Option<f64>,
    /// 正規名（順序付き）
    #[serde(default)]
    pub canonical_terms: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// 名前に出てこないが由来が疑われる原料
    #[serde(default)]
    pub hidden_sources: Vec<String>,
    /// 学名・技術名
    #[serde(default)]
    pub scientific_names: Vec<String>,
    /// 誤検出しやすい表現（例: milkに対する "coconut milk"）
    #[serde(default)]
    pub exclusions: Vec<String>,
}

impl AllergenCategory {
    pub fn new(id: impl Into<String>, name: impl Into<String>, severity_weight: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            severity_weight,
            detection_threshold: None,
            canonical_terms: Vec::new(),
            synonyms: Vec::new(),
            hidden_sources: Vec::new(),
            scientific_names: Vec::new(),
            exclusions: Vec::new(),
        }
    }

    /// 戦略に対応する用語リスト
    pub fn terms(&self, strategy: MatchStrategy) -> &[String] {
        match strategy {
            MatchStrategy::Exact => &self.canonical_terms,
            MatchStrategy::Synonym => &self.synonyms,
            MatchStrategy::HiddenSource => &self.hidden_sources,
            MatchStrategy::ScientificName => &self.scientific_names,
        }
    }

    /// 全戦略の用語数
    pub fn term_count(&self) -> usize {
        MatchStrategy::ALL.iter().map(|s| self.terms(*s).len()).sum()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::Config("category id is empty".into()));
        }
        if self.id != self.id.trim().to_lowercase() {
            return Err(Error::Config(format!(
                "category id '{}' must be lowercase without surrounding spaces",
                self.id
            )));
        }
        if !(self.severity_weight.is_finite() && (0.0..=1.0).contains(&self.severity_weight)) {
            return Err(Error::Config(format!(
                "category '{}': severity_weight must be within [0, 1]",
                self.id
            )));
        }
        if let Some(threshold) = self.detection_threshold {
            if !(threshold.is_finite() && (0.0..=1.0).contains(&threshold)) {
                return Err(Error::Config(format!(
                    "category '{}': detection_threshold must be within [0, 1]",
                    self.id
                )));
            }
        }
        if self.term_count() == 0 {
            return Err(Error::Config(format!("category '{}' has no terms", self.id)));
        }
        let blank = MatchStrategy::ALL
            .iter()
            .flat_map(|s| self.terms(*s))
            .chain(self.exclusions.iter())
            .any(|t| t.trim().is_empty());
        if blank {
            return Err(Error::Config(format!("category '{}' has a blank term", self.id)));
        }
        Ok(())
    }

    /// 差分を適用（重複する用語は追加しない）
    pub(crate) fn apply(&mut self, patch: &CategoryPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(weight) = patch.severity_weight {
            self.severity_weight = weight;
        }
        if let Some(threshold) = patch.detection_threshold {
            self.detection_threshold = Some(threshold);
        }
        extend_unique(&mut self.canonical_terms, &patch.add_canonical_terms);
        extend_unique(&mut self.synonyms, &patch.add_synonyms);
        extend_unique(&mut self.hidden_sources, &patch.add_hidden_sources);
        extend_unique(&mut self.scientific_names, &patch.add_scientific_names);
        extend_unique(&mut self.exclusions, &patch.add_exclusions);
    }
}

fn extend_unique(target: &mut Vec<String>, additions: &[String]) {
    for term in additions {
        let term = term.trim().to_lowercase();
        if !target.iter().any(|t| t.eq_ignore_ascii_case(&term)) {
            target.push(term);
        }
    }
}

/// キュレーション用のカテゴリ差分
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub severity_weight: Option<f64>,
    #[serde(default)]
    pub detection_threshold: Option<f64>,
    #[serde(default)]
    pub add_canonical_terms: Vec<String>,
    #[serde(default)]
    pub add_synonyms: Vec<String>,
    #[serde(default)]
    pub add_hidden_sources: Vec<String>,
    #[serde(default)]
    pub add_scientific_names: Vec<String>,
    #[serde(default)]
    pub add_exclusions: Vec<String>,
}

impl CategoryPatch {
    /// 何も変更しない差分か
    pub fn is_empty(&self) -> bool {
        *self == CategoryPatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AllergenCategory {
        let mut c = AllergenCategory::new("soy", "Soy", 0.7);
        c.canonical_terms = vec!["soy".into(), "soybean".into()];
        c.hidden_sources = vec!["lecithin".into()];
        c
    }

    #[test]
    fn test_terms_by_strategy() {
        let c = sample();
        assert_eq!(c.terms(MatchStrategy::Exact).len(), 2);
        assert_eq!(c.terms(MatchStrategy::HiddenSource), &["lecithin".to_string()]);
        assert!(c.terms(MatchStrategy::ScientificName).is_empty());
        assert_eq!(c.term_count(), 3);
    }

    #[test]
    fn test_apply_patch_dedupes_terms() {
        let mut c = sample();
        let patch = CategoryPatch {
            add_canonical_terms: vec!["Soy".into(), "soya".into()],
            add_scientific_names: vec!["glycine max".into()],
            severity_weight: Some(0.75),
            detection_threshold: Some(0.45),
            ..Default::default()
        };
        c.apply(&patch);
        assert_eq!(c.canonical_terms, vec!["soy", "soybean", "soya"]);
        assert_eq!(c.scientific_names, vec!["glycine max"]);
        assert_eq!(c.severity_weight, 0.75);
        assert_eq!(c.detection_threshold, Some(0.45));
    }

    #[test]
    fn test_validate_rejects_termless_category() {
        let c = AllergenCategory::new("empty", "Empty", 0.5);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_uppercase_id() {
        let mut c = sample();
        c.id = "Soy".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut c = sample();
        c.detection_threshold = Some(1.5);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_empty_patch() {
        assert!(CategoryPatch::default().is_empty());
        let patch = CategoryPatch {
            add_synonyms: vec!["edamame".into()],
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
