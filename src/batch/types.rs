use allergen_scan_common::{AnalysisResult, RiskLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// バッチ入力の1レシピ
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeInput {
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    /// 材料（1行1材料）
    #[serde(default)]
    pub ingredients: Option<Vec<String>>,

    /// 材料ブロック（区切り文字入りの1文字列）
    #[serde(default)]
    pub ingredients_text: Option<String>,
}

impl RecipeInput {
    /// 解析対象の材料テキスト
    ///
    /// 両方あれば`ingredients`を優先する。どちらもなければNone。
    pub fn ingredient_text(&self) -> Option<String> {
        match (&self.ingredients, &self.ingredients_text) {
            (Some(lines), _) => Some(lines.join("\n")),
            (None, Some(text)) => Some(text.clone()),
            (None, None) => None,
        }
    }
}

/// レシピ単位の解析記録（サマリー + 詳細）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeAnalysisRecord {
    pub recipe_id: String,

    #[serde(default)]
    pub title: String,

    pub risk_level: RiskLevel,

    /// 検出カテゴリ中の最大確信度
    pub max_confidence: f64,

    pub analyzed_at: DateTime<Utc>,

    pub analysis: AnalysisResult,
}

impl RecipeAnalysisRecord {
    pub fn new(recipe: &RecipeInput, analysis: AnalysisResult) -> Self {
        Self {
            recipe_id: recipe.id.clone(),
            title: recipe.title.clone().unwrap_or_default(),
            risk_level: analysis.risk_level,
            max_confidence: analysis.max_confidence(),
            analyzed_at: Utc::now(),
            analysis,
        }
    }
}
