//! 知識ベースのキュレーション（CLIからの更新）
//!
//! ファイル上の知識ベースを読み込み、差分を当てて検証してから書き戻す。
//! 検証に失敗した場合はファイルを変更しない。

use crate::error::{AllergenScanError, Result};
use allergen_scan_common::{AllergenCategory, CategoryPatch, KnowledgeBase, KnowledgeSnapshot};
use std::path::Path;

/// CLI引数から組み立てる更新内容
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub category_id: String,
    pub patch: CategoryPatch,
    /// 知識ベース全体のバージョン
    pub version: Option<String>,
}

/// 更新結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Created,
    Updated,
}

/// 知識ベースに更新を適用（メモリ上）
///
/// 既存カテゴリには差分を追記し、存在しないIDなら新規カテゴリとして追加する。
/// 新規の場合は表示名と重症度重みが必須。
pub fn apply_update(kb: &mut KnowledgeBase, update: &CategoryUpdate) -> Result<UpdateOutcome> {
    let id = update.category_id.trim().to_lowercase();

    let outcome = if kb.category(&id).is_some() {
        if update.patch.is_empty() && update.version.is_none() {
            return Err(AllergenScanError::Config("変更内容が指定されていません".into()));
        }
        if !update.patch.is_empty() {
            kb.patch_category(&id, &update.patch)?;
        }
        UpdateOutcome::Updated
    } else {
        kb.upsert_category(new_category(&id, &update.patch)?)?;
        UpdateOutcome::Created
    };

    if let Some(version) = &update.version {
        kb.version = version.trim().to_string();
    }
    kb.validate()?;
    Ok(outcome)
}

fn new_category(id: &str, patch: &CategoryPatch) -> Result<AllergenCategory> {
    let name = patch.name.clone().ok_or_else(|| {
        AllergenScanError::Config(format!("新しいカテゴリ '{}' には --name が必要です", id))
    })?;
    let severity = patch.severity_weight.ok_or_else(|| {
        AllergenScanError::Config(format!("新しいカテゴリ '{}' には --severity が必要です", id))
    })?;

    let mut category = AllergenCategory::new(id, name, severity);
    category.description = patch.description.clone().unwrap_or_default();
    category.detection_threshold = patch.detection_threshold;
    category.canonical_terms = lowercase_all(&patch.add_canonical_terms);
    category.synonyms = lowercase_all(&patch.add_synonyms);
    category.hidden_sources = lowercase_all(&patch.add_hidden_sources);
    category.scientific_names = lowercase_all(&patch.add_scientific_names);
    category.exclusions = lowercase_all(&patch.add_exclusions);
    Ok(category)
}

fn lowercase_all(terms: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for term in terms {
        let term = term.trim().to_lowercase();
        if !out.contains(&term) {
            out.push(term);
        }
    }
    out
}

/// ファイル上の知識ベースを更新
///
/// ファイルがなければ組み込み知識ベースを元に作成する。
pub fn update_file(path: &Path, update: &CategoryUpdate) -> Result<(KnowledgeBase, UpdateOutcome)> {
    let mut kb = if path.exists() {
        KnowledgeBase::from_file(path)?
    } else {
        tracing::info!(path = %path.display(), "knowledge base file not found, starting from builtin");
        KnowledgeBase::builtin()?
    };

    let outcome = apply_update(&mut kb, update)?;
    // 索引が作れない知識ベース（単位語だけの用語など）は書き込まない
    KnowledgeSnapshot::new(kb.clone())?;
    kb.save(path)?;
    Ok((kb, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch_terms(terms: &[&str]) -> CategoryPatch {
        CategoryPatch {
            add_synonyms: terms.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_update_existing_category() {
        let mut kb = KnowledgeBase::builtin().unwrap();
        let update = CategoryUpdate {
            category_id: "Soy".into(),
            patch: patch_terms(&["Kinako"]),
            version: None,
        };
        assert_eq!(apply_update(&mut kb, &update).unwrap(), UpdateOutcome::Updated);
        assert!(kb.category("soy").unwrap().synonyms.contains(&"kinako".to_string()));
    }

    #[test]
    fn test_new_category_requires_name_and_severity() {
        let mut kb = KnowledgeBase::builtin().unwrap();
        let update = CategoryUpdate {
            category_id: "buckwheat".into(),
            patch: CategoryPatch {
                add_canonical_terms: vec!["buckwheat".into()],
                ..Default::default()
            },
            version: None,
        };
        assert!(apply_update(&mut kb, &update).is_err());
        assert!(kb.category("buckwheat").is_none());
    }

    #[test]
    fn test_create_category() {
        let mut kb = KnowledgeBase::builtin().unwrap();
        let update = CategoryUpdate {
            category_id: "buckwheat".into(),
            patch: CategoryPatch {
                name: Some("Buckwheat".into()),
                severity_weight: Some(0.9),
                detection_threshold: Some(0.4),
                add_canonical_terms: vec!["Buckwheat".into(), "soba".into()],
                ..Default::default()
            },
            version: Some("local-1".into()),
        };
        assert_eq!(apply_update(&mut kb, &update).unwrap(), UpdateOutcome::Created);
        let category = kb.category("buckwheat").unwrap();
        assert_eq!(category.canonical_terms, vec!["buckwheat", "soba"]);
        assert_eq!(kb.detection_threshold("buckwheat"), 0.4);
        assert_eq!(kb.version, "local-1");
    }

    #[test]
    fn test_empty_update_rejected() {
        let mut kb = KnowledgeBase::builtin().unwrap();
        let update = CategoryUpdate {
            category_id: "milk".into(),
            ..Default::default()
        };
        assert!(apply_update(&mut kb, &update).is_err());
    }

    #[test]
    fn test_invalid_severity_rejected() {
        let mut kb = KnowledgeBase::builtin().unwrap();
        let before = kb.clone();
        let update = CategoryUpdate {
            category_id: "milk".into(),
            patch: CategoryPatch {
                severity_weight: Some(1.5),
                ..Default::default()
            },
            version: None,
        };
        assert!(apply_update(&mut kb, &update).is_err());
        assert_eq!(kb, before);
    }
}
