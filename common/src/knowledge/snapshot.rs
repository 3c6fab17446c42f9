//! 知識ベースのスナップショットと差し替え
//!
//! スナップショットは検証済みの知識ベースと、そこから構築した
//! 用語索引・正規化ルールを束ねた不変値。解析はスナップショットを
//! `Arc`で受け取るだけなので、ロックなしで並列に呼び出せる。

use super::KnowledgeBase;
use crate::analyzer;
use crate::error::Result;
use crate::matcher::TermIndex;
use crate::normalizer::NormalizerRules;
use crate::types::AnalysisResult;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// 解析に使う不変スナップショット
#[derive(Debug)]
pub struct KnowledgeSnapshot {
    knowledge_base: KnowledgeBase,
    rules: NormalizerRules,
    index: TermIndex,
}

impl KnowledgeSnapshot {
    /// 検証して索引を構築する
    pub fn new(knowledge_base: KnowledgeBase) -> Result<Self> {
        knowledge_base.validate()?;
        let rules = NormalizerRules::from_knowledge_base(&knowledge_base);
        let index = TermIndex::build(&knowledge_base, &rules)?;
        tracing::info!(
            version = %knowledge_base.version,
            categories = knowledge_base.categories.len(),
            terms = index.len(),
            "knowledge base snapshot built"
        );
        Ok(Self {
            knowledge_base,
            rules,
            index,
        })
    }

    /// 組み込み知識ベースから構築
    pub fn builtin() -> Result<Self> {
        Self::new(KnowledgeBase::builtin()?)
    }

    /// JSONファイルから構築
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::new(KnowledgeBase::from_file(path)?)
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    pub fn rules(&self) -> &NormalizerRules {
        &self.rules
    }

    pub fn index(&self) -> &TermIndex {
        &self.index
    }

    pub fn version(&self) -> &str {
        &self.knowledge_base.version
    }

    /// このスナップショットで解析する
    pub fn analyze(&self, text: &str) -> AnalysisResult {
        analyzer::analyze(text, self)
    }
}

/// 現在のスナップショットを保持し、丸ごと差し替えるストア
///
/// 読み手は`snapshot()`で得た`Arc`を解析の間だけ保持する。
/// 差し替えは新しいスナップショットの構築が終わってから一瞬で行うため、
/// 途中状態の知識ベースが観測されることはない。
#[derive(Debug)]
pub struct KnowledgeBaseStore {
    current: RwLock<Arc<KnowledgeSnapshot>>,
}

impl KnowledgeBaseStore {
    pub fn new(snapshot: KnowledgeSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn from_knowledge_base(knowledge_base: KnowledgeBase) -> Result<Self> {
        Ok(Self::new(KnowledgeSnapshot::new(knowledge_base)?))
    }

    pub fn builtin() -> Result<Self> {
        Ok(Self::new(KnowledgeSnapshot::builtin()?))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(Self::new(KnowledgeSnapshot::from_file(path)?))
    }

    /// 現在のスナップショット
    pub fn snapshot(&self) -> Arc<KnowledgeSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// 新しい知識ベースに差し替える
    ///
    /// 検証に失敗した場合は現在のスナップショットを維持する。
    pub fn replace(&self, knowledge_base: KnowledgeBase) -> Result<Arc<KnowledgeSnapshot>> {
        let next = Arc::new(KnowledgeSnapshot::new(knowledge_base)?);
        let previous = {
            let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *guard, Arc::clone(&next))
        };
        tracing::info!(
            from = %previous.version(),
            to = %next.version(),
            "knowledge base swapped"
        );
        Ok(next)
    }

    /// ファイルから再読み込みして差し替える
    pub fn reload_from(&self, path: &Path) -> Result<Arc<KnowledgeSnapshot>> {
        self.replace(KnowledgeBase::from_file(path)?)
    }

    /// 現在のスナップショットで解析する
    pub fn analyze(&self, text: &str) -> AnalysisResult {
        self.snapshot().analyze(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::AllergenCategory;

    #[test]
    fn test_store_replace_swaps_version() {
        let store = KnowledgeBaseStore::builtin().unwrap();
        let before = store.snapshot();

        let mut kb = before.knowledge_base().clone();
        kb.version = "test-next".to_string();
        store.replace(kb).unwrap();

        assert_eq!(store.snapshot().version(), "test-next");
        // 差し替え前に取得したスナップショットは変わらない
        assert_ne!(before.version(), "test-next");
    }

    #[test]
    fn test_store_replace_rejects_invalid_base() {
        let store = KnowledgeBaseStore::builtin().unwrap();
        let version = store.snapshot().version().to_string();

        let mut kb = store.snapshot().knowledge_base().clone();
        kb.categories.clear();
        assert!(store.replace(kb).is_err());
        assert_eq!(store.snapshot().version(), version);
    }

    #[test]
    fn test_update_is_picked_up_by_next_analysis() {
        let store = KnowledgeBaseStore::builtin().unwrap();
        assert!(store.analyze("quinoa").detected_allergens.is_empty());

        let mut kb = store.snapshot().knowledge_base().clone();
        let mut quinoa = AllergenCategory::new("quinoa", "Quinoa", 0.3);
        quinoa.canonical_terms.push("quinoa".into());
        kb.upsert_category(quinoa).unwrap();
        store.replace(kb).unwrap();

        assert!(store.analyze("quinoa").is_detected("quinoa"));
    }
}
