//! 多戦略マッチャー
//!
//! 正規化済みフレーズの語列を、知識ベースの用語（正規名・同義語・
//! 隠れ原料・学名）と語単位で照合する。複数語の正規名に限り、
//! 正規化の揺れ（"peanutbutter", "eggwhites"）を拾うために
//! 語を連結した文字列での部分一致にフォールバックする。
//!
//! 照合後のフィルタ:
//! - 除外表現（"coconut milk" 中の milk など）の範囲内の一致を捨てる
//! - `honor_negation` が有効なら否定語の影響下の一致を捨てる
//! - 同じカテゴリ内で、より長い一致に厳密に含まれる一致を捨てる
//!   （"soy lecithin" は隠れ原料として1件だけ残る）

use crate::error::{Error, Result};
use crate::knowledge::KnowledgeBase;
use crate::normalizer::{normalize_term, NormalizerRules};
use crate::types::{IngredientPhrase, Match, MatchStrategy};
use std::collections::{HashMap, HashSet};

/// 索引に登録された1用語
#[derive(Debug, Clone)]
struct TermEntry {
    /// 知識ベース上の定義順
    category: usize,
    strategy: MatchStrategy,
    term: String,
    words: Vec<String>,
    /// フォールバック照合用の連結文字列（複数語の正規名のみ）
    compact: Option<String>,
}

/// 除外表現
#[derive(Debug, Clone)]
struct ExclusionEntry {
    category: usize,
    words: Vec<String>,
}

/// 照合途中の一致（語インデックス付き）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Candidate {
    entry: usize,
    phrase: usize,
    word_start: usize,
    word_end: usize,
}

/// 先頭語で引ける用語索引
///
/// 知識ベースのスナップショット構築時に1度だけ作られ、以後は読み取り専用。
#[derive(Debug, Clone, Default)]
pub struct TermIndex {
    entries: Vec<TermEntry>,
    by_first_word: HashMap<String, Vec<usize>>,
    exclusions: Vec<ExclusionEntry>,
    exclusions_by_first_word: HashMap<String, Vec<usize>>,
}

impl TermIndex {
    /// 知識ベースから索引を構築
    ///
    /// 正規化すると空になる用語（単位語だけの用語など）は
    /// 永久に一致しないので設定エラーにする。
    pub fn build(kb: &KnowledgeBase, rules: &NormalizerRules) -> Result<Self> {
        let mut index = TermIndex::default();
        let mut seen: HashSet<(usize, MatchStrategy, Vec<String>)> = HashSet::new();

        for (position, category) in kb.categories.iter().enumerate() {
            for strategy in MatchStrategy::ALL {
                for term in category.terms(strategy) {
                    let words = normalize_term(term, rules);
                    if words.is_empty() {
                        return Err(Error::Config(format!(
                            "category '{}': term '{}' is empty after normalization",
                            category.id, term
                        )));
                    }
                    if !seen.insert((position, strategy, words.clone())) {
                        continue;
                    }
                    let compact = (strategy == MatchStrategy::Exact && words.len() > 1)
                        .then(|| words.concat());
                    let id = index.entries.len();
                    index
                        .by_first_word
                        .entry(words[0].clone())
                        .or_default()
                        .push(id);
                    index.entries.push(TermEntry {
                        category: position,
                        strategy,
                        term: term.clone(),
                        words,
                        compact,
                    });
                }
            }

            for exclusion in &category.exclusions {
                let words = normalize_term(exclusion, rules);
                if words.is_empty() {
                    return Err(Error::Config(format!(
                        "category '{}': exclusion '{}' is empty after normalization",
                        category.id, exclusion
                    )));
                }
                let id = index.exclusions.len();
                index
                    .exclusions_by_first_word
                    .entry(words[0].clone())
                    .or_default()
                    .push(id);
                index.exclusions.push(ExclusionEntry {
                    category: position,
                    words,
                });
            }
        }

        Ok(index)
    }

    /// 登録用語数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 全フレーズの一致を求める
    ///
    /// 結果はフレーズ順、次に戦略の優先順、次に出現位置の順。
    /// 根拠文字列は`input`（正規化前の元テキスト）から切り出す。
    pub fn find_matches(
        &self,
        input: &str,
        phrases: &[IngredientPhrase],
        kb: &KnowledgeBase,
    ) -> Vec<Match> {
        let mut candidates = Vec::new();
        for phrase in phrases {
            let mut found = self.phrase_candidates(phrase);
            self.drop_excluded(phrase, &mut found);
            if kb.honor_negation {
                found.retain(|c| {
                    !phrase.words[c.word_start..c.word_end]
                        .iter()
                        .any(|w| w.negated)
                });
            }
            self.drop_subsumed(&mut found);
            candidates.extend(found);
        }

        candidates.sort_by(|a, b| {
            let ea = &self.entries[a.entry];
            let eb = &self.entries[b.entry];
            a.phrase
                .cmp(&b.phrase)
                .then(ea.strategy.cmp(&eb.strategy))
                .then(a.word_start.cmp(&b.word_start))
                .then(ea.category.cmp(&eb.category))
                .then(a.word_end.cmp(&b.word_end))
                .then(ea.term.cmp(&eb.term))
        });

        candidates
            .into_iter()
            .filter_map(|c| self.to_match(input, phrases, kb, c))
            .collect()
    }

    /// 1フレーズ内の照合（語単位 → 連結文字列フォールバック）
    fn phrase_candidates(&self, phrase: &IngredientPhrase) -> Vec<Candidate> {
        let mut found = Vec::new();
        let mut token_matched: HashSet<usize> = HashSet::new();

        for start in 0..phrase.words.len() {
            let Some(ids) = self.by_first_word.get(&phrase.words[start].text) else {
                continue;
            };
            for &id in ids {
                let words = &self.entries[id].words;
                if words_match(phrase, start, words) {
                    token_matched.insert(id);
                    found.push(Candidate {
                        entry: id,
                        phrase: phrase.index,
                        word_start: start,
                        word_end: start + words.len(),
                    });
                }
            }
        }

        let (joined, bounds) = compact_words(phrase);
        for (id, entry) in self.entries.iter().enumerate() {
            let Some(compact) = &entry.compact else {
                continue;
            };
            if token_matched.contains(&id) {
                continue;
            }
            for (pos, _) in joined.match_indices(compact.as_str()) {
                // 語の途中から始まる一致は採らない（"buckwheatflour" 中の "wheatflour"）
                let Some(word_start) = bounds.iter().position(|&(s, _)| s == pos) else {
                    continue;
                };
                // 語の途中で終わる一致も採らない（"pine nutmeg" 中の "pinenut"）
                let end = pos + compact.len();
                let Some(last) = bounds.iter().position(|&(_, e)| e == end) else {
                    continue;
                };
                let word_end = last + 1;
                found.push(Candidate {
                    entry: id,
                    phrase: phrase.index,
                    word_start,
                    word_end,
                });
            }
        }

        found
    }

    /// 除外表現の範囲内にある同カテゴリの一致を捨てる
    fn drop_excluded(&self, phrase: &IngredientPhrase, found: &mut Vec<Candidate>) {
        let mut ranges: Vec<(usize, usize, usize)> = Vec::new();
        for start in 0..phrase.words.len() {
            let Some(ids) = self.exclusions_by_first_word.get(&phrase.words[start].text) else {
                continue;
            };
            for &id in ids {
                let exclusion = &self.exclusions[id];
                if words_match(phrase, start, &exclusion.words) {
                    ranges.push((exclusion.category, start, start + exclusion.words.len()));
                }
            }
        }
        if ranges.is_empty() {
            return;
        }

        found.retain(|c| {
            let category = self.entries[c.entry].category;
            !ranges
                .iter()
                .any(|&(cat, s, e)| cat == category && s <= c.word_start && c.word_end <= e)
        });
    }

    /// 同カテゴリのより長い一致に厳密に含まれる一致を捨てる
    fn drop_subsumed(&self, found: &mut Vec<Candidate>) {
        let snapshot = found.clone();
        found.retain(|c| {
            let category = self.entries[c.entry].category;
            !snapshot.iter().any(|o| {
                self.entries[o.entry].category == category
                    && o.word_start <= c.word_start
                    && c.word_end <= o.word_end
                    && (o.word_end - o.word_start) > (c.word_end - c.word_start)
            })
        });
        // 同じ範囲・同じ戦略の重複（"egg white" と "egg whites" の連結一致など）
        let mut seen = HashSet::new();
        found.retain(|c| {
            let entry = &self.entries[c.entry];
            seen.insert((entry.category, entry.strategy, c.phrase, c.word_start, c.word_end))
        });
    }

    fn to_match(
        &self,
        input: &str,
        phrases: &[IngredientPhrase],
        kb: &KnowledgeBase,
        candidate: Candidate,
    ) -> Option<Match> {
        let entry = &self.entries[candidate.entry];
        let phrase = phrases.iter().find(|p| p.index == candidate.phrase)?;
        let first = phrase.words.get(candidate.word_start)?;
        let last = phrase.words.get(candidate.word_end.checked_sub(1)?)?;
        let evidence = input.get(first.start..last.end)?;
        let category = kb.categories.get(entry.category)?;

        Some(Match {
            category_id: category.id.clone(),
            term: entry.term.clone(),
            evidence: evidence.to_string(),
            start: first.start,
            end: last.end,
            strategy: entry.strategy,
            phrase_index: phrase.index,
            weight: kb.strategy_weights.weight(entry.strategy),
        })
    }
}

fn words_match(phrase: &IngredientPhrase, start: usize, words: &[String]) -> bool {
    let end = start + words.len();
    end <= phrase.words.len()
        && phrase.words[start..end]
            .iter()
            .zip(words)
            .all(|(w, t)| w.text == *t)
}

/// 語を区切りなしで連結し、各語の範囲を返す
fn compact_words(phrase: &IngredientPhrase) -> (String, Vec<(usize, usize)>) {
    let mut joined = String::new();
    let mut bounds = Vec::with_capacity(phrase.words.len());
    for word in &phrase.words {
        let start = joined.len();
        joined.push_str(&word.text);
        bounds.push((start, joined.len()));
    }
    (joined, bounds)
}
