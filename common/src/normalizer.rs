//! 材料テキストの正規化
//!
//! 材料ブロックを区切り文字（改行・カンマ・セミコロン）でフレーズに分け、
//! 各フレーズを小文字の語に分解する。分量・単位は取り除くが、
//! 未知の語は残す（一致しなければ何も起きないだけ）。
//!
//! 語は元テキスト上のバイト位置を保持するので、一致の根拠を
//! 必ず元テキストに遡れる。不正な入力でもエラーにはせず、
//! 取り出せた分だけを返す。

use crate::knowledge::KnowledgeBase;
use crate::types::{IngredientPhrase, PhraseWord};
use regex::Regex;
use std::collections::HashSet;

/// フレーズ区切り文字
const SEPARATORS: &[char] = &['\n', '\r', ',', ';'];

/// 直後の語を否定する語（"no milk", "without eggs"）
const NEGATION_LEADERS: &[&str] = &["no", "without", "omit"];

/// 直前の語を否定する語（"dairy-free", "nut free"）
const NEGATION_SUFFIX: &str = "free";

lazy_static::lazy_static! {
    // 数字と単位が連結したトークン（"8oz", "250g", "1.5l"）
    static ref QTY_UNIT_RE: Regex = Regex::new(r"^\d+(?:[.,]\d+)?([a-z]+)$").unwrap();
}

/// 正規化ルール（知識ベースから構築）
#[derive(Debug, Clone, Default)]
pub struct NormalizerRules {
    strip_terms: HashSet<String>,
}

impl NormalizerRules {
    pub fn new<I, S>(strip_terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            strip_terms: strip_terms
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn from_knowledge_base(kb: &KnowledgeBase) -> Self {
        Self::new(&kb.strip_terms)
    }

    /// 分量・単位として取り除く語か
    pub fn is_stripped(&self, word: &str) -> bool {
        if !word.chars().any(char::is_alphabetic) {
            // 数字・分数記号（½など）のみ
            return true;
        }
        if self.strip_terms.contains(word) {
            return true;
        }
        QTY_UNIT_RE
            .captures(word)
            .map(|cap| self.strip_terms.contains(&cap[1]))
            .unwrap_or(false)
    }
}

/// 材料テキストをフレーズ列に正規化する
pub fn normalize(text: &str, rules: &NormalizerRules) -> Vec<IngredientPhrase> {
    let mut phrases = Vec::new();

    for (seg_start, seg_end) in split_segments(text) {
        let mut words = tokenize(text, seg_start, seg_end, rules);
        if words.is_empty() {
            continue;
        }
        mark_negation(&mut words);

        let (start, end) = trim_span(text, seg_start, seg_end);
        let normalized: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        phrases.push(IngredientPhrase {
            index: phrases.len(),
            text: normalized.join(" "),
            start,
            end,
            words,
        });
    }

    phrases
}

/// 用語（知識ベース側）を語の列に正規化する
///
/// 入力テキストと同じ規則を使うので、両者の比較が一致する。
pub fn normalize_term(term: &str, rules: &NormalizerRules) -> Vec<String> {
    tokenize(term, 0, term.len(), rules)
        .into_iter()
        .map(|w| w.text)
        .collect()
}

/// 区切り文字で分割した区間（バイト位置）
fn split_segments(text: &str) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if SEPARATORS.contains(&c) {
            if i > start {
                segments.push((start, i));
            }
            start = i + c.len_utf8();
        }
    }
    if start < text.len() {
        segments.push((start, text.len()));
    }
    segments
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '\'' || c == '\u{2019}'
}

/// 区間内を語に分解する
///
/// ハイフン連結語（"all-purpose"）はフレーズとしては1語のまま残り、
/// 照合用には構成語に分けて扱う。
fn tokenize(text: &str, seg_start: usize, seg_end: usize, rules: &NormalizerRules) -> Vec<PhraseWord> {
    let segment = &text[seg_start..seg_end];
    let mut words = Vec::new();
    let mut token_start: Option<usize> = None;

    for (i, c) in segment.char_indices() {
        match (is_word_char(c), token_start) {
            (true, None) => token_start = Some(i),
            (false, Some(s)) => {
                push_token(segment, s, i, seg_start, rules, &mut words);
                token_start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = token_start {
        push_token(segment, s, segment.len(), seg_start, rules, &mut words);
    }

    words
}

fn push_token(
    segment: &str,
    start: usize,
    end: usize,
    offset: usize,
    rules: &NormalizerRules,
    words: &mut Vec<PhraseWord>,
) {
    let token = &segment[start..end];
    let mut part_start = start;

    for part in token.split('-') {
        let part_end = part_start + part.len();
        // 先頭・末尾のアポストロフィを除く
        let trimmed = part.trim_matches(|c: char| !c.is_alphanumeric());
        if !trimmed.is_empty() {
            let lead = part.len() - part.trim_start_matches(|c: char| !c.is_alphanumeric()).len();
            let word_start = part_start + lead;
            let text = trimmed.to_lowercase().replace('\u{2019}', "'");
            if !rules.is_stripped(&text) {
                words.push(PhraseWord {
                    text,
                    start: offset + word_start,
                    end: offset + word_start + trimmed.len(),
                    negated: false,
                });
            }
        }
        // '-' の1バイト分
        part_start = part_end + 1;
    }
}

/// 否定表現の影響範囲をマークする
///
/// 否定されるのは前置語の直後の1語か、"free" の直前の1語だけ。
fn mark_negation(words: &mut [PhraseWord]) {
    for i in 0..words.len() {
        if NEGATION_LEADERS.contains(&words[i].text.as_str()) && i + 1 < words.len() {
            words[i + 1].negated = true;
        }
        if words[i].text == NEGATION_SUFFIX && i > 0 {
            words[i - 1].negated = true;
        }
    }
}

/// 区間の前後の空白を除いた範囲
fn trim_span(text: &str, start: usize, end: usize) -> (usize, usize) {
    let segment = &text[start..end];
    let lead = segment.len() - segment.trim_start().len();
    let trimmed = segment.trim();
    (start + lead, start + lead + trimmed.len())
}
