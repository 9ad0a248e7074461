//! Title normalization.
//!
//! [`NormalizeMode::Basic`] only canonicalizes formatting and is the exact-match
//! key for duplicate grouping. [`NormalizeMode::Advanced`] is deliberately lossy
//! (abbreviations, stop words, word order) and only feeds similarity scoring.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref EMPTY_PAIR: Regex = Regex::new(r"\(\s*\)|\[\s*\]").unwrap();
    static ref LONE_DOT: Regex = Regex::new(r"\s+\.\s+").unwrap();
    static ref SPACED_SEPARATOR: Regex = Regex::new(r"\s*([().\-_])\s*").unwrap();
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "is", "are", "on", "at", "to", "for", "with", "by", "in",
    "of",
];

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("in.", "inch"),
    ("inches", "inch"),
    ("ft.", "foot"),
    ("feet", "foot"),
    ("lbs", "pound"),
    ("lb.", "pound"),
    ("pounds", "pound"),
    ("oz.", "ounce"),
    ("ounces", "ounce"),
    ("pcs", "piece"),
    ("pc.", "piece"),
    ("pieces", "piece"),
];

/// Below this many "important" words the advanced key keeps every filtered word.
const MIN_IMPORTANT_WORDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NormalizeMode {
    #[default]
    Basic,
    Advanced,
}

pub fn normalize(title: &str, mode: NormalizeMode) -> String {
    match mode {
        NormalizeMode::Basic => basic_normalize(title),
        NormalizeMode::Advanced => advanced_normalize(title),
    }
}

/// Formatting-only normalization used as the grouping key.
///
/// The cleanup pass is repeated until the text stops changing, so the result
/// is a fixed point: `basic_normalize(basic_normalize(s)) == basic_normalize(s)`.
pub fn basic_normalize(title: &str) -> String {
    let mut current = title.to_string();
    loop {
        let next = basic_pass(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn basic_pass(text: &str) -> String {
    let lowered = text.to_lowercase();
    let collapsed = WHITESPACE.replace_all(&lowered, " ");
    let without_pairs = EMPTY_PAIR.replace_all(&collapsed, "");
    let without_dots = LONE_DOT.replace_all(&without_pairs, " ");
    let tightened = SPACED_SEPARATOR.replace_all(&without_dots, "$1");
    let collapsed = WHITESPACE.replace_all(&tightened, " ");
    collapsed
        .trim()
        .chars()
        .filter(|&c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '(' | ')' | '.' | '-' | '_'))
        .collect()
}

/// Order-insensitive, lossy key used by similarity scoring.
pub fn advanced_normalize(title: &str) -> String {
    let lowered = title.to_lowercase();

    let mut words: Vec<String> = lowered
        .split_whitespace()
        .map(expand_token)
        .filter(|word| word.chars().count() > 2 && !STOP_WORDS.contains(&word.as_str()))
        .collect();
    words.sort();

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for word in &words {
        *counts.entry(word.as_str()).or_default() += 1;
    }
    let important: Vec<&str> = counts
        .iter()
        .filter(|(word, count)| **count > 1 || word.chars().count() > 5)
        .map(|(word, _)| *word)
        .collect();

    if important.len() < MIN_IMPORTANT_WORDS {
        words.join(" ")
    } else {
        important.join(" ")
    }
}

/// Expand a known abbreviation, otherwise drop the separators `().-_`.
/// Other punctuation stays part of the word.
fn expand_token(token: &str) -> String {
    if let Some(expanded) = abbreviation(token) {
        return expanded.to_string();
    }
    let cleaned: String = token
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '.' | '-' | '_'))
        .collect();
    match abbreviation(&cleaned) {
        Some(expanded) => expanded.to_string(),
        None => cleaned,
    }
}

fn abbreviation(word: &str) -> Option<&'static str> {
    ABBREVIATIONS
        .iter()
        .find(|(short, _)| *short == word)
        .map(|(_, long)| *long)
}
