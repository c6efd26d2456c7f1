//! Frequency-ranked keyword derivation.

use std::collections::HashMap;

use crate::utils::MIN_KEYWORD_LEN;

/// Keywords of a text plus the full token frequency map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    /// Top-N tokens, most frequent first, ties in first-occurrence order
    pub keywords: Vec<String>,
    pub frequencies: HashMap<String, usize>,
}

/// Lowercased alphanumeric tokens of at least `MIN_KEYWORD_LEN` chars
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_KEYWORD_LEN)
        .map(str::to_lowercase)
}

/// Count tokens and rank them
///
/// Returns frequencies alongside tokens ordered by count descending, equal
/// counts keeping the order in which the token first appeared.
fn ranked_tokens(text: &str) -> (Vec<(String, usize)>, HashMap<String, usize>) {
    let mut frequencies: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();

    for token in tokenize(text) {
        let count = frequencies.entry(token.clone()).or_insert(0);
        if *count == 0 {
            first_seen.push(token);
        }
        *count += 1;
    }

    let mut ranked: Vec<(String, usize)> = first_seen
        .into_iter()
        .map(|token| {
            let count = frequencies.get(&token).copied().unwrap_or(0);
            (token, count)
        })
        .collect();
    // Stable sort keeps first-occurrence order among equal counts
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    (ranked, frequencies)
}

/// Extract up to `limit` keywords from `text`
#[must_use]
pub fn extract_keywords(text: &str, limit: usize) -> KeywordSet {
    let (ranked, frequencies) = ranked_tokens(text);
    KeywordSet {
        keywords: ranked.into_iter().take(limit).map(|(token, _)| token).collect(),
        frequencies,
    }
}

/// Top `limit` keys of an existing frequency map
///
/// `order_hint` supplies the first-occurrence order used to break ties; keys
/// missing from it sort after every hinted key, alphabetically.
#[must_use]
pub fn top_by_frequency(
    frequencies: &HashMap<String, usize>,
    order_hint: &[String],
    limit: usize,
) -> Vec<String> {
    let position: HashMap<&str, usize> = order_hint
        .iter()
        .enumerate()
        .map(|(i, k)| (k.as_str(), i))
        .collect();

    let mut keys: Vec<(&String, usize)> = frequencies.iter().map(|(k, v)| (k, *v)).collect();
    keys.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| {
                let pa = position.get(a.0.as_str()).copied().unwrap_or(usize::MAX);
                let pb = position.get(b.0.as_str()).copied().unwrap_or(usize::MAX);
                pa.cmp(&pb)
            })
            .then_with(|| a.0.cmp(b.0))
    });
    keys.into_iter().take(limit).map(|(k, _)| k.clone()).collect()
}

/// Append `extra` keywords (lowercased, trimmed) that are not already present
#[must_use]
pub fn merge_keywords(mut keywords: Vec<String>, extra: &[String]) -> Vec<String> {
    for keyword in extra {
        let keyword = keyword.trim().to_lowercase();
        if !keyword.is_empty() && !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }
    keywords
}
