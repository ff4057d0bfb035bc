//! Text normalisation and pattern helpers shared by the matcher and the
//! entity registry.

use once_cell::sync::Lazy;
use regex::Regex;

pub(crate) static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(\w+)\}").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalise user text for intent matching: lowercase, collapse whitespace
/// runs, strip punctuation except `'`, `-` and `.`.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let lowered = text.to_lowercase();
    let collapsed = WHITESPACE.replace_all(lowered.trim(), " ");

    collapsed
        .chars()
        .filter(|c| !is_stripped_punctuation(*c))
        .collect()
}

fn is_stripped_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() && !matches!(c, '\'' | '-' | '.')
}

/// Entity placeholder names (`{name}`) appearing in a pattern, in order.
pub fn placeholders(pattern: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(pattern)
        .map(|c| c[1].to_string())
        .collect()
}

/// Reduce a pattern to its plain surface text for fuzzy comparison:
/// placeholders and regex metacharacters go, word content stays.
pub fn strip_for_fuzzy(pattern: &str) -> String {
    let without_placeholders = PLACEHOLDER.replace_all(pattern, "");

    let kept: String = without_placeholders
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '(' | ')' | '?' | '*' | '+' | '[' | ']' | '{' | '}' | '|' | '\\' | '.' | '^'
            )
        })
        .collect();

    WHITESPACE.replace_all(kept.trim(), " ").to_string()
}

/// Specificity score for an entity pattern: one point per regex
/// metacharacter plus two per `{placeholder}`.
pub fn pattern_specificity(pattern: &str) -> i32 {
    const SPECIAL: &[char] = &[
        '[', ']', '(', ')', '{', '}', '^', '$', '.', '|', '*', '+', '?', '\\',
    ];

    let meta = pattern.chars().filter(|c| SPECIAL.contains(c)).count() as i32;
    let placeholders = PLACEHOLDER.find_iter(pattern).count() as i32;

    meta + placeholders * 2
}

/// Longest-common-subsequence similarity ratio in `[0, 1]`:
/// `2 * lcs(a, b) / (|a| + |b|)`.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            curr[j] = if a[i - 1] == b[j - 1] {
                prev[j - 1] + 1
            } else {
                prev[j].max(curr[j - 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
        curr[0] = 0;
    }

    2.0 * prev[b.len()] as f64 / (a.len() + b.len()) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_collapses() {
        assert_eq!(normalize("  What   TIME is it?  "), "what time is it");
    }

    #[test]
    fn normalize_keeps_allowed_punctuation() {
        assert_eq!(
            normalize("what's on at 6.30 - tonight!"),
            "what's on at 6.30 - tonight"
        );
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("Hello,   World!!");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn placeholders_are_extracted_in_order() {
        assert_eq!(
            placeholders("weather in {location} on {date}"),
            vec!["location".to_string(), "date".to_string()]
        );
        assert!(placeholders("no placeholders here").is_empty());
    }

    #[test]
    fn strip_for_fuzzy_keeps_surface_words() {
        assert_eq!(
            strip_for_fuzzy("what's the weather( like)?( in {location})?"),
            "what's the weather like in"
        );
    }

    #[test]
    fn specificity_counts_meta_and_placeholders() {
        // 4 parens + 2 question marks + 2 for the placeholder.
        assert_eq!(pattern_specificity("(a)?(b {c})?"), 10);
        assert_eq!(pattern_specificity("plain words"), 0);
    }

    #[test]
    fn similarity_ratio_bounds() {
        assert_eq!(similarity_ratio("abc", "abc"), 1.0);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("abc", ""), 0.0);

        let r = similarity_ratio("what time is it", "whats time it is");
        assert!(r > 0.5 && r < 1.0);
    }
}
