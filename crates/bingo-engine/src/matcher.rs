//! Whole-token detection of card words in spoken text.
//!
//! Text is case-folded and split into tokens (runs of letters and digits,
//! with internal apostrophes kept, so "let's" is one token). A target word
//! and each of its aliases is compiled once into a token sequence; a word is
//! detected when one of its sequences appears contiguously in a fragment.
//! Substrings inside longer tokens never match: "sync" is not found in
//! "synchronize".

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}\p{N}]+)*").expect("Invalid token regex")
});

/// Split text into case-folded tokens.
///
/// Punctuation separates tokens, so "CI/CD", "ci-cd" and "ci cd" all yield
/// `["ci", "cd"]`. Typographic apostrophes are treated like `'`.
pub fn tokenize(text: &str) -> Vec<String> {
    let folded = text
        .to_lowercase()
        .replace(['\u{2019}', '\u{2018}'], "'");
    TOKEN_RE
        .find_iter(&folded)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A canonical card word with every surface form that counts for it.
#[derive(Debug, Clone)]
struct Term {
    canonical: String,
    key: String,
    forms: Vec<Vec<String>>,
}

/// Matcher compiled for one card's word list.
///
/// Build it once per card; `detect` is then a single pass over the
/// fragment's tokens using an index keyed by each form's first token.
#[derive(Debug, Clone, Default)]
pub struct WordMatcher {
    terms: Vec<Term>,
    /// First token -> (term index, form index), in term order.
    by_first_token: HashMap<String, Vec<(usize, usize)>>,
}

impl WordMatcher {
    /// Compile a matcher for `target_words`.
    ///
    /// `aliases` maps a canonical word (any case) to equivalent spoken forms.
    /// Aliases for words that are not targets are ignored. Case-insensitive
    /// duplicate targets are collapsed onto the first spelling.
    pub fn new<S: AsRef<str>>(target_words: &[S], aliases: &BTreeMap<String, Vec<String>>) -> Self {
        let alias_lookup: HashMap<String, &Vec<String>> = aliases
            .iter()
            .map(|(canonical, forms)| (canonical.to_lowercase(), forms))
            .collect();

        let mut seen = HashSet::new();
        let mut terms = Vec::new();
        for word in target_words {
            let canonical = word.as_ref().trim();
            let key = canonical.to_lowercase();
            if canonical.is_empty() || !seen.insert(key.clone()) {
                continue;
            }

            let mut forms: Vec<Vec<String>> = Vec::new();
            let surface = std::iter::once(canonical).chain(
                alias_lookup
                    .get(&key)
                    .into_iter()
                    .flat_map(|forms| forms.iter().map(String::as_str)),
            );
            for text in surface {
                let tokens = tokenize(text);
                if !tokens.is_empty() && !forms.contains(&tokens) {
                    forms.push(tokens);
                }
            }

            if forms.is_empty() {
                tracing::warn!(word = %canonical, "Card word has no matchable tokens");
            }
            terms.push(Term {
                canonical: canonical.to_string(),
                key,
                forms,
            });
        }

        let mut by_first_token: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
        for (term_idx, term) in terms.iter().enumerate() {
            for (form_idx, form) in term.forms.iter().enumerate() {
                by_first_token
                    .entry(form[0].clone())
                    .or_default()
                    .push((term_idx, form_idx));
            }
        }

        Self {
            terms,
            by_first_token,
        }
    }

    /// Number of distinct target words.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Canonical target words in the order they were given.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|t| t.canonical.as_str())
    }

    /// Target words newly spoken in `fragment`.
    ///
    /// Words whose case-folded form is in `already_matched` are skipped even
    /// if spoken again. Each word is reported once, ordered by where its
    /// earliest form starts in the fragment; words starting at the same
    /// token keep target-list order. Empty or garbled input yields an empty
    /// list.
    pub fn detect(&self, fragment: &str, already_matched: &HashSet<String>) -> Vec<String> {
        let tokens = tokenize(fragment);
        if tokens.is_empty() || self.terms.is_empty() {
            return Vec::new();
        }

        let mut reported = vec![false; self.terms.len()];
        let mut detected = Vec::new();

        for start in 0..tokens.len() {
            let Some(candidates) = self.by_first_token.get(&tokens[start]) else {
                continue;
            };
            for &(term_idx, form_idx) in candidates {
                if reported[term_idx] {
                    continue;
                }
                let term = &self.terms[term_idx];
                if already_matched.contains(&term.key) {
                    continue;
                }
                if tokens[start..].starts_with(&term.forms[form_idx]) {
                    reported[term_idx] = true;
                    detected.push(term.canonical.clone());
                }
            }
        }

        detected
    }
}

/// One-shot detection without keeping a compiled matcher around.
pub fn detect_words<S: AsRef<str>>(
    fragment: &str,
    target_words: &[S],
    already_matched: &HashSet<String>,
    aliases: &BTreeMap<String, Vec<String>>,
) -> Vec<String> {
    WordMatcher::new(target_words, aliases).detect(fragment, already_matched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_aliases() -> BTreeMap<String, Vec<String>> {
        BTreeMap::new()
    }

    fn none() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Let's SYNC up!"), vec!["let's", "sync", "up"]);
        assert_eq!(tokenize("CI/CD pipeline"), vec!["ci", "cd", "pipeline"]);
        assert_eq!(tokenize("follow-up"), vec!["follow", "up"]);
        assert_eq!(tokenize("we\u{2019}re"), vec!["we're"]);
        assert_eq!(tokenize("24/7 uptime"), vec!["24", "7", "uptime"]);
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn test_single_word_match() {
        let words = ["synergy", "pivot"];
        let hits = detect_words("let's leverage synergy today", &words, &none(), &no_aliases());
        assert_eq!(hits, vec!["synergy"]);
    }

    #[test]
    fn test_no_substring_match() {
        let words = ["sync"];
        assert!(detect_words("synchronize the docs", &words, &none(), &no_aliases()).is_empty());
        assert_eq!(
            detect_words("let's sync up", &words, &none(), &no_aliases()),
            vec!["sync"]
        );
    }

    #[test]
    fn test_registered_longer_term_matches_separately() {
        let words = ["sync", "synchronize"];
        let hits = detect_words("synchronize the docs", &words, &none(), &no_aliases());
        assert_eq!(hits, vec!["synchronize"]);
    }

    #[test]
    fn test_case_folding() {
        let words = ["ROI", "Kubernetes"];
        let hits = detect_words("the roi on KUBERNETES", &words, &none(), &no_aliases());
        assert_eq!(hits, vec!["ROI", "Kubernetes"]);
    }

    #[test]
    fn test_multi_word_phrase_is_contiguous() {
        let words = ["circle back"];
        assert_eq!(
            detect_words("we will circle back tomorrow", &words, &none(), &no_aliases()),
            vec!["circle back"]
        );
        assert!(detect_words("circle around and back", &words, &none(), &no_aliases()).is_empty());
        assert!(detect_words("back in a circle", &words, &none(), &no_aliases()).is_empty());
    }

    #[test]
    fn test_punctuated_terms() {
        let words = ["CI/CD", "low-hanging fruit", "on-call"];
        let hits = detect_words(
            "grab the low hanging fruit, fix ci cd, then I'm on call",
            &words,
            &none(),
            &no_aliases(),
        );
        assert_eq!(hits, vec!["low-hanging fruit", "CI/CD", "on-call"]);
    }

    #[test]
    fn test_alias_counts_for_canonical_once() {
        let words = ["ROI", "KPI"];
        let mut aliases = BTreeMap::new();
        aliases.insert("roi".to_string(), vec!["return on investment".to_string()]);
        let hits = detect_words(
            "the return on investment, I mean the ROI, is great",
            &words,
            &none(),
            &aliases,
        );
        assert_eq!(hits, vec!["ROI"]);
    }

    #[test]
    fn test_alias_for_non_target_is_ignored() {
        let words = ["pivot"];
        let mut aliases = BTreeMap::new();
        aliases.insert("roi".to_string(), vec!["return on investment".to_string()]);
        assert!(detect_words("return on investment", &words, &none(), &aliases).is_empty());
    }

    #[test]
    fn test_already_matched_is_excluded() {
        let words = ["synergy", "pivot"];
        let already: HashSet<String> = ["synergy".to_string()].into_iter().collect();
        let hits = detect_words("synergy and a pivot", &words, &already, &no_aliases());
        assert_eq!(hits, vec!["pivot"]);
    }

    #[test]
    fn test_already_matched_blocks_alias_too() {
        let words = ["ROI"];
        let mut aliases = BTreeMap::new();
        aliases.insert("ROI".to_string(), vec!["return on investment".to_string()]);
        let already: HashSet<String> = ["roi".to_string()].into_iter().collect();
        assert!(detect_words("return on investment", &words, &already, &aliases).is_empty());
    }

    #[test]
    fn test_order_follows_first_appearance() {
        let words = ["alpha", "beta", "gamma"];
        let hits = detect_words("gamma then alpha then beta then gamma", &words, &none(), &no_aliases());
        assert_eq!(hits, vec!["gamma", "alpha", "beta"]);
    }

    #[test]
    fn test_overlapping_terms_all_reported() {
        let words = ["sprint planning", "sprint"];
        let hits = detect_words("sprint planning starts now", &words, &none(), &no_aliases());
        assert_eq!(hits, vec!["sprint planning", "sprint"]);
    }

    #[test]
    fn test_empty_and_garbled_fragments() {
        let words = ["synergy"];
        assert!(detect_words("", &words, &none(), &no_aliases()).is_empty());
        assert!(detect_words("   ", &words, &none(), &no_aliases()).is_empty());
        assert!(detect_words("?!#@ ...", &words, &none(), &no_aliases()).is_empty());
    }

    #[test]
    fn test_duplicate_targets_collapse() {
        let matcher = WordMatcher::new(&["Sync", "sync", ""], &no_aliases());
        assert_eq!(matcher.len(), 1);
        assert_eq!(matcher.detect("sync", &none()), vec!["Sync"]);
    }

    #[test]
    fn test_matcher_reuse_is_idempotent_per_word() {
        let matcher = WordMatcher::new(&["pivot", "synergy"], &no_aliases());
        let mut matched = HashSet::new();

        let first = matcher.detect("time to pivot", &matched);
        assert_eq!(first, vec!["pivot"]);
        matched.extend(first.iter().map(|w| w.to_lowercase()));

        assert!(matcher.detect("pivot pivot pivot", &matched).is_empty());
        assert_eq!(matcher.detect("pivot for synergy", &matched), vec!["synergy"]);
    }

    #[test]
    fn test_words_iterator_keeps_order() {
        let matcher = WordMatcher::new(&["b", "a", "c"], &no_aliases());
        let words: Vec<&str> = matcher.words().collect();
        assert_eq!(words, vec!["b", "a", "c"]);
    }
}
