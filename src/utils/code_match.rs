//! Fuzzy listing-code matching
//!
//! Front-end listing codes ("TU-0042", "TU 42") rarely match feed ids
//! byte-for-byte. The matcher expands a code into normalized variants and
//! tests each against the known id index, first by containment, then by
//! Levenshtein distance. The index is scanned in feed document order so
//! ties resolve deterministically.

use regex::Regex;
use serde::Serialize;

use crate::errors::{AppError, AppResult};

/// Maximum edit distance still considered the same listing
const MAX_EDIT_DISTANCE: usize = 2;

/// How a candidate id was matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    ExactVariant,
    Containment,
    EditDistance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeMatch {
    pub id: String,
    pub method: MatchMethod,
    pub distance: usize,
}

pub struct CodeMatcher {
    digit_runs: Regex,
    prefixed_number: Regex,
    trailing_number: Regex,
}

impl CodeMatcher {
    pub fn new() -> AppResult<Self> {
        Ok(Self {
            digit_runs: Regex::new(r"\d+")
                .map_err(|e| AppError::internal(format!("bad digit pattern: {e}")))?,
            prefixed_number: Regex::new(r"(?i)TU\s*-?\s*(\d+)")
                .map_err(|e| AppError::internal(format!("bad prefix pattern: {e}")))?,
            trailing_number: Regex::new(r"(\d+)$")
                .map_err(|e| AppError::internal(format!("bad suffix pattern: {e}")))?,
        })
    }

    /// Expand a listing code into its normalized variants, deduplicated,
    /// in generation order.
    pub fn normalize_code(&self, code: &str) -> Vec<String> {
        let mut variants: Vec<String> = Vec::new();
        let mut push = |candidate: String| {
            if !candidate.is_empty() && !variants.contains(&candidate) {
                variants.push(candidate);
            }
        };

        for m in self.digit_runs.find_iter(code) {
            let digits = m.as_str();
            push(digits.to_string());
            push(format!("{digits:0>4}"));
            push(digits.trim_start_matches('0').to_string());
        }

        if let Some(captures) = self.prefixed_number.captures(code) {
            let number = &captures[1];
            push(number.to_string());
            push(format!("{number:0>4}"));
        }

        push(
            code.chars()
                .filter(|c| !c.is_whitespace() && *c != '-')
                .collect(),
        );

        if let Some(captures) = self.trailing_number.captures(code) {
            push(captures[1].to_string());
        }

        variants
    }

    /// Find the best id for a code against a known id index
    ///
    /// Variants are tried in order; per variant, exact equality wins, then
    /// containment either way, then edit distance up to
    /// [`MAX_EDIT_DISTANCE`]. The first hit wins.
    pub fn find_match<'a, I>(&self, code: &str, known_ids: I) -> Option<CodeMatch>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        let variants = self.normalize_code(code);

        for variant in &variants {
            for id in known_ids.clone() {
                if id == variant {
                    return Some(CodeMatch {
                        id: id.to_string(),
                        method: MatchMethod::ExactVariant,
                        distance: 0,
                    });
                }
            }
            for id in known_ids.clone() {
                if id.contains(variant.as_str()) || variant.contains(id) {
                    return Some(CodeMatch {
                        id: id.to_string(),
                        method: MatchMethod::Containment,
                        distance: 0,
                    });
                }
            }
            for id in known_ids.clone() {
                let distance = levenshtein_distance(variant, id);
                if distance > 0 && distance <= MAX_EDIT_DISTANCE {
                    return Some(CodeMatch {
                        id: id.to_string(),
                        method: MatchMethod::EditDistance,
                        distance,
                    });
                }
            }
        }

        None
    }
}

/// Standard Levenshtein edit distance over unicode scalar values
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let len1 = s1_chars.len();
    let len2 = s2_chars.len();

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] {
                0
            } else {
                1
            };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len1][len2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_includes_padded_and_stripped_digits() {
        let matcher = CodeMatcher::new().unwrap();
        let variants = matcher.normalize_code("TU-0042");
        assert!(variants.contains(&"42".to_string()));
        assert!(variants.contains(&"0042".to_string()));
        assert!(variants.contains(&"TU0042".to_string()));
    }

    #[test]
    fn normalize_handles_plain_numeric_codes() {
        let matcher = CodeMatcher::new().unwrap();
        let variants = matcher.normalize_code("2950");
        assert_eq!(variants, vec!["2950".to_string()]);
    }

    #[test]
    fn levenshtein_matches_standard_definition() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abcde", "abcd"), 1);
    }

    #[test]
    fn exact_variant_beats_fuzzy() {
        let matcher = CodeMatcher::new().unwrap();
        let ids = ["100", "0042", "1042"];
        let found = matcher
            .find_match("TU-0042", ids.iter().copied())
            .expect("should match");
        assert_eq!(found.id, "0042");
        // Raw digits "0042" hit the padded id exactly
        assert_eq!(found.method, MatchMethod::ExactVariant);
    }

    #[test]
    fn fuzzy_match_within_two_edits() {
        let matcher = CodeMatcher::new().unwrap();
        let ids = ["29SA"];
        let found = matcher
            .find_match("2950", ids.iter().copied())
            .expect("should match");
        assert_eq!(found.method, MatchMethod::EditDistance);
        assert!(found.distance <= 2);
    }

    #[test]
    fn no_match_for_distant_codes() {
        let matcher = CodeMatcher::new().unwrap();
        let ids = ["zzzzzzz"];
        assert!(matcher.find_match("12345678", ids.iter().copied()).is_none());
    }

    #[test]
    fn first_index_entry_wins_ties() {
        let matcher = CodeMatcher::new().unwrap();
        // Both contain "42"; document order decides
        let ids = ["420", "421"];
        let found = matcher.find_match("TU-42", ids.iter().copied()).unwrap();
        assert_eq!(found.id, "420");
    }
}
