//! Fuzzy matching between OCR output and target phrases.
//!
//! OCR over animated game text garbles characters, drops words and merges
//! lines, so a single similarity measure misses real hits. Five strategies
//! run in order; any one clearing the threshold accepts the match. Scores
//! are 0-100.

use std::collections::BTreeSet;

/// Default acceptance threshold. Lenient, because recognition errors over
/// dynamic content are the norm rather than the exception.
pub const FUZZY_MATCH_THRESHOLD: u32 = 65;

/// Substring containment gets accepted this far below the threshold.
const CONTAINMENT_SLACK: u32 = 10;

/// Levenshtein similarity between two strings as a 0-100 score.
fn ratio(a: &str, b: &str) -> u32 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100;
    }
    let distance = levenshtein::levenshtein(a, b).min(max_len);
    (((max_len - distance) as f64 / max_len as f64) * 100.0).round() as u32
}

fn sorted_tokens(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens
}

/// Similarity after sorting words, so word order differences cost nothing.
fn token_sort_score(a: &str, b: &str) -> u32 {
    ratio(&sorted_tokens(a).join(" "), &sorted_tokens(b).join(" "))
}

/// Best similarity of the shorter string against any equally long window of
/// the longer one.
fn partial_score(a: &str, b: &str) -> u32 {
    let (short, long) = if a.chars().count() <= b.chars().count() { (a, b) } else { (b, a) };
    let short_len = short.chars().count();
    if short_len == 0 {
        return 0;
    }
    let long_chars: Vec<char> = long.chars().collect();
    if long_chars.len() == short_len {
        return ratio(short, long);
    }

    let mut best = 0;
    for start in 0..=(long_chars.len() - short_len) {
        let window: String = long_chars[start..start + short_len].iter().collect();
        best = best.max(ratio(short, &window));
    }
    best
}

/// Set-based similarity: duplicate words collapse and words present in both
/// strings never count against the score.
fn token_set_score(a: &str, b: &str) -> u32 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();

    let intersection: Vec<&str> = set_a.intersection(&set_b).copied().collect();
    let only_a: Vec<&str> = set_a.difference(&set_b).copied().collect();
    let only_b: Vec<&str> = set_b.difference(&set_a).copied().collect();

    if !intersection.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100;
    }

    let base = intersection.join(" ");
    let with_a = if only_a.is_empty() {
        base.clone()
    } else if base.is_empty() {
        only_a.join(" ")
    } else {
        format!("{} {}", base, only_a.join(" "))
    };
    let with_b = if only_b.is_empty() {
        base.clone()
    } else if base.is_empty() {
        only_b.join(" ")
    } else {
        format!("{} {}", base, only_b.join(" "))
    };

    ratio(&base, &with_a)
        .max(ratio(&base, &with_b))
        .max(ratio(&with_a, &with_b))
}

/// Checks whether two strings match under any strategy.
///
/// Returns `(is_match, score)` where the score is the strongest signal that
/// cleared the bar, or the best sub-threshold score otherwise.
pub fn fuzzy_match(target: &str, candidate: &str, threshold: u32) -> (bool, u32) {
    let a = target.trim().to_lowercase();
    let b = candidate.trim().to_lowercase();

    if a == b {
        return (true, 100);
    }

    if !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a)) {
        let shorter = a.chars().count().min(b.chars().count());
        let longer = a.chars().count().max(b.chars().count());
        let containment = (shorter * 100 / longer) as u32;
        if containment >= threshold.saturating_sub(CONTAINMENT_SLACK) {
            return (true, containment);
        }
    }

    let token_sort = token_sort_score(&a, &b);
    if token_sort >= threshold {
        return (true, token_sort);
    }

    let partial = partial_score(&a, &b);
    if partial >= threshold {
        return (true, partial);
    }

    let token_set = token_set_score(&a, &b);
    if token_set >= threshold {
        return (true, token_set);
    }

    let best = token_sort.max(partial).max(token_set);
    (best >= threshold, best)
}
