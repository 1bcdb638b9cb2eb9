//! Nearest-match suggestions for misspelled vocabulary.

use strsim::levenshtein;

/// Largest edit distance that still produces a suggestion.
pub const MAX_DISTANCE: usize = 2;

/// Closest entry of `vocabulary` within `MAX_DISTANCE`, first one wins ties.
pub fn closest<'a, I>(input: &str, vocabulary: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let (best, dist) = vocabulary
        .into_iter()
        .map(|word| (word, levenshtein(input, word)))
        .fold(None, |best: Option<(&str, usize)>, (word, dist)| match best {
            Some((_, d)) if d <= dist => best,
            _ => Some((word, dist)),
        })?;
    (dist <= MAX_DISTANCE).then_some(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_within_two_edits() {
        let verbs = ["read", "save", "send", "upload"];
        assert_eq!(closest("reed", verbs), Some("read"));
        assert_eq!(closest("uplod", verbs), Some("upload"));
        assert_eq!(closest("xyzzy", verbs), None);
    }

    #[test]
    fn ties_keep_vocabulary_order() {
        assert_eq!(closest("sad", ["save", "send"]), Some("save"));
        assert_eq!(closest("sad", ["send", "save"]), Some("send"));
        assert_eq!(closest("ass", ["as", "attach"]), Some("as"));
    }
}
