//! Release name matching
//!
//! Picks the remote release whose name is closest to a local file name. The
//! score is a distance: lower is better and identical names score zero.

use log::trace;
use std::collections::BTreeSet;

/// Distance between two release names.
///
/// Characters that appear in only one of the names cost 1.0 each, except
/// brackets and parentheses (0.5), digits (0.75) and spaces (0.1). Each
/// `.`/space separated word that appears in only one of the names adds 1.0.
/// Both terms are set differences, so `score(a, b) == score(b, a)`.
pub fn score(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    let chars_a: BTreeSet<char> = a.chars().collect();
    let chars_b: BTreeSet<char> = b.chars().collect();
    let char_term: f64 = chars_a
        .symmetric_difference(&chars_b)
        .map(|&c| char_weight(c))
        .sum();

    let words_a = words(&a);
    let words_b = words(&b);
    let word_term = words_a
        .union(&words_b)
        .map(|word| {
            let mut cost = 0.0;
            if !words_a.contains(word) {
                cost += 1.0;
            }
            if !words_b.contains(word) {
                cost += 1.0;
            }
            cost
        })
        .sum::<f64>();

    char_term + word_term
}

fn char_weight(c: char) -> f64 {
    match c {
        '[' | ']' | '(' | ')' => 0.5,
        ' ' => 0.1,
        c if c.is_numeric() => 0.75,
        _ => 1.0,
    }
}

fn words(lowercase: &str) -> BTreeSet<&str> {
    let mut set: BTreeSet<&str> = lowercase
        .split(['.', ' '])
        .filter(|word| !word.is_empty())
        .collect();
    if set.len() > 1 {
        set.remove(lowercase);
    }
    set
}

/// Remove a trailing file extension such as `.mkv` or `.srt`.
///
/// Only a short alphanumeric suffix starting with a letter counts as an
/// extension, so release tags like `.S01E02` or `.2019` are kept.
pub fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.starts_with(|c: char| c.is_ascii_alphabetic())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && !is_release_tag(ext) =>
        {
            stem
        }
        _ => name,
    }
}

fn is_release_tag(ext: &str) -> bool {
    // s01, e02, s1e2 style tags
    let bytes = ext.as_bytes();
    matches!(bytes.first(), Some(b's' | b'S' | b'e' | b'E'))
        && bytes.get(1).is_some_and(u8::is_ascii_digit)
}

/// Index of the release that best matches `file_name`.
///
/// A release equal to the file name without extension (ignoring case) wins
/// outright. Otherwise the lowest [`score`] wins and ties go to the earlier
/// release. Returns `None` for an empty list.
pub fn index_of_best_match<S: AsRef<str>>(file_name: &str, releases: &[S]) -> Option<usize> {
    let input = strip_extension(file_name);

    let mut best: Option<(usize, f64)> = None;
    for (index, release) in releases.iter().enumerate() {
        let release = release.as_ref();
        if release.eq_ignore_ascii_case(input) {
            trace!("Exact release match for '{input}' at {index}");
            return Some(index);
        }

        let value = score(input, release);
        trace!("Score {value:.2} for '{release}'");
        if best.is_none_or(|(_, lowest)| value < lowest) {
            best = Some((index, value));
        }
    }

    best.map(|(index, _)| index)
}

/// Pick the item whose release name best matches `file_name`
pub fn find_best_match<'a, T, F>(file_name: &str, items: &'a [T], release_name: F) -> Option<&'a T>
where
    F: Fn(&T) -> &str,
{
    let names: Vec<&str> = items.iter().map(&release_name).collect();
    index_of_best_match(file_name, &names).map(|index| &items[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_identical_names_score_zero() {
        let name = "Greys.Anatomy.S09.480p.HDTV.x264-mSD.mp4";
        assert_close(score(name, name), 0.0);
        assert_close(score("", ""), 0.0);
    }

    #[test]
    fn test_reference_scores() {
        let release = "Greys.Anatomy.S09.720p.HDTV.X264-DIMENSION.mp4";

        assert_close(score("Greys Anatomy s11e11.mp4", release), 15.6);
        assert_close(score(release, "Greys Anatomy s11e11.mp4"), 15.6);

        assert_close(score("Greys.Anatomy.S09.480p.HDTV.x264-mSD.mp4", release), 6.5);
        assert_close(score(release, "Greys.Anatomy.S09.480p.HDTV.x264-mSD.mp4"), 6.5);
    }

    #[test]
    fn test_scores_are_case_insensitive() {
        assert_close(score("SHOW.S01E02", "show.s01e02"), 0.0);
    }

    #[test]
    fn test_closer_release_scores_lower() {
        assert_close(score("Show.S01E02", "Show.S01E02.720p"), 2.75);
        assert_close(score("Show.S01E02", "Show.S01E02.720p.WEB"), 4.75);
        assert_close(score("Show.S01E02", "Other.Show.S01E03"), 6.5);
        assert_close(score("The.Movie.2019.1080p", "The.Movie.2019.720p"), 3.5);
        assert_close(score("The.Movie.2019.1080p", "Another.Film.2019.1080p"), 10.0);
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("Show.S01E02.mkv"), "Show.S01E02");
        assert_eq!(strip_extension("Show.S01E02"), "Show.S01E02");
        assert_eq!(strip_extension("The.Movie.2019"), "The.Movie.2019");
        assert_eq!(strip_extension("Movie.720p"), "Movie.720p");
        assert_eq!(strip_extension("subtitle.srt"), "subtitle");
        assert_eq!(strip_extension(".hidden"), ".hidden");
        assert_eq!(strip_extension("noext"), "noext");
    }

    #[test]
    fn test_exact_stem_match_wins() {
        let releases = ["Show.S01E02.720p", "show.s01e02", "Show.S01E02"];
        assert_eq!(index_of_best_match("Show.S01E02.mkv", &releases), Some(1));
    }

    #[test]
    fn test_lowest_score_wins() {
        let releases = ["Other.Show.S01E03", "Show.S01E02.720p.WEB", "Show.S01E02.720p"];
        assert_eq!(index_of_best_match("Show.S01E02.mkv", &releases), Some(2));
    }

    #[test]
    fn test_ties_go_to_first_occurrence() {
        let releases = ["Show.S01E02.720p", "Show.S01E02.720p"];
        assert_eq!(index_of_best_match("Show.S01E02.mkv", &releases), Some(0));
    }

    #[test]
    fn test_empty_list_has_no_match() {
        let releases: [&str; 0] = [];
        assert_eq!(index_of_best_match("Show.S01E02.mkv", &releases), None);
    }

    #[test]
    fn test_find_best_match_by_key() {
        #[derive(Debug, PartialEq)]
        struct Release {
            id: u32,
            name: &'static str,
        }

        let items = [
            Release { id: 1, name: "Other.Show.S01E03" },
            Release { id: 2, name: "Show.S01E02.720p" },
        ];
        let best = find_best_match("Show.S01E02.mkv", &items, |r| r.name).unwrap();
        assert_eq!(best.id, 2);
    }

    proptest! {
        #[test]
        fn prop_self_score_is_zero(name in "[a-zA-Z0-9 ._()\\[\\]-]{0,40}") {
            prop_assert!(score(&name, &name).abs() < 1e-9);
        }

        #[test]
        fn prop_score_is_symmetric(a in "[a-zA-Z0-9 ._-]{0,30}", b in "[a-zA-Z0-9 ._-]{0,30}") {
            prop_assert!((score(&a, &b) - score(&b, &a)).abs() < 1e-9);
        }

        #[test]
        fn prop_score_is_non_negative(a in "\\PC{0,30}", b in "\\PC{0,30}") {
            prop_assert!(score(&a, &b) >= 0.0);
        }
    }
}
