//! Ranking autocomplete suggestions against the focused input.

use arbor_core::AutocompleteChoice;

use crate::handler::AutocompleteResponse;

/// Platform limit on choices per response.
pub const MAX_CHOICES: usize = 10;
/// Above this many matches the user is asked to refine the query.
pub const MAX_MATCHES: usize = 500;

pub const NO_RESULTS: &str = "Search returned no results. Please try again with a different query.";
pub const TOO_MANY_RESULTS: &str =
    "Search returned too many results (over 500). Please refine your search results.";
/// Value sent with placeholder choices.
pub const PLACEHOLDER_VALUE: &str = "null";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchRank {
    Prefix,
    WordPrefix,
    Substring,
    Subsequence,
}

fn match_rank(haystack: &str, needle: &str) -> Option<MatchRank> {
    if haystack.starts_with(needle) {
        return Some(MatchRank::Prefix);
    }
    if haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word.starts_with(needle))
    {
        return Some(MatchRank::WordPrefix);
    }
    if haystack.contains(needle) {
        return Some(MatchRank::Substring);
    }

    let mut remaining = haystack.chars();
    needle
        .chars()
        .all(|wanted| remaining.any(|c| c == wanted))
        .then_some(MatchRank::Subsequence)
}

fn placeholder(name: &str) -> Vec<AutocompleteChoice> {
    vec![AutocompleteChoice::new(name, PLACEHOLDER_VALUE)]
}

/// The choices to send for `needle`.
///
/// Matching is case-insensitive. Better matches come first; equal matches
/// keep the handler's order.
pub fn rank_choices(needle: &str, response: AutocompleteResponse) -> Vec<AutocompleteChoice> {
    let limit = response.per_page.unwrap_or(MAX_CHOICES).min(MAX_CHOICES);

    if response.results.is_empty() {
        return placeholder(NO_RESULTS);
    }
    if needle.is_empty() && response.allow_empty_search {
        return response.results.into_iter().take(limit).collect();
    }

    let needle = needle.to_lowercase();
    let mut matches: Vec<(MatchRank, AutocompleteChoice)> = response
        .results
        .into_iter()
        .filter_map(|choice| {
            match_rank(&choice.name.to_lowercase(), &needle).map(|rank| (rank, choice))
        })
        .collect();

    if matches.is_empty() {
        return placeholder(NO_RESULTS);
    }
    if matches.len() > MAX_MATCHES {
        return placeholder(TOO_MANY_RESULTS);
    }

    matches.sort_by_key(|(rank, _)| *rank);
    matches
        .into_iter()
        .take(limit)
        .map(|(_, choice)| choice)
        .collect()
}
