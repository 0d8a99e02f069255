//! Heuristic check that an address's components account for its raw text.
//!
//! The check is token-set containment rather than phrase matching: geocoders
//! reorder and abbreviate, so "2 Smith St, Northcote VIC 3070" is consistent
//! with components named "Victoria"/"VIC", "Northcote", "3070" and so on.

use crate::types::Component;
use std::collections::HashSet;

/// Raw tokens that should match a different component token.
const KNOWN_ALIASES: &[(&str, &str)] = &[("usa", "us")];

/// A raw token with ASCII punctuation removed, lower-cased. A token made only
/// of punctuation normalizes to the empty string, which no name matches.
fn normalize(token: &str) -> String {
    token
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .to_lowercase()
}

fn alias(token: String) -> String {
    KNOWN_ALIASES
        .iter()
        .find(|(from, _)| *from == token)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or(token)
}

fn reference_tokens<'a, I>(components: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a Component>,
{
    components
        .into_iter()
        .flat_map(|c| {
            c.long_name
                .split_whitespace()
                .chain(c.short_name.split_whitespace())
        })
        .map(str::to_lowercase)
        .collect()
}

/// Tokens of `raw` that no component name accounts for, in order of appearance.
pub fn unaccounted_tokens<'a, I>(raw: &str, components: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Component>,
{
    let reference = reference_tokens(components);
    let mut seen = HashSet::new();
    raw.split_whitespace()
        .map(normalize)
        .map(alias)
        .filter(|t| !reference.contains(t))
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Whether every token of `raw` appears in some component's long or short name.
///
/// Raw tokens lose their punctuation; component names are only lower-cased,
/// so "O'Connor" in a name does not account for "O'Connor" in the raw text,
/// and a stray "-" in the raw text is never accounted for.
pub fn is_consistent<'a, I>(raw: &str, components: I) -> bool
where
    I: IntoIterator<Item = &'a Component>,
{
    unaccounted_tokens(raw, components).is_empty()
}
