//! Author-year citation resolution.
//!
//! Kept free of any text scanning so the matching rules can be tested on
//! their own.

use scholarlink_core::Reference;
use scholarlink_core::authors::surname_variants;
use scholarlink_core::matching::{SurnameMatch, match_surname};

/// A reference that matched the cited surname and year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Index into the reference list.
    pub index: usize,
    pub strength: SurnameMatch,
}

/// Every candidate for an author-year citation plus the chosen one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Candidates in reference-list order.
    pub candidates: Vec<Candidate>,
    pub chosen: Option<usize>,
}

/// Resolve `surname (year)` against `references`.
///
/// A reference is a candidate when its year equals `year` and any of its
/// authors' surnames matches (see [`match_surname`]). The strongest match
/// wins (`Exact > Prefix > Fuzzy`); ties go to the earliest reference.
pub fn resolve_author_year(
    references: &[Reference],
    surname: &str,
    year: i32,
    fuzzy_threshold: f64,
) -> Resolution {
    let candidates: Vec<Candidate> = references
        .iter()
        .enumerate()
        .filter(|(_, r)| r.year == Some(year))
        .filter_map(|(index, r)| {
            r.authors
                .iter()
                .flat_map(surname_variants)
                .filter_map(|s| match_surname(surname, &s, fuzzy_threshold))
                .max()
                .map(|strength| Candidate { index, strength })
        })
        .collect();

    let mut chosen: Option<Candidate> = None;
    for candidate in &candidates {
        if chosen.is_none_or(|best| candidate.strength > best.strength) {
            chosen = Some(*candidate);
        }
    }

    Resolution {
        chosen: chosen.map(|c| c.index),
        candidates,
    }
}
