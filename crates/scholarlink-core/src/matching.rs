use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap());

/// Normalize text for identity comparison — lowercase ASCII alphanumerics only.
///
/// Steps (order matters):
/// 1. Unescape common HTML entities
/// 2. Transliterate Greek letters (NFKD leaves them non-ASCII)
/// 3. Unicode NFKD normalization (decomposes accents)
/// 4. Strip to ASCII
/// 5. Keep only `[a-zA-Z0-9]`, lowercased
pub fn normalize_text(text: &str) -> String {
    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");

    let text = transliterate_greek(&text);

    let ascii: String = text.nfkd().filter(|c| c.is_ascii()).collect();
    NON_ALNUM.replace_all(&ascii, "").to_lowercase()
}

fn transliterate_greek(text: &str) -> String {
    text.replace(['α', 'Α'], "alpha")
        .replace(['β', 'Β'], "beta")
        .replace(['γ', 'Γ'], "gamma")
        .replace(['δ', 'Δ'], "delta")
        .replace(['ε', 'Ε'], "epsilon")
        .replace(['θ', 'Θ'], "theta")
        .replace(['λ', 'Λ'], "lambda")
        .replace(['μ', 'Μ'], "mu")
        .replace(['π', 'Π'], "pi")
        .replace(['σ', 'ς', 'Σ'], "sigma")
        .replace(['τ', 'Τ'], "tau")
        .replace(['φ', 'Φ'], "phi")
        .replace(['ω', 'Ω'], "omega")
}

/// How strongly a cited surname matched a reference author.
///
/// Variants are ordered weakest first so that `max()` picks the best match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SurnameMatch {
    Fuzzy,
    Prefix,
    Exact,
}

/// Minimum normalized length for a prefix match to count.
pub const MIN_PREFIX_LEN: usize = 3;

/// Compare a surname as written in a citation against a reference author's
/// surname.
///
/// Both sides are normalized with [`normalize_text`]. A prefix match needs
/// the reference surname to start with the cited one (`Smith` finds
/// `Smithson`, not the reverse). Returns the strongest applicable match, or
/// `None` when nothing matches.
pub fn match_surname(cited: &str, candidate: &str, fuzzy_threshold: f64) -> Option<SurnameMatch> {
    let a = normalize_text(cited);
    let b = normalize_text(candidate);
    if a.is_empty() || b.is_empty() {
        return None;
    }

    if a == b {
        return Some(SurnameMatch::Exact);
    }

    if a.len() >= MIN_PREFIX_LEN && b.starts_with(a.as_str()) {
        return Some(SurnameMatch::Prefix);
    }

    let score = rapidfuzz::fuzz::ratio(a.chars(), b.chars());
    if score >= fuzzy_threshold {
        return Some(SurnameMatch::Fuzzy);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize_text("Hello, World! 123"), "helloworld123");
    }

    #[test]
    fn test_normalize_html_entities() {
        assert_eq!(normalize_text("Foo &amp; Bar"), "foobar");
    }

    #[test]
    fn test_normalize_accents() {
        assert_eq!(normalize_text("Müller"), "muller");
        assert_eq!(normalize_text("résumé"), "resume");
    }

    #[test]
    fn test_normalize_greek() {
        assert_eq!(normalize_text("αdiff"), "alphadiff");
    }

    #[test]
    fn test_match_exact_after_normalization() {
        assert_eq!(
            match_surname("Müller", "muller", 0.85),
            Some(SurnameMatch::Exact)
        );
    }

    #[test]
    fn test_match_prefix() {
        assert_eq!(
            match_surname("Smith", "Smithson", 0.85),
            Some(SurnameMatch::Prefix)
        );
    }

    #[test]
    fn test_prefix_only_from_cited_side() {
        assert_eq!(match_surname("Smithson", "Smith", 0.85), None);
    }

    #[test]
    fn test_short_prefix_does_not_count() {
        // "Li" is a prefix of "Lin" but too short; fuzzy ratio is 0.8
        assert_eq!(match_surname("Li", "Lin", 0.85), None);
    }

    #[test]
    fn test_match_fuzzy_typo() {
        assert_eq!(
            match_surname("Johnson", "Jonson", 0.85),
            Some(SurnameMatch::Fuzzy)
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(match_surname("Smith", "Brown", 0.85), None);
        assert_eq!(match_surname("", "Brown", 0.85), None);
    }

    #[test]
    fn test_strength_ordering() {
        assert!(SurnameMatch::Exact > SurnameMatch::Prefix);
        assert!(SurnameMatch::Prefix > SurnameMatch::Fuzzy);
    }
}
