use once_cell::sync::Lazy;
use regex::Regex;

/// Well-formed bare DOI: `10.<registrant>/<suffix>`.
static DOI_SHAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^10\.\d{4,9}/\S+$").unwrap());

static URL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:https?://(?:dx\.)?doi\.org/|doi:\s*)").unwrap());

/// Check whether `doi` is a well-formed bare DOI.
pub fn is_valid_doi(doi: &str) -> bool {
    DOI_SHAPE.is_match(doi.trim())
}

/// Normalize a DOI for comparison: strip URL / `doi:` prefixes, trailing
/// punctuation, and lowercase (DOIs are case-insensitive).
pub fn normalize_doi(doi: &str) -> String {
    let doi = URL_PREFIX.replace(doi.trim(), "");
    clean_doi(&doi).to_lowercase()
}

/// Strip trailing punctuation and unbalanced closing brackets from a DOI.
fn clean_doi(doi: &str) -> String {
    let mut doi = doi.trim_end_matches(['.', ',', ';', ':']);

    loop {
        let before = doi.len();
        for (open, close) in [('(', ')'), ('[', ']'), ('{', '}')] {
            if doi.ends_with(close) && doi.matches(close).count() > doi.matches(open).count() {
                doi = &doi[..doi.len() - 1];
                doi = doi.trim_end_matches(['.', ',', ';', ':']);
            }
        }
        if doi.len() == before {
            break;
        }
    }

    doi.to_string()
}

/// Extract a DOI from free text.
///
/// Handles formats like:
/// - `10.1234/example`
/// - `doi:10.1234/example`
/// - `https://doi.org/10.1234/example`
/// - `http://dx.doi.org/10.1234/example`
///
/// DOIs containing parentheses (e.g. `10.1016/0021-9681(87)90171-8`) are kept
/// whole; unbalanced trailing brackets are dropped.
pub fn extract_doi(text: &str) -> Option<String> {
    static URL_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)https?://(?:dx\.)?doi\.org/(10\.\d{4,}/[^\s\]>},]+)").unwrap()
    });
    if let Some(caps) = URL_RE.captures(text) {
        return caps.get(1).map(|m| clean_doi(m.as_str()));
    }

    static DOI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"10\.\d{4,}/[^\s\]>},]+").unwrap());
    DOI_RE.find(text).map(|m| clean_doi(m.as_str()))
}

/// Extract an arXiv identifier (`arXiv:2301.12345v2`, `arxiv.org/abs/...`).
pub fn extract_arxiv_id(text: &str) -> Option<String> {
    static ARXIV_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)(?:arxiv\.org/abs/|arxiv:\s*)(\d{4}\.\d{4,5}(?:v\d+)?|[a-z\-]+/\d{7})")
            .unwrap()
    });
    ARXIV_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
