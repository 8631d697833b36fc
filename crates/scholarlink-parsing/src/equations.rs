//! LaTeX equation detection.
//!
//! A single left-to-right scan finds the earliest opening delimiter, looks
//! for its matching closer, and either records an [`Equation`] or skips the
//! opener. Matches never overlap.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use scholarlink_core::{Equation, EquationType};

use crate::config::ParsingConfig;
use crate::text::{Paragraph, paragraph_at, sentence_spans, split_paragraphs};

/// Greek letters, big operators, functions, style commands and a few
/// frequent structural commands.
pub const DEFAULT_SYMBOLS: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta", "theta",
    "vartheta", "iota", "kappa", "lambda", "mu", "nu", "xi", "omicron", "pi", "varpi", "rho",
    "varrho", "sigma", "varsigma", "tau", "upsilon", "phi", "varphi", "chi", "psi", "omega",
    "Gamma", "Delta", "Theta", "Lambda", "Xi", "Pi", "Sigma", "Upsilon", "Phi", "Psi", "Omega",
    "sum", "prod", "int", "oint", "frac", "sqrt", "partial", "mathcal", "mathbf", "mathrm",
    "infty", "nabla", "cdot", "left", "right", "text",
];

pub const DEFAULT_DEFINITION_KEYWORDS: &[&str] = &["definition"];
pub const DEFAULT_THEOREM_KEYWORDS: &[&str] = &["theorem"];

/// Opening delimiters. Alternation order decides ties at the same position.
static OPENER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\\[|\\begin\{(equation|align\*?|eqnarray\*?)\}|\$\$|\\\(|\$").unwrap()
});

static COMMAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([A-Za-z]+)").unwrap());

/// Result of one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Equations in order of appearance.
    pub equations: Vec<Equation>,
    /// Opening delimiters that were unterminated or enclosed nothing.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opener<'a> {
    Bracket,
    Environment(&'a str),
    DoubleDollar,
    Paren,
    Dollar,
}

impl Opener<'_> {
    fn is_display(&self) -> bool {
        matches!(
            self,
            Opener::Bracket | Opener::Environment(_) | Opener::DoubleDollar
        )
    }
}

/// Finds and classifies LaTeX-delimited equations.
#[derive(Debug, Clone)]
pub struct EquationExtractor {
    context_sentences: usize,
    definition_keywords: Vec<String>,
    theorem_keywords: Vec<String>,
    catalog: HashSet<String>,
}

impl Default for EquationExtractor {
    fn default() -> Self {
        Self::new(&ParsingConfig::default())
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl EquationExtractor {
    pub fn new(config: &ParsingConfig) -> Self {
        let lower = |v: Vec<String>| -> Vec<String> {
            v.into_iter().map(|k| k.to_lowercase()).collect()
        };
        Self {
            context_sentences: config.equations.context_sentences,
            definition_keywords: lower(
                config
                    .definition_keywords
                    .resolve(&owned(DEFAULT_DEFINITION_KEYWORDS)),
            ),
            theorem_keywords: lower(
                config
                    .theorem_keywords
                    .resolve(&owned(DEFAULT_THEOREM_KEYWORDS)),
            ),
            catalog: config
                .symbol_catalog
                .resolve(&owned(DEFAULT_SYMBOLS))
                .into_iter()
                .collect(),
        }
    }

    /// Scan `text` once and return every well-formed equation.
    ///
    /// Unterminated or empty delimiters are logged and counted in
    /// [`ExtractionReport::skipped`]; scanning resumes right after the
    /// offending opener.
    pub fn extract(&self, text: &str) -> ExtractionReport {
        let paragraphs = split_paragraphs(text);
        let mut report = ExtractionReport::default();
        let mut pos = 0;

        while let Some(caps) = OPENER.captures_at(text, pos) {
            let Some(whole) = caps.get(0) else { break };
            let (open_start, open_end) = (whole.start(), whole.end());

            if whole.as_str().starts_with('$') && is_escaped(text, open_start) {
                pos = open_start + 1;
                continue;
            }

            let opener = match whole.as_str() {
                r"\[" => Opener::Bracket,
                "$$" => Opener::DoubleDollar,
                r"\(" => Opener::Paren,
                "$" => Opener::Dollar,
                _ => match caps.get(1) {
                    Some(env) => Opener::Environment(env.as_str()),
                    None => {
                        pos = open_end;
                        continue;
                    }
                },
            };

            let para_index = paragraph_at(&paragraphs, open_start);
            let limit = match (opener, para_index) {
                (Opener::Dollar | Opener::Paren, Some(i)) => paragraphs[i].end(),
                _ => text.len(),
            };

            let Some((body_end, close_end)) = find_closer(text, opener, open_end, limit) else {
                tracing::warn!(
                    offset = open_start,
                    delimiter = whole.as_str(),
                    "skipping unterminated equation delimiter"
                );
                report.skipped += 1;
                pos = open_end;
                continue;
            };

            let body = &text[open_end..body_end];
            if body.trim().is_empty() {
                tracing::warn!(
                    offset = open_start,
                    delimiter = whole.as_str(),
                    "skipping empty equation"
                );
                report.skipped += 1;
                pos = open_end;
                continue;
            }

            let equation_type = if opener.is_display() {
                self.classify_display(text, &paragraphs, para_index, open_start)
            } else {
                EquationType::Inline
            };

            let raw_text = &text[open_start..close_end];
            tracing::debug!(%equation_type, raw = raw_text, "found equation");
            report.equations.push(Equation {
                raw_text: raw_text.to_string(),
                symbols: self.extract_symbols(body),
                equation_type,
                context: self.context(text, &paragraphs, open_start, close_end),
            });
            pos = close_end;
        }

        report
    }

    /// Catalog command names (without backslash) used in `body`.
    pub fn extract_symbols(&self, body: &str) -> BTreeSet<String> {
        COMMAND
            .captures_iter(body)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str())
            .filter(|name| self.catalog.contains(*name))
            .map(str::to_string)
            .collect()
    }

    fn classify_display(
        &self,
        text: &str,
        paragraphs: &[Paragraph<'_>],
        para_index: Option<usize>,
        eq_start: usize,
    ) -> EquationType {
        let lead_in = match para_index {
            Some(i) => {
                let same = &text[paragraphs[i].start..eq_start];
                if !same.trim().is_empty() {
                    Some(same)
                } else if i > 0 {
                    Some(paragraphs[i - 1].text)
                } else {
                    None
                }
            }
            None => None,
        };
        let Some(lead_in) = lead_in else {
            return EquationType::Display;
        };

        let lead_in = lead_in.to_lowercase();
        if self
            .definition_keywords
            .iter()
            .any(|k| lead_in.contains(k.as_str()))
        {
            EquationType::Definition
        } else if self
            .theorem_keywords
            .iter()
            .any(|k| lead_in.contains(k.as_str()))
        {
            EquationType::Theorem
        } else {
            EquationType::Display
        }
    }

    /// `context_sentences` sentences on each side of the equation. Text in
    /// the equation's own paragraph is preferred; when the equation opens or
    /// closes its paragraph, the neighbouring paragraph is used instead.
    fn context(
        &self,
        text: &str,
        paragraphs: &[Paragraph<'_>],
        start: usize,
        end: usize,
    ) -> Option<String> {
        let n = self.context_sentences;
        if n == 0 {
            return None;
        }

        let first = paragraph_at(paragraphs, start);
        let last = paragraph_at(paragraphs, end.saturating_sub(1));

        let before_text = first.and_then(|i| {
            let same = &text[paragraphs[i].start..start];
            if !same.trim().is_empty() {
                Some(same)
            } else {
                i.checked_sub(1).map(|p| paragraphs[p].text)
            }
        });
        let after_text = last.and_then(|i| {
            let same = &text[end..paragraphs[i].end()];
            if !same.trim().is_empty() {
                Some(same)
            } else {
                paragraphs.get(i + 1).map(|p| p.text)
            }
        });

        let before = before_text
            .map(|t| {
                let spans = sentence_spans(t);
                let from = spans.len().saturating_sub(n);
                spans[from..]
                    .iter()
                    .map(|&(s, e)| t[s..e].trim())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();
        let after = after_text
            .map(|t| {
                sentence_spans(t)
                    .iter()
                    .take(n)
                    .map(|&(s, e)| t[s..e].trim())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        if before.is_empty() && after.is_empty() {
            return None;
        }

        let parts: Vec<&str> = [before.as_str(), &text[start..end], after.as_str()]
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect();
        Some(parts.join(" "))
    }
}

/// Whether the character at `pos` is preceded by an odd number of backslashes.
fn is_escaped(text: &str, pos: usize) -> bool {
    text[..pos]
        .bytes()
        .rev()
        .take_while(|&b| b == b'\\')
        .count()
        % 2
        == 1
}

/// Find the closer for `opener`, searching `text[from..limit]`.
/// Returns `(body_end, close_end)` as byte offsets.
fn find_closer(text: &str, opener: Opener<'_>, from: usize, limit: usize) -> Option<(usize, usize)> {
    let haystack = &text[from..limit];
    let found = |needle: &str| {
        haystack
            .find(needle)
            .map(|i| (from + i, from + i + needle.len()))
    };

    match opener {
        Opener::Bracket => found(r"\]"),
        Opener::Paren => found(r"\)"),
        Opener::Environment(env) => found(&format!(r"\end{{{env}}}")),
        Opener::DoubleDollar => find_unescaped(text, "$$", from, limit),
        Opener::Dollar => find_unescaped(text, "$", from, limit),
    }
}

fn find_unescaped(text: &str, needle: &str, from: usize, limit: usize) -> Option<(usize, usize)> {
    let mut cursor = from;
    while let Some(i) = text[cursor..limit].find(needle) {
        let at = cursor + i;
        if !is_escaped(text, at) {
            return Some((at, at + needle.len()));
        }
        cursor = at + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParsingConfigBuilder;

    fn extract(text: &str) -> ExtractionReport {
        EquationExtractor::default().extract(text)
    }

    #[test]
    fn test_display_dollar_without_symbols() {
        let report = extract("Einstein: $$E=mc^2$$ end.");
        assert_eq!(report.equations.len(), 1);
        let eq = &report.equations[0];
        assert_eq!(eq.raw_text, "$$E=mc^2$$");
        assert_eq!(eq.equation_type, EquationType::Display);
        assert!(eq.symbols.is_empty());
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn test_inline_and_display_in_order() {
        let report = extract(r"Let $\alpha$ be small. Then \[ \sum_i x_i \] holds.");
        let raws: Vec<&str> = report.equations.iter().map(|e| e.raw_text.as_str()).collect();
        assert_eq!(raws, vec![r"$\alpha$", r"\[ \sum_i x_i \]"]);
        assert_eq!(report.equations[0].equation_type, EquationType::Inline);
        assert_eq!(report.equations[1].equation_type, EquationType::Display);
    }

    #[test]
    fn test_symbols_use_catalog_only() {
        let report = extract(r"$$\frac{\partial f}{\partial x} + \foo + \Omega$$");
        let symbols: Vec<&str> = report.equations[0]
            .symbols
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(symbols, vec!["Omega", "frac", "partial"]);
    }

    #[test]
    fn test_environments() {
        let text = "\\begin{align*}a &= b\\\\ c &= d\\end{align*} and \\begin{equation}\\int f\\end{equation}";
        let report = extract(text);
        assert_eq!(report.equations.len(), 2);
        assert!(report.equations[0].raw_text.starts_with(r"\begin{align*}"));
        assert!(report.equations[0].raw_text.ends_with(r"\end{align*}"));
        assert!(report.equations[1].symbols.contains("int"));
    }

    #[test]
    fn test_environment_closes_on_same_name() {
        let report = extract(r"\begin{align}x\end{align*} y\end{align}");
        assert_eq!(report.equations.len(), 1);
        assert_eq!(
            report.equations[0].raw_text,
            r"\begin{align}x\end{align*} y\end{align}"
        );
    }

    #[test]
    fn test_escaped_dollar_is_literal() {
        let report = extract(r"It costs \$5 and \$10, but $x$ is math.");
        assert_eq!(report.equations.len(), 1);
        assert_eq!(report.equations[0].raw_text, "$x$");
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn test_unterminated_is_skipped_and_scan_continues() {
        let report = extract(r"Broken \[ x + y and then $z$ later.");
        assert_eq!(report.skipped, 1);
        assert_eq!(report.equations.len(), 1);
        assert_eq!(report.equations[0].raw_text, "$z$");
    }

    #[test]
    fn test_inline_does_not_cross_paragraphs() {
        let report = extract("Price $5 here.\n\nAnd $y$ there.");
        assert_eq!(report.skipped, 1);
        assert_eq!(report.equations.len(), 1);
        assert_eq!(report.equations[0].raw_text, "$y$");
    }

    #[test]
    fn test_empty_delimiters_are_skipped() {
        let report = extract("Nothing $$  $$ here.");
        assert!(report.equations.is_empty());
        assert!(report.skipped >= 1);
    }

    #[test]
    fn test_definition_and_theorem_from_lead_in() {
        let text = "Definition 1. The norm is\n\n$$\\|x\\| = \\sqrt{x^T x}$$\n\nBy Theorem 2 we get \\[ a \\le b \\]";
        let report = extract(text);
        assert_eq!(report.equations[0].equation_type, EquationType::Definition);
        assert_eq!(report.equations[1].equation_type, EquationType::Theorem);
    }

    #[test]
    fn test_definition_checked_before_theorem() {
        let report = extract("This theorem uses a definition: $$x = y$$");
        assert_eq!(report.equations[0].equation_type, EquationType::Definition);
    }

    #[test]
    fn test_inline_is_never_reclassified() {
        let report = extract("Definition: $x$ is a variable.");
        assert_eq!(report.equations[0].equation_type, EquationType::Inline);
    }

    #[test]
    fn test_custom_keywords() {
        let config = ParsingConfigBuilder::new()
            .add_theorem_keyword("Lemma".into())
            .build()
            .unwrap();
        let report = EquationExtractor::new(&config).extract("Lemma 3 states $$a < b$$");
        assert_eq!(report.equations[0].equation_type, EquationType::Theorem);
    }

    #[test]
    fn test_context_one_sentence_each_side() {
        let text = "Far away. We know that $$E=mc^2$$ holds here. Unrelated tail.";
        let eq = &extract(text).equations[0];
        assert_eq!(
            eq.context.as_deref(),
            Some("We know that $$E=mc^2$$ holds here.")
        );
    }

    #[test]
    fn test_context_uses_neighbour_paragraphs() {
        let text = "Intro. The energy is\n\n$$E=mc^2$$\n\nwhere c is light speed. More.";
        let eq = &extract(text).equations[0];
        assert_eq!(
            eq.context.as_deref(),
            Some("The energy is $$E=mc^2$$ where c is light speed.")
        );
    }

    #[test]
    fn test_context_absent_without_surrounding_text() {
        let eq = &extract("$$x+y$$").equations[0];
        assert_eq!(eq.context, None);
    }

    #[test]
    fn test_zero_context_sentences() {
        let config = ParsingConfigBuilder::new().context_sentences(0).build().unwrap();
        let report = EquationExtractor::new(&config).extract("Before $$x$$ after.");
        assert_eq!(report.equations[0].context, None);
    }

    #[test]
    fn test_latex_inline_parens() {
        let report = extract(r"Inline \( \beta \) too.");
        assert_eq!(report.equations[0].raw_text, r"\( \beta \)");
        assert_eq!(report.equations[0].equation_type, EquationType::Inline);
    }
}
