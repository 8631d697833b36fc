use regex::Regex;
use scholarlink_core::{CitationSettings, Config, EquationSettings};

/// How a configured list relates to its built-in defaults.
#[derive(Debug, Clone, Default)]
pub enum ListOverride<T> {
    /// Keep the defaults.
    #[default]
    Default,
    /// Use only these values.
    Replace(Vec<T>),
    /// Defaults followed by these values.
    Extend(Vec<T>),
}

impl<T: Clone> ListOverride<T> {
    pub fn resolve(&self, defaults: &[T]) -> Vec<T> {
        match self {
            ListOverride::Default => defaults.to_vec(),
            ListOverride::Replace(v) => v.clone(),
            ListOverride::Extend(v) => {
                let mut result = defaults.to_vec();
                result.extend(v.iter().cloned());
                result
            }
        }
    }

    fn push(&mut self, value: T) {
        match self {
            ListOverride::Extend(v) | ListOverride::Replace(v) => v.push(value),
            ListOverride::Default => *self = ListOverride::Extend(vec![value]),
        }
    }
}

/// Patterns for locating and splitting a bibliography. `None` keeps the
/// built-in pattern.
#[derive(Debug, Clone)]
pub(crate) struct BibliographyPatterns {
    /// `References` / `Bibliography` heading.
    pub(crate) heading: Option<Regex>,
    /// First heading after the bibliography (appendix, acknowledgments).
    pub(crate) end: Option<Regex>,
    /// Share of the text skipped before the tail is taken as the
    /// bibliography when no heading matches.
    pub(crate) tail_fraction: f64,
    /// `[n]` entry markers; group 1 is the number.
    pub(crate) bracketed_entry: Option<Regex>,
    /// `n.` entry markers at line start; group 1 is the number.
    pub(crate) numbered_entry: Option<Regex>,
    /// Separator between unnumbered entries.
    pub(crate) entry_break: Option<Regex>,
}

impl Default for BibliographyPatterns {
    fn default() -> Self {
        Self {
            heading: None,
            end: None,
            tail_fraction: 0.7,
            bracketed_entry: None,
            numbered_entry: None,
            entry_break: None,
        }
    }
}

/// Settings shared by citation linking, equation extraction and
/// bibliography parsing. Build one with [`ParsingConfigBuilder`] to change
/// keyword lists or bibliography patterns.
#[derive(Debug, Clone)]
pub struct ParsingConfig {
    pub(crate) citations: CitationSettings,
    pub(crate) equations: EquationSettings,
    /// Words in the preceding paragraph that mark a definition.
    pub(crate) definition_keywords: ListOverride<String>,
    /// Words in the preceding paragraph that mark a theorem.
    pub(crate) theorem_keywords: ListOverride<String>,
    /// LaTeX command names (without backslash) recorded as symbols.
    pub(crate) symbol_catalog: ListOverride<String>,
    pub(crate) bibliography: BibliographyPatterns,
    /// Authors kept per parsed reference.
    pub(crate) max_authors: usize,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            citations: CitationSettings::default(),
            equations: EquationSettings::default(),
            definition_keywords: ListOverride::Default,
            theorem_keywords: ListOverride::Default,
            symbol_catalog: ListOverride::Default,
            bibliography: BibliographyPatterns::default(),
            max_authors: 15,
        }
    }
}

impl From<&Config> for ParsingConfig {
    fn from(config: &Config) -> Self {
        Self {
            citations: config.citations.clone(),
            equations: config.equations.clone(),
            ..Self::default()
        }
    }
}

impl ParsingConfig {
    pub fn citations(&self) -> &CitationSettings {
        &self.citations
    }

    pub fn equations(&self) -> &EquationSettings {
        &self.equations
    }
}

/// Uncompiled bibliography patterns held by the builder.
#[derive(Debug, Clone, Default)]
struct PatternSources {
    heading: Option<String>,
    end: Option<String>,
    tail_fraction: Option<f64>,
    bracketed_entry: Option<String>,
    numbered_entry: Option<String>,
    entry_break: Option<String>,
}

impl PatternSources {
    fn compile(self) -> Result<BibliographyPatterns, regex::Error> {
        fn compile_one(pattern: Option<String>) -> Result<Option<Regex>, regex::Error> {
            pattern.map(|p| Regex::new(&p)).transpose()
        }

        let defaults = BibliographyPatterns::default();
        Ok(BibliographyPatterns {
            heading: compile_one(self.heading)?,
            end: compile_one(self.end)?,
            tail_fraction: self.tail_fraction.unwrap_or(defaults.tail_fraction),
            bracketed_entry: compile_one(self.bracketed_entry)?,
            numbered_entry: compile_one(self.numbered_entry)?,
            entry_break: compile_one(self.entry_break)?,
        })
    }
}

/// Builder for [`ParsingConfig`].
///
/// Patterns are given as strings and compiled by [`build`](Self::build),
/// which returns the first `regex::Error`.
#[derive(Debug, Clone, Default)]
pub struct ParsingConfigBuilder {
    context_window: Option<usize>,
    max_range_span: Option<usize>,
    fuzzy_surname_threshold: Option<f64>,
    context_sentences: Option<usize>,
    definition_keywords: ListOverride<String>,
    theorem_keywords: ListOverride<String>,
    symbol_catalog: ListOverride<String>,
    patterns: PatternSources,
    max_authors: Option<usize>,
}

impl ParsingConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed scalar settings from a resolved [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self {
            context_window: Some(config.citations.context_window),
            max_range_span: Some(config.citations.max_range_span),
            fuzzy_surname_threshold: Some(config.citations.fuzzy_surname_threshold),
            context_sentences: Some(config.equations.context_sentences),
            ..Self::default()
        }
    }

    // ── Citations ──

    pub fn context_window(mut self, chars: usize) -> Self {
        self.context_window = Some(chars);
        self
    }

    pub fn max_range_span(mut self, span: usize) -> Self {
        self.max_range_span = Some(span);
        self
    }

    pub fn fuzzy_surname_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_surname_threshold = Some(threshold);
        self
    }

    // ── Equations ──

    pub fn context_sentences(mut self, n: usize) -> Self {
        self.context_sentences = Some(n);
        self
    }

    pub fn set_definition_keywords(mut self, keywords: Vec<String>) -> Self {
        self.definition_keywords = ListOverride::Replace(keywords);
        self
    }

    pub fn add_definition_keyword(mut self, keyword: String) -> Self {
        self.definition_keywords.push(keyword);
        self
    }

    pub fn set_theorem_keywords(mut self, keywords: Vec<String>) -> Self {
        self.theorem_keywords = ListOverride::Replace(keywords);
        self
    }

    pub fn add_theorem_keyword(mut self, keyword: String) -> Self {
        self.theorem_keywords.push(keyword);
        self
    }

    pub fn set_symbol_catalog(mut self, symbols: Vec<String>) -> Self {
        self.symbol_catalog = ListOverride::Replace(symbols);
        self
    }

    pub fn add_symbol(mut self, symbol: String) -> Self {
        self.symbol_catalog.push(symbol);
        self
    }

    // ── Bibliography ──

    pub fn bibliography_heading(mut self, pattern: &str) -> Self {
        self.patterns.heading = Some(pattern.to_string());
        self
    }

    pub fn bibliography_end(mut self, pattern: &str) -> Self {
        self.patterns.end = Some(pattern.to_string());
        self
    }

    /// Clamped to `0.0..=1.0` when used.
    pub fn tail_fraction(mut self, fraction: f64) -> Self {
        self.patterns.tail_fraction = Some(fraction);
        self
    }

    pub fn bracketed_entry(mut self, pattern: &str) -> Self {
        self.patterns.bracketed_entry = Some(pattern.to_string());
        self
    }

    pub fn numbered_entry(mut self, pattern: &str) -> Self {
        self.patterns.numbered_entry = Some(pattern.to_string());
        self
    }

    pub fn entry_break(mut self, pattern: &str) -> Self {
        self.patterns.entry_break = Some(pattern.to_string());
        self
    }

    pub fn max_authors(mut self, n: usize) -> Self {
        self.max_authors = Some(n);
        self
    }

    pub fn build(self) -> Result<ParsingConfig, regex::Error> {
        let defaults = ParsingConfig::default();

        Ok(ParsingConfig {
            citations: CitationSettings {
                context_window: self
                    .context_window
                    .unwrap_or(defaults.citations.context_window),
                max_range_span: self
                    .max_range_span
                    .unwrap_or(defaults.citations.max_range_span),
                fuzzy_surname_threshold: self
                    .fuzzy_surname_threshold
                    .unwrap_or(defaults.citations.fuzzy_surname_threshold),
            },
            equations: EquationSettings {
                context_sentences: self
                    .context_sentences
                    .unwrap_or(defaults.equations.context_sentences),
            },
            definition_keywords: self.definition_keywords,
            theorem_keywords: self.theorem_keywords,
            symbol_catalog: self.symbol_catalog,
            bibliography: self.patterns.compile()?,
            max_authors: self.max_authors.unwrap_or(defaults.max_authors),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParsingConfig::default();
        assert_eq!(config.citations.context_window, 100);
        assert_eq!(config.citations.max_range_span, 50);
        assert_eq!(config.equations.context_sentences, 1);
        assert!((config.bibliography.tail_fraction - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_builder_scalars() {
        let config = ParsingConfigBuilder::new()
            .context_window(20)
            .max_range_span(5)
            .context_sentences(0)
            .max_authors(3)
            .build()
            .unwrap();
        assert_eq!(config.citations.context_window, 20);
        assert_eq!(config.citations.max_range_span, 5);
        assert_eq!(config.equations.context_sentences, 0);
        assert_eq!(config.max_authors, 3);
    }

    #[test]
    fn test_builder_from_config() {
        let mut core = Config::default();
        core.citations.context_window = 42;
        let config = ParsingConfigBuilder::from_config(&core).build().unwrap();
        assert_eq!(config.citations.context_window, 42);
        assert_eq!(ParsingConfig::from(&core).citations.context_window, 42);
    }

    #[test]
    fn test_invalid_pattern_fails_build() {
        assert!(ParsingConfigBuilder::new().bibliography_heading(r"[invalid").build().is_err());
        assert!(ParsingConfigBuilder::new().entry_break(r"(").build().is_err());
    }

    #[test]
    fn test_keyword_overrides() {
        let config = ParsingConfigBuilder::new()
            .add_theorem_keyword("lemma".into())
            .add_theorem_keyword("corollary".into())
            .set_definition_keywords(vec!["def.".into()])
            .build()
            .unwrap();
        let defaults = vec!["theorem".to_string()];
        assert_eq!(
            config.theorem_keywords.resolve(&defaults),
            vec!["theorem", "lemma", "corollary"]
        );
        assert_eq!(
            config.definition_keywords.resolve(&["definition".to_string()]),
            vec!["def."]
        );
    }

    #[test]
    fn test_list_override_variants() {
        let defaults = vec!["a".to_string(), "b".to_string()];

        let d: ListOverride<String> = ListOverride::Default;
        assert_eq!(d.resolve(&defaults), defaults);

        let r: ListOverride<String> = ListOverride::Replace(vec!["x".to_string()]);
        assert_eq!(r.resolve(&defaults), vec!["x".to_string()]);

        let e: ListOverride<String> = ListOverride::Extend(vec!["c".to_string()]);
        assert_eq!(
            e.resolve(&defaults),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
