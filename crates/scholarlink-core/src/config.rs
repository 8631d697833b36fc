use std::path::PathBuf;

use crate::config_file::ConfigFile;
use crate::validation::ValidationLevel;

/// Default characters of context captured on each side of a citation.
pub const DEFAULT_CONTEXT_WINDOW: usize = 100;
/// Widest numeric range (`[n-m]`) that is expanded into individual links.
pub const DEFAULT_MAX_RANGE_SPAN: usize = 50;
/// Minimum `rapidfuzz` ratio for a fuzzy surname match.
pub const DEFAULT_FUZZY_SURNAME_THRESHOLD: f64 = 0.85;
/// Sentences of context captured on each side of an equation.
pub const DEFAULT_CONTEXT_SENTENCES: usize = 1;
/// Default consolidated store file name.
pub const DEFAULT_STORE_PATH: &str = "metadata.json";
/// Default response citation style.
pub const DEFAULT_RESPONSE_STYLE: &str = "apa";

/// Tunables for citation detection and resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationSettings {
    pub context_window: usize,
    pub max_range_span: usize,
    pub fuzzy_surname_threshold: f64,
}

impl Default for CitationSettings {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            max_range_span: DEFAULT_MAX_RANGE_SPAN,
            fuzzy_surname_threshold: DEFAULT_FUZZY_SURNAME_THRESHOLD,
        }
    }
}

/// Tunables for equation extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquationSettings {
    pub context_sentences: usize,
}

impl Default for EquationSettings {
    fn default() -> Self {
        Self {
            context_sentences: DEFAULT_CONTEXT_SENTENCES,
        }
    }
}

/// Fully resolved configuration, passed explicitly into each component.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub citations: CitationSettings,
    pub equations: EquationSettings,
    pub store_path: PathBuf,
    pub validation_level: ValidationLevel,
    pub response_style: String,
    /// Append-only JSONL file for processed responses; disabled when `None`.
    pub history_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            citations: CitationSettings::default(),
            equations: EquationSettings::default(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            validation_level: ValidationLevel::default(),
            response_style: DEFAULT_RESPONSE_STYLE.to_string(),
            history_path: None,
        }
    }
}

impl Config {
    /// Resolve a (possibly partial) file config against the defaults.
    ///
    /// An unrecognized validation level is logged and replaced by the default.
    pub fn from_file(file: &ConfigFile) -> Self {
        let defaults = Config::default();

        let citations = file.citations.as_ref();
        let citations = CitationSettings {
            context_window: citations
                .and_then(|c| c.context_window)
                .unwrap_or(defaults.citations.context_window),
            max_range_span: citations
                .and_then(|c| c.max_range_span)
                .unwrap_or(defaults.citations.max_range_span),
            fuzzy_surname_threshold: citations
                .and_then(|c| c.fuzzy_surname_threshold)
                .filter(|t| (0.0..=1.0).contains(t))
                .unwrap_or(defaults.citations.fuzzy_surname_threshold),
        };

        let equations = EquationSettings {
            context_sentences: file
                .equations
                .as_ref()
                .and_then(|e| e.context_sentences)
                .unwrap_or(defaults.equations.context_sentences),
        };

        let validation_level = match file.validation.as_ref().and_then(|v| v.level.as_deref()) {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(value = raw, error = %e, "unknown validation level, using default");
                defaults.validation_level
            }),
            None => defaults.validation_level,
        };

        let response = file.response.as_ref();

        Config {
            citations,
            equations,
            store_path: file
                .store
                .as_ref()
                .and_then(|s| s.path.as_ref())
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            validation_level,
            response_style: response
                .and_then(|r| r.style.clone())
                .unwrap_or(defaults.response_style),
            history_path: response
                .and_then(|r| r.history_path.as_ref())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_file::{CitationsSection, ValidationSection};

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_file(&ConfigFile::default()), Config::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let file = ConfigFile {
            citations: Some(CitationsSection {
                context_window: Some(40),
                fuzzy_surname_threshold: Some(0.9),
                ..Default::default()
            }),
            validation: Some(ValidationSection {
                level: Some("strict".into()),
            }),
            ..Default::default()
        };
        let config = Config::from_file(&file);
        assert_eq!(config.citations.context_window, 40);
        assert_eq!(config.citations.max_range_span, DEFAULT_MAX_RANGE_SPAN);
        assert_eq!(config.citations.fuzzy_surname_threshold, 0.9);
        assert_eq!(config.validation_level, ValidationLevel::Strict);
    }

    #[test]
    fn invalid_values_fall_back() {
        let file = ConfigFile {
            citations: Some(CitationsSection {
                fuzzy_surname_threshold: Some(3.0),
                ..Default::default()
            }),
            validation: Some(ValidationSection {
                level: Some("paranoid".into()),
            }),
            ..Default::default()
        };
        let config = Config::from_file(&file);
        assert_eq!(
            config.citations.fuzzy_surname_threshold,
            DEFAULT_FUZZY_SURNAME_THRESHOLD
        );
        assert_eq!(config.validation_level, ValidationLevel::Standard);
    }
}
