use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub citations: Option<CitationsSection>,
    pub equations: Option<EquationsSection>,
    pub store: Option<StoreSection>,
    pub validation: Option<ValidationSection>,
    pub response: Option<ResponseSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationsSection {
    pub context_window: Option<usize>,
    pub max_range_span: Option<usize>,
    pub fuzzy_surname_threshold: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EquationsSection {
    pub context_sentences: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSection {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSection {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseSection {
    pub style: Option<String>,
    pub history_path: Option<String>,
}

/// Name of the per-directory config file.
pub const LOCAL_CONFIG_FILE: &str = ".scholarlink.toml";

/// Platform config directory path: `<config_dir>/scholarlink/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scholarlink").join("config.toml"))
}

/// Load config by cascading CWD `.scholarlink.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(LOCAL_CONFIG_FILE));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        citations: Some(CitationsSection {
            context_window: overlay
                .citations
                .as_ref()
                .and_then(|c| c.context_window)
                .or_else(|| base.citations.as_ref().and_then(|c| c.context_window)),
            max_range_span: overlay
                .citations
                .as_ref()
                .and_then(|c| c.max_range_span)
                .or_else(|| base.citations.as_ref().and_then(|c| c.max_range_span)),
            fuzzy_surname_threshold: overlay
                .citations
                .as_ref()
                .and_then(|c| c.fuzzy_surname_threshold)
                .or_else(|| {
                    base.citations
                        .as_ref()
                        .and_then(|c| c.fuzzy_surname_threshold)
                }),
        }),
        equations: Some(EquationsSection {
            context_sentences: overlay
                .equations
                .as_ref()
                .and_then(|e| e.context_sentences)
                .or_else(|| base.equations.as_ref().and_then(|e| e.context_sentences)),
        }),
        store: Some(StoreSection {
            path: overlay
                .store
                .as_ref()
                .and_then(|s| s.path.clone())
                .or_else(|| base.store.as_ref().and_then(|s| s.path.clone())),
        }),
        validation: Some(ValidationSection {
            level: overlay
                .validation
                .as_ref()
                .and_then(|v| v.level.clone())
                .or_else(|| base.validation.as_ref().and_then(|v| v.level.clone())),
        }),
        response: Some(ResponseSection {
            style: overlay
                .response
                .as_ref()
                .and_then(|r| r.style.clone())
                .or_else(|| base.response.as_ref().and_then(|r| r.style.clone())),
            history_path: overlay
                .response
                .as_ref()
                .and_then(|r| r.history_path.clone())
                .or_else(|| base.response.as_ref().and_then(|r| r.history_path.clone())),
        }),
    }
}

/// Write `config` to `path`, creating parent directories.
pub fn save_to_path(config: &ConfigFile, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| format!("Failed to serialize config: {}", e))?;
    std::fs::write(path, content).map_err(|e| format!("Failed to write config: {}", e))
}

/// Save the config to the platform config directory.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf, String> {
    let path = config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
    save_to_path(config, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_path_round_trip_toml() {
        let config = ConfigFile {
            store: Some(StoreSection {
                path: Some("/tmp/metadata.json".to_string()),
            }),
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.store.unwrap().path.unwrap(), "/tmp/metadata.json");
    }

    #[test]
    fn partial_section_deserializes() {
        let toml_str = "[citations]\ncontext_window = 40\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        let citations = parsed.citations.unwrap();
        assert_eq!(citations.context_window, Some(40));
        assert!(citations.max_range_span.is_none());
        assert!(parsed.equations.is_none());
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            citations: Some(CitationsSection {
                context_window: Some(100),
                max_range_span: Some(20),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            citations: Some(CitationsSection {
                context_window: Some(60),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay);
        let citations = merged.citations.unwrap();
        assert_eq!(citations.context_window, Some(60));
        assert_eq!(citations.max_range_span, Some(20));
    }

    #[test]
    fn merge_base_preserved_when_overlay_absent() {
        let base = ConfigFile {
            response: Some(ResponseSection {
                style: Some("mla".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, ConfigFile::default());
        assert_eq!(merged.response.unwrap().style.as_deref(), Some("mla"));
    }

    #[test]
    fn load_from_path_missing_or_invalid() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_from_path(&dir.path().join("absent.toml")).is_none());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[citations\n").unwrap();
        assert!(load_from_path(&bad).is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = ConfigFile {
            validation: Some(ValidationSection {
                level: Some("strict".into()),
            }),
            ..Default::default()
        };
        save_to_path(&config, &path).unwrap();
        assert_eq!(load_from_path(&path), Some(config));
    }
}
