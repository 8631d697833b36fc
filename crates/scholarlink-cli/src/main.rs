use std::convert::Infallible;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use scholarlink_core::config_file::{self, ConfigFile};
use scholarlink_core::{Config, ValidationLevel};
use scholarlink_ingest::{
    DocumentInput, ErrorPolicy, Pipeline, discover_documents, doc_id_for, load_document,
    load_enrichment, load_reference_list, run_batch,
};
use scholarlink_parsing::CitationGraph;
use scholarlink_reporting::{AcademicResponseProcessor, CitationStyle, JsonlHistory};
use scholarlink_store::MetadataConsolidator;

mod output;

use output::ColorMode;

/// Academic metadata extraction - link citations, extract equations and
/// consolidate per-document metadata
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the platform/local cascade
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the consolidated metadata store
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Write logs to this file (rotated daily) instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty metadata store
    Init {
        /// Also save the effective settings to the platform config file
        #[arg(long)]
        save_config: bool,
    },

    /// Process .txt/.md documents (or directories of them) into the store
    Process {
        /// Files or directories to process
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Raw reference list, one per line (single document only)
        #[arg(long)]
        references: Option<PathBuf>,

        /// Enrichment record as JSON (single document only)
        #[arg(long)]
        enrichment: Option<PathBuf>,

        /// Reference validation level: basic, standard or strict
        #[arg(long)]
        validation: Option<String>,

        /// Stop at the first failing document
        #[arg(long)]
        fail_fast: bool,
    },

    /// Remove a document from the store
    Remove {
        doc_id: String,
    },

    /// Show a stored document's metadata
    Show {
        doc_id: String,

        /// Print the stored JSON entry
        #[arg(long)]
        json: bool,
    },

    /// Print the citation graph of a stored document
    Graph {
        doc_id: String,

        #[arg(long, value_enum, default_value_t = GraphFormat::Json)]
        format: GraphFormat,
    },

    /// Totals across the store
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Every resolved citation in the store, document to reference
    Network {
        #[arg(long)]
        json: bool,
    },

    /// Every equation in the store with its document and context
    Equations {
        #[arg(long)]
        json: bool,
    },

    /// Restyle a generated answer using a stored document's references
    Format {
        /// Stored document whose references back the answer
        doc_id: String,

        /// File holding the answer text
        answer: PathBuf,

        /// The question the answer responds to
        #[arg(long)]
        query: String,

        /// Citation style: apa, mla, chicago or ieee
        #[arg(long)]
        style: Option<String>,

        /// Retrieval mode recorded with the response
        #[arg(long, default_value = "hybrid")]
        mode: String,

        /// Append the formatted response to the response history
        #[arg(long)]
        save: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GraphFormat {
    Json,
    Dot,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_file = cli
        .log_file
        .clone()
        .or_else(|| std::env::var("SCHOLARLINK_LOG_FILE").ok().map(PathBuf::from));
    let _log_guard = init_logging(log_file.as_deref());

    let mut config = resolve_config(cli.config.as_deref());
    if let Some(store) = cli.store.clone() {
        config.store_path = store;
    }
    let color = ColorMode(!cli.no_color && std::env::var_os("NO_COLOR").is_none());
    let store = MetadataConsolidator::new(&config.store_path);

    match cli.command {
        Command::Init { save_config } => init(&store, &config, save_config, color),
        Command::Process {
            paths,
            references,
            enrichment,
            validation,
            fail_fast,
        } => {
            if let Some(level) = validation {
                config.validation_level = level.parse::<ValidationLevel>()?;
            }
            process(&store, &config, paths, references, enrichment, fail_fast, color)
        }
        Command::Remove { doc_id } => {
            if store.remove(&doc_id)? {
                println!("Removed {}", doc_id);
            } else {
                println!("{} is not in {}", doc_id, store.path().display());
            }
            Ok(())
        }
        Command::Show { doc_id, json } => {
            let doc = store
                .get(&doc_id)?
                .ok_or_else(|| anyhow::anyhow!("{} is not in {}", doc_id, store.path().display()))?;
            let mut stdout = std::io::stdout();
            if json {
                writeln!(stdout, "{}", serde_json::to_string_pretty(&doc)?)?;
            } else {
                output::print_document(&mut stdout, &doc_id, &doc, color)?;
            }
            Ok(())
        }
        Command::Graph { doc_id, format } => {
            let doc = store
                .get(&doc_id)?
                .ok_or_else(|| anyhow::anyhow!("{} is not in {}", doc_id, store.path().display()))?;
            let graph = CitationGraph::build(
                &doc.metadata.citations,
                &doc.metadata.references,
                config.citations.context_window,
                true,
            );
            match format {
                GraphFormat::Json => println!("{}", serde_json::to_string_pretty(&graph)?),
                GraphFormat::Dot => print!("{}", graph.to_dot()),
            }
            Ok(())
        }
        Command::Stats { json } => {
            let stats = store.stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                output::print_stats(&mut std::io::stdout(), &stats, color)?;
            }
            Ok(())
        }
        Command::Network { json } => {
            let edges = store.citation_network()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&edges)?);
            } else {
                output::print_network(&mut std::io::stdout(), &edges, color)?;
            }
            Ok(())
        }
        Command::Equations { json } => {
            let equations = store.equation_references()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&equations)?);
            } else {
                output::print_equations(&mut std::io::stdout(), &equations, color)?;
            }
            Ok(())
        }
        Command::Format {
            doc_id,
            answer,
            query,
            style,
            mode,
            save,
        } => format_answer(&store, &config, &doc_id, &answer, &query, style, &mode, save),
    }
}

/// Install the tracing subscriber. Returns the appender guard, which must
/// live until exit so buffered log lines are flushed.
fn init_logging(log_file: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scholarlink=info"));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("scholarlink.log");
            let appender = tracing_appender::rolling::daily(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

/// Resolve configuration: CLI flags > env vars > config files > defaults.
/// Flags are applied by the caller.
fn resolve_config(explicit: Option<&Path>) -> Config {
    let file = match explicit {
        Some(path) => config_file::load_from_path(path).unwrap_or_else(|| {
            tracing::warn!(path = %path.display(), "config file not loaded, using defaults");
            ConfigFile::default()
        }),
        None => config_file::load_config(),
    };
    let mut config = Config::from_file(&file);

    if let Ok(path) = std::env::var("SCHOLARLINK_STORE") {
        config.store_path = PathBuf::from(path);
    }
    if let Ok(style) = std::env::var("SCHOLARLINK_STYLE") {
        config.response_style = style;
    }
    if let Ok(level) = std::env::var("SCHOLARLINK_VALIDATION") {
        match level.parse() {
            Ok(level) => config.validation_level = level,
            Err(e) => tracing::warn!(value = %level, error = %e, "ignoring SCHOLARLINK_VALIDATION"),
        }
    }
    if let Ok(path) = std::env::var("SCHOLARLINK_HISTORY") {
        config.history_path = Some(PathBuf::from(path));
    }
    config
}

/// The file form of an effective configuration.
fn to_config_file(config: &Config) -> ConfigFile {
    use scholarlink_core::config_file::{
        CitationsSection, EquationsSection, ResponseSection, StoreSection, ValidationSection,
    };

    ConfigFile {
        citations: Some(CitationsSection {
            context_window: Some(config.citations.context_window),
            max_range_span: Some(config.citations.max_range_span),
            fuzzy_surname_threshold: Some(config.citations.fuzzy_surname_threshold),
        }),
        equations: Some(EquationsSection {
            context_sentences: Some(config.equations.context_sentences),
        }),
        store: Some(StoreSection {
            path: Some(config.store_path.display().to_string()),
        }),
        validation: Some(ValidationSection {
            level: Some(config.validation_level.to_string()),
        }),
        response: Some(ResponseSection {
            style: Some(config.response_style.clone()),
            history_path: config
                .history_path
                .as_ref()
                .map(|p| p.display().to_string()),
        }),
    }
}

fn init(
    store: &MetadataConsolidator,
    config: &Config,
    save_config: bool,
    color: ColorMode,
) -> anyhow::Result<()> {
    use owo_colors::OwoColorize;

    let created = store.initialize()?;
    let msg = if created {
        format!("Created empty store at {}", store.path().display())
    } else {
        format!("Store already exists at {}", store.path().display())
    };
    if color.enabled() {
        println!("{}", msg.green());
    } else {
        println!("{}", msg);
    }

    if save_config {
        let path = config_file::save_config(&to_config_file(config)).map_err(anyhow::Error::msg)?;
        println!("Saved settings to {}", path.display());
    }
    Ok(())
}

fn process(
    store: &MetadataConsolidator,
    config: &Config,
    paths: Vec<PathBuf>,
    references: Option<PathBuf>,
    enrichment: Option<PathBuf>,
    fail_fast: bool,
    color: ColorMode,
) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    let pipeline = Pipeline::from_config(config)?;

    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(discover_documents(&path)?);
        } else {
            files.push(path);
        }
    }

    // Side files only make sense for one document.
    if references.is_some() || enrichment.is_some() {
        let [file] = files.as_slice() else {
            anyhow::bail!("--references and --enrichment need exactly one document");
        };
        let doc_id = doc_id_for(file);
        let mut input = DocumentInput::new(&doc_id, load_document(file)?);
        if let Some(path) = references {
            input = input.with_raw_references(load_reference_list(&path)?);
        }
        if let Some(path) = enrichment {
            input = input.with_enrichment(load_enrichment(&path)?);
        }
        let outcome = pipeline.process(input)?;
        let update = store.update_with_equations(&doc_id, &outcome.metadata, &outcome.equations)?;
        let report = scholarlink_ingest::BatchReport {
            processed: vec![(doc_id, update, outcome.warnings)],
            failed: Vec::new(),
        };
        output::print_batch_summary(&mut std::io::stdout(), &report, color)?;
        return Ok(());
    }

    if files.is_empty() {
        anyhow::bail!("no .txt or .md documents found");
    }

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.green/dim}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    let policy = if fail_fast {
        ErrorPolicy::Abort
    } else {
        ErrorPolicy::Skip
    };

    let report = run_batch(&pipeline, store, &files, policy, |progress| {
        bar.set_position(progress.completed as u64);
        bar.set_message(progress.doc_id.to_string());
        Ok::<_, Infallible>(())
    });
    bar.finish_and_clear();

    let report = report?;
    output::print_batch_summary(&mut std::io::stdout(), &report, color)?;
    if !report.failed.is_empty() {
        anyhow::bail!("{} document(s) failed", report.failed.len());
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn format_answer(
    store: &MetadataConsolidator,
    config: &Config,
    doc_id: &str,
    answer: &Path,
    query: &str,
    style: Option<String>,
    mode: &str,
    save: bool,
) -> anyhow::Result<()> {
    let style: CitationStyle = style
        .as_deref()
        .unwrap_or(&config.response_style)
        .parse()?;
    let doc = store
        .get(doc_id)?
        .ok_or_else(|| anyhow::anyhow!("{} is not in {}", doc_id, store.path().display()))?;
    let answer = std::fs::read_to_string(answer)?;
    let processor = AcademicResponseProcessor::new(style)
        .with_fuzzy_threshold(config.citations.fuzzy_surname_threshold);

    let document = if save {
        let path = config
            .history_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("responses.jsonl"));
        let history = JsonlHistory::new(path);
        let document =
            processor.save_academic_response(&history, query, &answer, mode, &doc.metadata.references)?;
        tracing::info!(path = %history.path().display(), "saved response");
        document
    } else {
        processor.format_academic_response(query, &answer, mode, &doc.metadata.references)
    };
    println!("{}", document);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_file_round_trip() {
        let config = Config::default();
        assert_eq!(Config::from_file(&to_config_file(&config)), config);
    }

    #[test]
    fn test_graph_format_flag() {
        let cli = Cli::try_parse_from(["scholarlink", "graph", "paper", "--format", "dot"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Graph { format: GraphFormat::Dot, .. }
        ));
    }

    #[test]
    fn test_equations_subcommand() {
        let cli = Cli::try_parse_from(["scholarlink", "equations", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Equations { json: true }));
    }
}
