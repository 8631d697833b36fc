use std::io::Write;

use owo_colors::OwoColorize;
use scholarlink_ingest::{BatchReport, DocumentWarnings};
use scholarlink_store::{EquationReference, NetworkEdge, StoreStats, StoredDocument};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut.trim_end())
    } else {
        s.to_string()
    }
}

fn heading(w: &mut dyn Write, text: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", text.bold())
    } else {
        writeln!(w, "{}", text)
    }
}

fn print_warnings(
    w: &mut dyn Write,
    warnings: &DocumentWarnings,
    color: ColorMode,
) -> std::io::Result<()> {
    let mut lines = Vec::new();
    if !warnings.unresolved_citations.is_empty() {
        lines.push(format!(
            "unresolved citations: {}",
            warnings.unresolved_citations.join(", ")
        ));
    }
    if warnings.skipped_equations > 0 {
        lines.push(format!(
            "skipped {} malformed equation delimiter(s)",
            warnings.skipped_equations
        ));
    }
    for invalid in &warnings.invalid_references {
        let reasons: Vec<String> = invalid
            .issues
            .iter()
            .map(|i| format!("{}: {}", i.field, i.reason))
            .collect();
        lines.push(format!("reference [{}] {}", invalid.index + 1, reasons.join("; ")));
    }
    for line in lines {
        if color.enabled() {
            writeln!(w, "    {}", line.yellow())?;
        } else {
            writeln!(w, "    {}", line)?;
        }
    }
    Ok(())
}

/// Per-document results and totals after a batch.
pub fn print_batch_summary(
    w: &mut dyn Write,
    report: &BatchReport,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    for (doc_id, outcome, warnings) in &report.processed {
        let status = format!("{:?}", outcome).to_lowercase();
        if color.enabled() {
            writeln!(w, "  {} {} ({})", "\u{2713}".green(), doc_id.bold(), status.dimmed())?;
        } else {
            writeln!(w, "  [ok] {} ({})", doc_id, status)?;
        }
        print_warnings(w, warnings, color)?;
    }
    for (doc_id, error) in &report.failed {
        if color.enabled() {
            writeln!(w, "  {} {}: {}", "\u{2717}".red(), doc_id.bold(), error.red())?;
        } else {
            writeln!(w, "  [failed] {}: {}", doc_id, error)?;
        }
    }

    writeln!(w)?;
    let summary = format!(
        "{} processed, {} written, {} failed",
        report.processed.len(),
        report.written(),
        report.failed.len()
    );
    if color.enabled() {
        if report.failed.is_empty() {
            writeln!(w, "{}", summary.green().bold())?;
        } else {
            writeln!(w, "{}", summary.yellow().bold())?;
        }
    } else {
        writeln!(w, "{}", summary)?;
    }
    Ok(())
}

/// A stored document's metadata in readable form.
pub fn print_document(
    w: &mut dyn Write,
    doc_id: &str,
    doc: &StoredDocument,
    color: ColorMode,
) -> std::io::Result<()> {
    let metadata = &doc.metadata;
    heading(w, &format!("{} \u{2014} {}", doc_id, metadata.title), color)?;
    writeln!(w, "  Processed: {}", doc.processed_at.to_rfc3339())?;
    if !metadata.authors.is_empty() {
        let names: Vec<&str> = metadata.authors.iter().map(|a| a.full_name.as_str()).collect();
        writeln!(w, "  Authors:   {}", names.join("; "))?;
    }
    if let Some(year) = metadata.year {
        writeln!(w, "  Year:      {}", year)?;
    }
    if let Some(identifier) = &metadata.identifier {
        writeln!(w, "  ID:        {}", identifier)?;
    }
    if let Some(abstract_text) = &metadata.abstract_text {
        writeln!(w, "  Abstract:  {}", truncate(abstract_text, 160))?;
    }

    writeln!(w)?;
    heading(w, &format!("References ({})", metadata.references.len()), color)?;
    for (i, reference) in metadata.references.iter().enumerate() {
        let marker = format!("[{}]", i + 1);
        let label = truncate(reference.label(), 100);
        if color.enabled() {
            writeln!(w, "  {} {}", marker.yellow(), label)?;
        } else {
            writeln!(w, "  {} {}", marker, label)?;
        }
    }

    writeln!(w)?;
    let unresolved = metadata.unresolved_citations().count();
    heading(
        w,
        &format!(
            "Citations ({}, {} unresolved)",
            metadata.citations.len(),
            unresolved
        ),
        color,
    )?;
    for link in &metadata.citations {
        let target = match link.reference {
            Some(i) => format!("-> [{}]", i + 1),
            None => "-> ?".to_string(),
        };
        if color.enabled() && link.reference.is_none() {
            writeln!(w, "  {} {}", link.citation_text, target.red())?;
        } else {
            writeln!(w, "  {} {}", link.citation_text, target)?;
        }
    }

    if !metadata.equations.is_empty() {
        writeln!(w)?;
        heading(w, &format!("Equations ({})", metadata.equations.len()), color)?;
        for equation in &metadata.equations {
            writeln!(w, "  {}", truncate(equation, 100))?;
        }
    }
    Ok(())
}

pub fn print_stats(w: &mut dyn Write, stats: &StoreStats, color: ColorMode) -> std::io::Result<()> {
    heading(w, "Store statistics", color)?;
    writeln!(w, "  Documents:            {}", stats.documents)?;
    writeln!(w, "  References:           {}", stats.references)?;
    writeln!(w, "  Citations:            {}", stats.citations)?;
    if color.enabled() && stats.unresolved_citations > 0 {
        writeln!(
            w,
            "  Unresolved citations: {}",
            stats.unresolved_citations.yellow()
        )?;
    } else {
        writeln!(w, "  Unresolved citations: {}", stats.unresolved_citations)?;
    }
    writeln!(w, "  Equations:            {}", stats.equations)?;
    Ok(())
}

pub fn print_network(
    w: &mut dyn Write,
    edges: &[NetworkEdge],
    color: ColorMode,
) -> std::io::Result<()> {
    for edge in edges {
        if color.enabled() {
            writeln!(w, "{} -> {}", edge.source.bold(), truncate(&edge.target, 80))?;
            writeln!(w, "    {}", truncate(&edge.context, 120).dimmed())?;
        } else {
            writeln!(w, "{} -> {}", edge.source, truncate(&edge.target, 80))?;
            writeln!(w, "    {}", truncate(&edge.context, 120))?;
        }
    }
    Ok(())
}

pub fn print_equations(
    w: &mut dyn Write,
    equations: &[EquationReference],
    color: ColorMode,
) -> std::io::Result<()> {
    for equation in equations {
        let kind = equation
            .equation_type
            .map_or_else(String::new, |t| format!(" ({t})"));
        let body = truncate(&equation.equation, 80);
        if color.enabled() {
            writeln!(w, "{}{}: {}", equation.document_id.bold(), kind.dimmed(), body)?;
        } else {
            writeln!(w, "{}{}: {}", equation.document_id, kind, body)?;
        }
        if let Some(context) = &equation.context {
            writeln!(w, "    {}", truncate(context, 120))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 3), "ééé...");
    }

    #[test]
    fn test_stats_plain_output() {
        let mut out = Vec::new();
        let stats = StoreStats {
            documents: 2,
            references: 5,
            citations: 7,
            unresolved_citations: 1,
            equations: 3,
        };
        print_stats(&mut out, &stats, ColorMode(false)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Documents:            2"));
        assert!(text.contains("Unresolved citations: 1"));
    }

    #[test]
    fn test_equations_plain_output() {
        let mut out = Vec::new();
        let equations = vec![
            EquationReference {
                document_id: "paper".into(),
                equation: "$$E=mc^2$$".into(),
                equation_type: Some(scholarlink_core::EquationType::Display),
                context: Some("Energy and mass.".into()),
            },
            EquationReference {
                document_id: "other".into(),
                equation: "$x$".into(),
                equation_type: None,
                context: None,
            },
        ];
        print_equations(&mut out, &equations, ColorMode(false)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "paper (display): $$E=mc^2$$\n    Energy and mass.\nother: $x$\n"
        );
    }
}
