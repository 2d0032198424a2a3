use super::common::{escape_cell, format_count, project_link, short_description, source_marker};
use crate::Result;
use crate::aggregate::AggregatedView;
use crate::history::Delta;
use crate::model::{Provenance, RepoId, RepoSnapshot};
use chrono::{DateTime, NaiveDate, Utc};
use core::fmt::Write;
use std::collections::HashMap;

/// Rows shown in the trending and search sections.
const SECTION_ROWS: usize = 15;

/// Everything that goes into one day's report.
#[derive(Debug, Clone, Copy)]
pub struct DailyReport<'a> {
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub view: &'a AggregatedView,
    pub changes: &'a [Delta],

    /// The cycle skipped quota-heavy work.
    pub degraded: bool,
}

pub fn generate<W: Write>(report: &DailyReport<'_>, writer: &mut W) -> Result<()> {
    writeln!(writer, "# Repository radar - {}", report.date)?;
    writeln!(writer)?;
    writeln!(writer, "> Generated at {}", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(writer)?;

    if report.degraded {
        writeln!(
            writer,
            "> **Degraded run:** API quota was low, so keyword search and watchlist activity were skipped."
        )?;
        writeln!(writer)?;
    }

    write_overview(report.view, writer)?;
    write_highlights(report.view, writer)?;
    write_growth(report.changes, writer)?;

    let deltas: HashMap<&RepoId, u64> = report.changes.iter().map(|d| (&d.id, d.delta)).collect();
    write_trending(report.view.ranked(), writer)?;
    write_search(report.view.ranked(), writer)?;
    write_watchlist(report.view.ranked(), &deltas, writer)?;

    writeln!(writer, "---")?;
    writeln!(writer)?;
    writeln!(writer, "*Generated by repo-radar for {}*", report.date)?;

    Ok(())
}

fn write_overview<W: Write>(view: &AggregatedView, writer: &mut W) -> Result<()> {
    let summary = view.summary();
    let count = |p: Provenance| summary.per_source.get(&p).copied().unwrap_or(0);

    writeln!(writer, "## Overview")?;
    writeln!(writer)?;
    writeln!(writer, "- Trending projects: {}", count(Provenance::Trending))?;
    writeln!(writer, "- Search results: {}", count(Provenance::Search))?;
    writeln!(writer, "- Watchlist projects: {}", count(Provenance::Watchlist))?;
    writeln!(writer, "- Distinct projects: {}", summary.total_projects)?;
    writeln!(writer, "- Total stars: {}", format_count(summary.total_stars))?;
    writeln!(writer, "- Total forks: {}", format_count(summary.total_forks))?;

    if !summary.top_languages.is_empty() {
        let languages: Vec<_> = summary
            .top_languages
            .iter()
            .map(|(language, n)| format!("{} ({n})", escape_cell(language)))
            .collect();
        writeln!(writer, "- Top languages: {}", languages.join(", "))?;
    }

    writeln!(writer)?;
    Ok(())
}

fn write_highlights<W: Write>(view: &AggregatedView, writer: &mut W) -> Result<()> {
    let highlights = view.highlights();
    if highlights.is_empty() {
        return Ok(());
    }

    writeln!(writer, "## 🏆 Highlights")?;
    writeln!(writer)?;
    writeln!(writer, "| Rank | Project | Stars | Language | Source |")?;
    writeln!(writer, "|------|---------|-------|----------|--------|")?;

    for (rank, snapshot) in highlights.iter().enumerate() {
        writeln!(
            writer,
            "| {} | {} | {} | {} | {} |",
            rank + 1,
            project_link(snapshot),
            format_count(snapshot.stars),
            language(snapshot),
            source_marker(snapshot.provenance)
        )?;
    }

    writeln!(writer)?;
    Ok(())
}

fn write_growth<W: Write>(changes: &[Delta], writer: &mut W) -> Result<()> {
    if changes.is_empty() {
        return Ok(());
    }

    writeln!(writer, "## 📈 Star growth")?;
    writeln!(writer)?;
    writeln!(writer, "| Project | Description | Stars | Growth |")?;
    writeln!(writer, "|---------|-------------|-------|--------|")?;

    for delta in changes {
        writeln!(
            writer,
            "| [{id}](https://github.com/{id}) | {} | {} | +{} |",
            short_description(delta.description.as_deref()),
            format_count(delta.current_stars),
            format_count(delta.delta),
            id = delta.id
        )?;
    }

    writeln!(writer)?;
    Ok(())
}

fn write_trending<W: Write>(ranked: &[RepoSnapshot], writer: &mut W) -> Result<()> {
    let rows: Vec<_> = reported_by(ranked, Provenance::Trending).take(SECTION_ROWS).collect();
    if rows.is_empty() {
        return Ok(());
    }

    writeln!(writer, "## 🔥 Trending")?;
    writeln!(writer)?;
    writeln!(writer, "| Project | Description | Stars | Language |")?;
    writeln!(writer, "|---------|-------------|-------|----------|")?;

    for snapshot in rows {
        writeln!(
            writer,
            "| {} | {} | {} | {} |",
            project_link(snapshot),
            short_description(snapshot.description.as_deref()),
            format_count(snapshot.stars),
            language(snapshot)
        )?;
    }

    writeln!(writer)?;
    Ok(())
}

fn write_search<W: Write>(ranked: &[RepoSnapshot], writer: &mut W) -> Result<()> {
    let rows: Vec<_> = reported_by(ranked, Provenance::Search).take(SECTION_ROWS).collect();
    if rows.is_empty() {
        return Ok(());
    }

    writeln!(writer, "## 🔍 Keyword search")?;
    writeln!(writer)?;
    writeln!(writer, "| Project | Keywords | Stars |")?;
    writeln!(writer, "|---------|----------|-------|")?;

    for snapshot in rows {
        let keywords: Vec<_> = snapshot.annotations.keywords.iter().map(|k| escape_cell(k)).collect();
        writeln!(
            writer,
            "| {} | {} | {} |",
            project_link(snapshot),
            keywords.join(", "),
            format_count(snapshot.stars)
        )?;
    }

    writeln!(writer)?;
    Ok(())
}

fn write_watchlist<W: Write>(ranked: &[RepoSnapshot], deltas: &HashMap<&RepoId, u64>, writer: &mut W) -> Result<()> {
    let rows: Vec<_> = reported_by(ranked, Provenance::Watchlist).collect();
    if rows.is_empty() {
        return Ok(());
    }

    writeln!(writer, "## ⭐ Watchlist")?;
    writeln!(writer)?;
    writeln!(writer, "| Project | Stars | Growth | Last updated | Latest commit |")?;
    writeln!(writer, "|---------|-------|--------|--------------|---------------|")?;

    for snapshot in rows {
        let growth = deltas.get(&snapshot.id).map_or_else(|| "-".to_string(), |d| format!("+{}", format_count(*d)));
        let updated = snapshot
            .updated_at
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d").to_string());
        let commit = snapshot
            .annotations
            .recent_commits
            .first()
            .map_or_else(|| "-".to_string(), |c| format!("{} ({})", escape_cell(&c.message), escape_cell(&c.author)));

        writeln!(
            writer,
            "| {} | {} | {growth} | {updated} | {commit} |",
            project_link(snapshot),
            format_count(snapshot.stars)
        )?;
    }

    writeln!(writer)?;
    Ok(())
}

/// Projects any occurrence of which came from `provenance`, in ranking order.
fn reported_by(ranked: &[RepoSnapshot], provenance: Provenance) -> impl Iterator<Item = &RepoSnapshot> {
    ranked.iter().filter(move |s| s.annotations.sources.contains(&provenance))
}

fn language(snapshot: &RepoSnapshot) -> String {
    snapshot.language.as_deref().map_or_else(|| "-".to_string(), escape_cell)
}
