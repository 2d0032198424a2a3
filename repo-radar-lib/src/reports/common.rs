//! Formatting helpers for markdown tables.

use crate::model::{Provenance, RepoSnapshot};

const DESCRIPTION_WIDTH: usize = 60;

/// Format a count with thousands separators: `1234567` becomes `1,234,567`.
pub fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}

/// Make free text safe for a single table cell.
pub fn escape_cell(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").replace('|', "\\|")
}

/// A description cut to a readable width, or `-` when there is none.
pub fn short_description(description: Option<&str>) -> String {
    let Some(text) = description.map(str::trim).filter(|t| !t.is_empty()) else {
        return "-".to_string();
    };

    let mut chars = text.chars();
    let head: String = chars.by_ref().take(DESCRIPTION_WIDTH).collect();
    if chars.next().is_some() {
        escape_cell(&format!("{head}..."))
    } else {
        escape_cell(&head)
    }
}

/// A markdown link to the project's page.
pub fn project_link(snapshot: &RepoSnapshot) -> String {
    let url = snapshot
        .html_url
        .clone()
        .unwrap_or_else(|| format!("https://github.com/{}", snapshot.id));
    format!("[{}]({url})", snapshot.id)
}

pub const fn source_marker(provenance: Provenance) -> &'static str {
    match provenance {
        Provenance::Trending => "🔥 trending",
        Provenance::Search => "🔍 search",
        Provenance::Watchlist => "⭐ watchlist",
    }
}
