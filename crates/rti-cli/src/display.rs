//! Terminal rendering for RTI records.
//!
//! `show` prints a single request as a vertical card grouped into sections;
//! `list` prints one summary line per request.

use chrono::{DateTime, Utc};
use rti_core::{RtiRequest, RtiSummary};

const LABEL_WIDTH: usize = 18;
const MAX_TITLE_CHARS: usize = 40;

// ── Public API ──

pub fn print_rti_card(rti: &RtiRequest) {
    print!("{}", render_card(rti));
}

pub fn print_summary_table(rows: &[RtiSummary]) {
    print!("{}", render_table(rows));
}

/// A section is a header plus labelled values; `None` values are skipped.
type Section<'a> = (&'a str, Vec<(&'a str, Option<String>)>);

pub fn render_card(rti: &RtiRequest) -> String {
    let mut out = format!("=== RTI #{} ===\n{}\n\n", rti.id, rti.title);

    let sections: [Section<'_>; 6] = [
        (
            "Request",
            vec![
                ("citizen_address", Some(rti.citizen_address.clone())),
                ("description", Some(rti.description.clone())),
                ("status", Some(rti.status.to_string())),
            ],
        ),
        (
            "Bounty",
            vec![
                ("amount", Some(format!("{} ETH", rti.bounty))),
                ("deadline", Some(timestamp(rti.deadline))),
            ],
        ),
        (
            "File",
            vec![
                ("file_name", rti.attachment.as_ref().map(|a| a.file_name.clone())),
                ("content_type", rti.attachment.as_ref().map(|a| a.content_type.clone())),
                ("handle", rti.attachment.as_ref().map(|a| a.handle.clone())),
            ],
        ),
        (
            "Response",
            vec![
                ("officer_address", rti.officer_address.clone()),
                ("response_text", rti.response_text.clone()),
                ("rejection_reason", rti.rejection_reason.clone()),
            ],
        ),
        (
            "Chain",
            vec![
                ("blockchain_id", rti.blockchain_id.map(|id| id.to_string())),
                ("synced", Some(rti.chain_synced.to_string())),
                ("sync_error", rti.sync_error.clone()),
            ],
        ),
        (
            "Timestamps",
            vec![("created_at", Some(timestamp(rti.created_at)))],
        ),
    ];

    for (header, fields) in &sections {
        render_section(&mut out, header, fields);
    }
    out
}

pub fn render_table(rows: &[RtiSummary]) -> String {
    if rows.is_empty() {
        return "No RTI requests.\n".to_string();
    }
    let mut out = format!(
        "{:>5}  {:>5}  {:<10}  {:>10}  {:<10}  {:<4}  {:<6}  {}\n",
        "id", "chain", "status", "bounty", "deadline", "file", "synced", "title"
    );
    for row in rows {
        let chain = row
            .blockchain_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".into());
        out.push_str(&format!(
            "{:>5}  {:>5}  {:<10}  {:>10}  {:<10}  {:<4}  {:<6}  {}\n",
            row.id,
            chain,
            row.status.as_str(),
            row.bounty,
            row.deadline.format("%Y-%m-%d"),
            if row.has_file { "yes" } else { "no" },
            if row.chain_synced { "yes" } else { "NO" },
            truncate(&row.title, MAX_TITLE_CHARS),
        ));
    }
    out.push_str(&format!("\n{} request(s)\n", rows.len()));
    out
}

// ── Section rendering ──

fn render_section(out: &mut String, header: &str, fields: &[(&str, Option<String>)]) {
    if fields.iter().all(|(_, value)| value.is_none()) {
        return;
    }
    out.push_str(header);
    out.push('\n');
    for (label, value) in fields {
        if let Some(value) = value {
            out.push_str(&format!("  {label:<LABEL_WIDTH$} {value}\n"));
        }
    }
    out.push('\n');
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max - 1).collect();
    cut.push('…');
    cut
}
