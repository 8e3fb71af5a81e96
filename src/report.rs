//! Per-handle reports, plain-text rendering and file exports.
//!
//! # JSON export
//!
//! ```json
//! {
//!   "alice": {
//!     "timestamp": "2026-10-18T12:00:00Z",
//!     "results": { "GitHub": "found", "Reddit": "rate_limited" },
//!     "found_profiles": { "GitHub": "https://github.com/alice" }
//!   }
//! }
//! ```
//!
//! # CSV export
//!
//! One row per `(handle, platform)` under the header
//! `Username,Platform,Status,Profile URL`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::checks::core::{CheckOutcome, CheckReport};
use crate::navarro::NavarroResult;

const RULE_WIDTH: usize = 50;
pub const CSV_HEADER: [&str; 4] = ["Username", "Platform", "Status", "Profile URL"];

/// Every check run for one handle.
#[derive(Debug, Clone, Serialize)]
pub struct HandleReport {
    pub handle: String,
    pub checked_at: DateTime<Utc>,
    pub results: Vec<CheckReport>,
}

impl HandleReport {
    pub fn new(handle: impl Into<String>, results: Vec<CheckReport>) -> Self {
        Self {
            handle: handle.into(),
            checked_at: Utc::now(),
            results,
        }
    }

    pub fn found(&self) -> impl Iterator<Item = &CheckReport> {
        self.results
            .iter()
            .filter(|report| report.outcome == CheckOutcome::Found)
    }

    pub fn get(&self, target: &str) -> Option<&CheckReport> {
        self.results.iter().find(|report| report.target == target)
    }

    pub fn summary(&self) -> OutcomeSummary {
        let mut summary = OutcomeSummary::default();
        for report in &self.results {
            summary.add(report.outcome);
        }
        summary
    }
}

/// Outcome counts for one handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub found: usize,
    pub not_found: usize,
    pub rate_limited: usize,
    pub timeout: usize,
    pub network_error: usize,
    pub unknown_error: usize,
}

impl OutcomeSummary {
    fn add(&mut self, outcome: CheckOutcome) {
        match outcome {
            CheckOutcome::Found => self.found += 1,
            CheckOutcome::NotFound => self.not_found += 1,
            CheckOutcome::RateLimited => self.rate_limited += 1,
            CheckOutcome::Timeout => self.timeout += 1,
            CheckOutcome::NetworkError => self.network_error += 1,
            CheckOutcome::UnknownError => self.unknown_error += 1,
        }
    }

    pub fn count(&self, outcome: CheckOutcome) -> usize {
        match outcome {
            CheckOutcome::Found => self.found,
            CheckOutcome::NotFound => self.not_found,
            CheckOutcome::RateLimited => self.rate_limited,
            CheckOutcome::Timeout => self.timeout,
            CheckOutcome::NetworkError => self.network_error,
            CheckOutcome::UnknownError => self.unknown_error,
        }
    }

    pub fn definitive(&self) -> usize {
        self.found + self.not_found
    }

    pub fn inconclusive(&self) -> usize {
        self.rate_limited + self.timeout + self.network_error + self.unknown_error
    }

    pub fn total(&self) -> usize {
        self.definitive() + self.inconclusive()
    }
}

/// Plain-text table for one handle. Quiet mode lists found profiles only.
pub fn render_table(report: &HandleReport, quiet: bool) -> String {
    let mut rows: Vec<&CheckReport> = report.results.iter().collect();
    rows.sort_by_key(|row| row.name.to_lowercase());

    let mut out = String::new();
    if quiet {
        for row in rows.iter().filter(|row| row.outcome == CheckOutcome::Found) {
            let _ = writeln!(out, "{}: {}", row.name, row.profile_url.as_deref().unwrap_or(""));
        }
        return out;
    }

    let rule = "=".repeat(RULE_WIDTH);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Results for @{}", report.handle);
    let _ = writeln!(out, "{rule}");
    for row in rows {
        let _ = match row.outcome {
            CheckOutcome::Found => writeln!(
                out,
                "[+] {:12} : {} - {}",
                row.name,
                row.outcome.label(),
                row.profile_url.as_deref().unwrap_or("")
            ),
            CheckOutcome::NotFound => writeln!(out, "[-] {:12} : {}", row.name, row.outcome.label()),
            _ => writeln!(out, "[?] {:12} : {}", row.name, row.outcome.label()),
        };
    }

    let summary = report.summary();
    let _ = writeln!(
        out,
        "\nSummary: {} found, {} not found, {} inconclusive",
        summary.found,
        summary.not_found,
        summary.inconclusive()
    );
    out
}

#[derive(Debug, Serialize)]
struct ExportEntry<'a> {
    timestamp: String,
    results: BTreeMap<&'a str, &'static str>,
    found_profiles: BTreeMap<&'a str, &'a str>,
}

/// JSON document keyed by handle.
pub fn to_json(reports: &[HandleReport]) -> NavarroResult<String> {
    let document: BTreeMap<&str, ExportEntry<'_>> = reports
        .iter()
        .map(|report| {
            let entry = ExportEntry {
                timestamp: report.checked_at.to_rfc3339(),
                results: report
                    .results
                    .iter()
                    .map(|row| (row.name.as_str(), row.outcome.as_str()))
                    .collect(),
                found_profiles: report
                    .found()
                    .filter_map(|row| Some((row.name.as_str(), row.profile_url.as_deref()?)))
                    .collect(),
            };
            (report.handle.as_str(), entry)
        })
        .collect();
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn export_json(reports: &[HandleReport], path: &Path) -> NavarroResult<()> {
    fs::write(path, to_json(reports)?)?;
    log::info!("exported {} report(s) to {}", reports.len(), path.display());
    Ok(())
}

/// Quotes a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row<W: Write>(writer: &mut W, fields: &[&str]) -> io::Result<()> {
    let line: Vec<String> = fields.iter().map(|field| csv_field(field)).collect();
    write!(writer, "{}\r\n", line.join(","))
}

pub fn write_csv<W: Write>(reports: &[HandleReport], writer: &mut W) -> io::Result<()> {
    csv_row(writer, &CSV_HEADER)?;
    for report in reports {
        for row in &report.results {
            csv_row(
                writer,
                &[
                    report.handle.as_str(),
                    row.name.as_str(),
                    row.outcome.as_str(),
                    row.profile_url.as_deref().unwrap_or(""),
                ],
            )?;
        }
    }
    Ok(())
}

pub fn export_csv(reports: &[HandleReport], path: &Path) -> NavarroResult<()> {
    let mut file = io::BufWriter::new(fs::File::create(path)?);
    write_csv(reports, &mut file)?;
    file.flush()?;
    log::info!("exported {} report(s) to {}", reports.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HandleReport {
        HandleReport::new(
            "alice",
            vec![
                CheckReport::new(
                    "github",
                    "GitHub",
                    CheckOutcome::Found,
                    Some("https://github.com/alice".into()),
                ),
                CheckReport::new("reddit", "Reddit", CheckOutcome::RateLimited, None),
                CheckReport::new("gitlab", "GitLab", CheckOutcome::NotFound, None),
                CheckReport::new("twitter", "Twitter/X", CheckOutcome::Timeout, None),
            ],
        )
    }

    #[test]
    fn summary_separates_inconclusive() {
        let summary = sample().summary();
        assert_eq!(summary.found, 1);
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.definitive(), 2);
        assert_eq!(summary.inconclusive(), 2);
        assert_eq!(summary.count(CheckOutcome::Timeout), 1);
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn table_never_renders_errors_as_not_found() {
        let table = render_table(&sample(), false);
        assert!(table.contains("[+] GitHub       : FOUND - https://github.com/alice"));
        assert!(table.contains("[-] GitLab       : Not Found"));
        assert!(table.contains("[?] Reddit       : Rate Limited"));
        assert!(table.contains("[?] Twitter/X    : Timeout"));
        assert!(table.contains("Summary: 1 found, 1 not found, 2 inconclusive"));

        let quiet = render_table(&sample(), true);
        assert_eq!(quiet, "GitHub: https://github.com/alice\n");
    }

    #[test]
    fn json_is_keyed_by_handle() {
        let json: serde_json::Value = serde_json::from_str(&to_json(&[sample()]).unwrap()).unwrap();
        let alice = &json["alice"];
        assert_eq!(alice["results"]["GitHub"], "found");
        assert_eq!(alice["results"]["Reddit"], "rate_limited");
        assert_eq!(alice["found_profiles"]["GitHub"], "https://github.com/alice");
        assert!(alice["found_profiles"].get("Reddit").is_none());
        assert!(alice["timestamp"].is_string());
    }

    #[test]
    fn csv_quotes_when_needed() {
        let mut report = sample();
        report.results.push(CheckReport::new(
            "custom",
            "Odd, \"quoted\"",
            CheckOutcome::NotFound,
            None,
        ));
        let mut buffer = Vec::new();
        write_csv(&[report], &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = text.split("\r\n").collect();
        assert_eq!(lines[0], "Username,Platform,Status,Profile URL");
        assert_eq!(lines[1], "alice,GitHub,found,https://github.com/alice");
        assert_eq!(lines[2], "alice,Reddit,rate_limited,");
        assert_eq!(lines[5], "alice,\"Odd, \"\"quoted\"\"\",not_found,");
    }

    #[test]
    fn exports_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("out.json");
        let csv_path = dir.path().join("out.csv");
        export_json(&[sample()], &json_path).unwrap();
        export_csv(&[sample()], &csv_path).unwrap();
        assert!(fs::read_to_string(json_path).unwrap().contains("\"alice\""));
        assert!(fs::read_to_string(csv_path).unwrap().starts_with("Username,"));
    }
}
