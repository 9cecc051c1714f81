use std::fmt::Write as _;

use anyhow::Result;
use checker_core::{
    Category, CheckResult, HealthReport, HealthSnapshot, ProgressRow, SessionView, SubjectEntry,
};
use serde_json::Value;

/// Terminal output. Progress goes to stdout as rows change, notices to stderr.
pub struct Console {
    json: bool,
    shown: Vec<ProgressRow>,
}

impl Console {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            shown: Vec::new(),
        }
    }

    pub fn notice(&self, text: &str) {
        eprintln!("! {text}");
    }

    pub fn render(&mut self, view: &SessionView) {
        if self.json {
            return;
        }
        for row in changed_rows(&self.shown, &view.progress) {
            println!("  {:<40} {}", row.label, row.status_text);
        }
        self.shown = view.progress.clone();
    }

    pub fn print_result(&self, result: &CheckResult) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(result)?);
        } else {
            print!("{}", format_result(result));
        }
        Ok(())
    }

    pub fn print_health(&self, report: &HealthReport) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(report)?);
        } else {
            print!("{}", format_health(report));
        }
        Ok(())
    }
}

/// Rows that are new or whose status differs from what was last shown.
pub fn changed_rows<'a>(shown: &[ProgressRow], current: &'a [ProgressRow]) -> Vec<&'a ProgressRow> {
    current
        .iter()
        .filter(|row| !shown.contains(row))
        .collect()
}

pub fn format_result(result: &CheckResult) -> String {
    let mut out = String::new();
    if result.tree.is_empty() {
        out.push_str("No records found.\n");
        return out;
    }
    for source in result.tree.sources() {
        match result.urls.base_url(source).filter(|url| !url.is_empty()) {
            Some(url) => {
                let _ = writeln!(out, "{source} ({url})");
            }
            None => {
                let _ = writeln!(out, "{source}");
            }
        }
        for (subject, entry) in result.tree.subjects(source) {
            match entry {
                SubjectEntry::Error(message) => {
                    let _ = writeln!(out, "  error: {message}");
                }
                SubjectEntry::Categories(categories) => {
                    let _ = writeln!(out, "  {subject}");
                    for (name, category) in categories {
                        write_category(&mut out, name, &category);
                    }
                }
            }
        }
    }
    out
}

fn write_category(out: &mut String, name: &str, category: &Category<'_>) {
    match category {
        Category::Content(value) => {
            let _ = writeln!(out, "    {name}: {}", inline(value));
        }
        Category::Subcategories(subcategories) => {
            let _ = writeln!(out, "    {name}");
            for (key, value) in subcategories.iter() {
                let _ = writeln!(out, "      {key}: {}", inline(value));
            }
        }
    }
}

fn inline(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub fn format_health(report: &HealthReport) -> String {
    format!(
        "{}{}",
        snapshot_line("queue", &report.queue),
        snapshot_line("latency", &report.latency)
    )
}

fn snapshot_line(name: &str, snapshot: &HealthSnapshot) -> String {
    format!(
        "{name:<8} {}/5 {:<9} {}\n",
        snapshot.level, snapshot.status, snapshot.reason
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use checker_core::{merge, ResultTree, SourceResult, SourceUrlIndex};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(label: &str, status: &str) -> ProgressRow {
        ProgressRow {
            label: label.into(),
            status_text: status.into(),
        }
    }

    #[test]
    fn only_changed_rows_are_reprinted() {
        let shown = vec![row("A", "queued"), row("B", "queued")];
        let current = vec![row("A", "queued"), row("B", "done")];
        assert_eq!(changed_rows(&shown, &current), vec![&current[1]]);
    }

    #[test]
    fn result_outline_lists_sources_subjects_and_categories() {
        let batch = vec![SourceResult::success(
            json!({
                "Court A": {
                    "Ivanov": {"cases": 2, "hearings": {"next": "2024-05-01"}},
                    "__error__": "partial data"
                }
            }),
            Some("https://a.example/"),
        )];
        let (tree, urls) = merge(&ResultTree::new(), &batch);
        let outline = format_result(&CheckResult { tree, urls });
        assert_eq!(
            outline,
            "Court A (https://a.example)\n  Ivanov\n    cases: 2\n    hearings\n      next: 2024-05-01\n  error: partial data\n"
        );
    }

    #[test]
    fn source_without_address_is_printed_bare() {
        let batch = vec![SourceResult::success(
            json!({"Court B": {"Petrov": {"cases": 1}}}),
            None,
        )];
        let (tree, urls) = merge(&ResultTree::new(), &batch);
        let outline = format_result(&CheckResult { tree, urls });
        assert_eq!(outline, "Court B\n  Petrov\n    cases: 1\n");
    }

    #[test]
    fn empty_result_says_so() {
        let result = CheckResult {
            tree: ResultTree::new(),
            urls: SourceUrlIndex::new(),
        };
        assert_eq!(format_result(&result), "No records found.\n");
    }
}
