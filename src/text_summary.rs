//! Text summary builder for CLI output.
//!
//! Formats a completed session's statistics as human-readable lines for text
//! mode.

use crate::model::SessionResult;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Render a count with thousands separators.
pub(crate) fn format_count(n: u64) -> String {
    let raw = n.to_string();
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, c) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Build a text summary from a completed session.
pub(crate) fn build_text_summary(result: &SessionResult) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!("Session: {}", result.session_id));
    lines.push(format!("Source: {}", result.source_file));
    if let Some(msg) = result.message.as_deref() {
        lines.push(format!("Status: {}", msg));
    }

    lines.push(format!(
        "Transactions: {}",
        format_count(result.stats.transaction_count)
    ));
    lines.push(format!(
        "Pages processed: {}",
        format_count(result.stats.page_count)
    ));
    lines.push(format!(
        "Categories: {}",
        format_count(result.stats.category_count)
    ));

    if let Some(range) = result.stats.date_range.as_ref() {
        lines.push(format!("Date range: {} to {}", range.start, range.end));
    }
    if let Some(w) = result.stats.total_withdrawals {
        lines.push(format!("Total withdrawals: {:.2}", w));
    }
    if let Some(d) = result.stats.total_deposits {
        lines.push(format!("Total deposits: {:.2}", d));
    }

    TextSummary { lines }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateRange, SessionStats};

    #[test]
    fn counts_get_thousands_separators() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn summary_lists_the_three_counters() {
        let result = SessionResult {
            session_id: "abc".into(),
            source_file: "statement.pdf".into(),
            stats: SessionStats {
                transaction_count: 1234,
                page_count: 2,
                category_count: 3,
                date_range: Some(DateRange {
                    start: "01/01/24".into(),
                    end: "31/03/24".into(),
                }),
                total_withdrawals: Some(1500.5),
                total_deposits: None,
            },
            message: Some("PDF processed successfully".into()),
            completed_at: "2025-01-01T00:00:00Z".into(),
        };
        let summary = build_text_summary(&result);
        let joined = summary.lines.join("\n");
        assert!(joined.contains("Transactions: 1,234"));
        assert!(joined.contains("Pages processed: 2"));
        assert!(joined.contains("Categories: 3"));
        assert!(joined.contains("Date range: 01/01/24 to 31/03/24"));
        assert!(joined.contains("Total withdrawals: 1500.50"));
        assert!(!joined.contains("Total deposits"));
    }
}
