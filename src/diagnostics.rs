//! Presentation of analysis diagnostics: the plain log format with the
//! offending source line, and `miette` reports.

use crate::language::{
    errors::{Diagnostic, Severity},
    span::{Location, Position},
};
use miette::{NamedSource, Report, SourceSpan};
use std::fmt::Write;
use thiserror::Error;

#[derive(Debug, Error, miette::Diagnostic)]
#[error("{message}")]
pub struct AnalysisDiagnostic {
    #[source_code]
    src: NamedSource,
    #[label("{label}")]
    span: Option<SourceSpan>,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

fn source_line(source: &str, line: u32) -> Option<&str> {
    let idx = usize::try_from(line.checked_sub(1)?).ok()?;
    source.lines().nth(idx)
}

/// Renders one diagnostic as
/// `[file:]line:start-end: ERROR: message`, the source line and a `~` marker
/// under the span. Multi-line spans only print the line range.
pub fn render_plain(diag: &Diagnostic, source: &str, filename: Option<&str>) -> String {
    let prefix = diag.severity.prefix();
    let message = diag.message.strip_suffix('\n').unwrap_or(&diag.message);
    let Some(loc) = diag.loc else {
        return format!("{prefix}{message}\n");
    };

    let mut out = String::new();
    if let Some(filename) = filename {
        out.push_str(filename);
        out.push(':');
    }
    let _ = writeln!(out, "{loc}: {prefix}{message}");
    if loc.is_multiline() {
        return out;
    }
    let Some(line) = source_line(source, loc.begin.line).filter(|line| !line.is_empty()) else {
        return out;
    };

    let begin = loc.begin.column.saturating_sub(1) as usize;
    let end = loc.end.column.saturating_sub(1) as usize;
    let mut marker = String::new();
    for (idx, ch) in line.chars().enumerate() {
        if ch == '\t' {
            out.push_str("    ");
        } else {
            out.push(ch);
        }
        if idx < end {
            let mark = if idx < begin { ' ' } else { '~' };
            let width = if ch == '\t' { 4 } else { 1 };
            marker.extend(std::iter::repeat(mark).take(width));
        }
    }
    out.push('\n');
    out.push_str(&marker);
    out.push('\n');
    out
}

fn byte_offset(source: &str, pos: Position) -> usize {
    let mut offset = 0;
    for (idx, line) in source.split_inclusive('\n').enumerate() {
        if idx + 1 == pos.line as usize {
            let column = pos.column.saturating_sub(1) as usize;
            let within = line
                .char_indices()
                .nth(column)
                .map_or(line.len(), |(byte, _)| byte);
            return offset + within;
        }
        offset += line.len();
    }
    source.len()
}

fn source_span(source: &str, loc: Location) -> SourceSpan {
    let start = byte_offset(source, loc.begin);
    let end = byte_offset(source, loc.end).max(start);
    SourceSpan::from((start, end - start))
}

fn build_report(diag: &Diagnostic, help: Option<String>, source: &str, filename: &str) -> Report {
    let message = match diag.severity {
        Severity::Error => diag.message.clone(),
        Severity::Warning => format!("warning: {}", diag.message),
        Severity::Hint => format!("hint: {}", diag.message),
    };
    Report::new(AnalysisDiagnostic {
        src: NamedSource::new(filename, source.to_string()),
        span: diag.loc.map(|loc| source_span(source, loc)),
        help,
        message,
        label: "here".to_string(),
    })
}

/// Converts one diagnostic into a `miette` report over `source`.
pub fn to_report(diag: &Diagnostic, source: &str, filename: &str) -> Report {
    build_report(diag, None, source, filename)
}

/// Converts a diagnostic list into reports. Hints are attached as help to
/// the diagnostic they follow.
pub fn to_reports(diags: &[Diagnostic], source: &str, filename: &str) -> Vec<Report> {
    let mut reports = Vec::new();
    let mut iter = diags.iter().peekable();
    while let Some(diag) = iter.next() {
        let mut hints = Vec::new();
        while let Some(hint) = iter.next_if(|next| next.severity == Severity::Hint) {
            hints.push(hint.message.clone());
        }
        let help = (!hints.is_empty()).then(|| hints.join("\n"));
        reports.push(build_report(diag, help, source, filename));
    }
    reports
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "BEGIN {\n\t@x = \"a\" + 1;\n}\n";

    #[test]
    fn single_line_errors_show_source_and_marker() {
        let diag = Diagnostic::error("Illegal operation").at(Location::line(2, 7, 14));
        assert_eq!(
            render_plain(&diag, SOURCE, Some("script.bt")),
            "script.bt:2:7-14: ERROR: Illegal operation\n    @x = \"a\" + 1;\n         ~~~~~~~\n"
        );
    }

    #[test]
    fn multi_line_and_unlocated_errors() {
        let multi = Diagnostic::warning("spans lines").at(Location::new(
            Position::new(1, 1),
            Position::new(3, 2),
        ));
        assert_eq!(render_plain(&multi, SOURCE, None), "1-3: WARNING: spans lines\n");

        let bare = Diagnostic::error("node count (10) exceeds the limit (5)");
        assert_eq!(
            render_plain(&bare, SOURCE, Some("script.bt")),
            "ERROR: node count (10) exceeds the limit (5)\n"
        );
    }

    #[test]
    fn spans_map_to_byte_offsets() {
        let span = source_span(SOURCE, Location::line(2, 2, 4));
        assert_eq!(span.offset(), 9);
        assert_eq!(span.len(), 2);
    }

    #[test]
    fn columns_count_characters_not_bytes() {
        let source = "BEGIN { printf(\"é\"); }\n";
        let span = source_span(source, Location::line(1, 17, 18));
        assert_eq!(span.offset(), 16);
        assert_eq!(span.len(), 2);
        assert!(source.is_char_boundary(span.offset() + span.len()));

        let diag = Diagnostic::error("bad literal").at(Location::line(1, 17, 18));
        let report = to_report(&diag, source, "script.bt");
        let mut rendered = String::new();
        miette::GraphicalReportHandler::new()
            .render_report(&mut rendered, &*report)
            .expect("report renders");
        assert!(rendered.contains("bad literal"));
    }

    #[test]
    fn hints_become_help() {
        let diags = vec![
            Diagnostic::error("Cannot call function 'f' using argument types: ()"),
            Diagnostic::hint("Candidate function:\n  f(int64)"),
            Diagnostic::warning("unused"),
        ];
        let reports = to_reports(&diags, SOURCE, "script.bt");
        assert_eq!(reports.len(), 2);
        assert_eq!(
            reports[0].help().map(|help| help.to_string()),
            Some("Candidate function:\n  f(int64)".to_string())
        );
        assert_eq!(reports[1].to_string(), "warning: unused");
    }
}
