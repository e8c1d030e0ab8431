//! Diagnostic formatting for the `tersify_mlir` CLI.

use std::ops::Range;

use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};

use crate::errors::{TersifyError, TersifyErrorKind};

/// Get the display color for an error kind.
pub fn kind_color(kind: &TersifyErrorKind) -> Color {
    match kind {
        TersifyErrorKind::Syntax(_) => Color::Red,
        TersifyErrorKind::Encoding(_) => Color::Yellow,
        TersifyErrorKind::Checker { .. } => Color::Magenta,
    }
}

/// Short code shown in the report header.
pub fn kind_code(kind: &TersifyErrorKind) -> &'static str {
    match kind {
        TersifyErrorKind::Syntax(_) => "syntax",
        TersifyErrorKind::Encoding(_) => "encoding",
        TersifyErrorKind::Checker { .. } => "checker",
    }
}

/// One character at `offset`, clamped into `input` and onto a char
/// boundary. Offsets at the end of input point at the last character.
pub fn label_span(input: &str, offset: usize) -> Option<Range<usize>> {
    let (last, _) = input.char_indices().next_back()?;
    let mut start = offset.min(last);
    while !input.is_char_boundary(start) {
        start -= 1;
    }
    let width = input[start..].chars().next().map_or(1, char::len_utf8);
    Some(start..start + width)
}

/// Render `error` as a report against `input`, followed by the input itself.
pub fn render_error(error: &TersifyError, input: &str, source_name: &str, color: bool) -> String {
    let kind = error.kind();
    let message = error.to_string();
    let mut out = Vec::new();

    if let Some(span) = error.offset().and_then(|offset| label_span(input, offset)) {
        let report = Report::build(ReportKind::Error, (source_name, span.clone()))
            .with_config(
                Config::default()
                    .with_color(color)
                    .with_index_type(IndexType::Byte),
            )
            .with_code(kind_code(kind))
            .with_message(&message)
            .with_label(
                Label::new((source_name, span))
                    .with_message(&message)
                    .with_color(kind_color(kind)),
            )
            .finish();
        if report
            .write((source_name, Source::from(input.to_owned())), &mut out)
            .is_err()
        {
            out.clear();
        }
    }

    let mut rendered = String::from_utf8_lossy(&out).into_owned();
    if rendered.is_empty() {
        rendered = format!("error[{}]: {message}\n", kind_code(kind));
    }
    rendered.push_str("\nInput:\n");
    rendered.push_str(input);
    if !input.ends_with('\n') {
        rendered.push('\n');
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use tersify_ir::{StructuralChecker, scan_module};

    fn syntax_error(input: &str) -> TersifyError {
        StructuralChecker.check(input).unwrap_err().into()
    }

    #[test]
    fn test_kind_color_syntax() {
        let err = syntax_error("asdf");
        assert_eq!(kind_color(err.kind()), Color::Red);
        assert_eq!(kind_code(err.kind()), "syntax");
    }

    #[test]
    fn test_kind_color_encoding() {
        let err: TersifyError = scan_module("module { #sparse_tensor.encoding<{}> }")
            .unwrap_err()
            .into();
        assert_eq!(kind_color(err.kind()), Color::Yellow);
        assert_eq!(kind_code(err.kind()), "encoding");
    }

    #[test]
    fn test_label_span_clamps() {
        assert_eq!(label_span("asdf", 0), Some(0..1));
        assert_eq!(label_span("asdf", 4), Some(3..4));
        assert_eq!(label_span("asdf", 99), Some(3..4));
        assert_eq!(label_span("", 0), None);
    }

    #[test]
    fn test_label_span_respects_char_boundaries() {
        // 'é' is two bytes
        assert_eq!(label_span("aé", 2), Some(1..3));
        assert_eq!(label_span("aé", 1), Some(1..3));
    }

    #[test]
    fn test_render_includes_message_and_input() {
        let err = syntax_error("asdf");
        let rendered = render_error(&err, "asdf", "<stdin>", false);
        assert!(rendered.contains("unknown top-level operation `asdf`"), "{rendered}");
        assert!(rendered.ends_with("\nInput:\nasdf\n"), "{rendered}");
    }

    #[test]
    fn test_render_empty_input() {
        let err: TersifyError = tersify_ir::SyntaxError {
            message: "empty".to_owned(),
            offset: 0,
        }
        .into();
        let rendered = render_error(&err, "", "<stdin>", false);
        assert!(rendered.starts_with("error[syntax]: syntax error at offset 0: empty\n"));
        assert!(rendered.ends_with("\nInput:\n\n"));
    }
}
