//! Diagnostics: the user-visible error shape from spec.md §7 — a source
//! line, a caret underline, and a message.

use crate::span::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

/// A single reportable problem, anchored to a span in some source text.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub level: Level,
    pub stage: &'static str,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(stage: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self { level: Level::Error, stage, message: message.into(), span }
    }

    /// Render the "Woops! <stage> failed!" block from spec.md §6, including
    /// the two-line source snippet (line, then caret underline).
    pub fn render(&self, source: &str) -> String {
        let line_text = source
            .lines()
            .nth(self.span.line.saturating_sub(1) as usize)
            .unwrap_or("");

        let line_start = line_byte_offset(source, self.span.line);
        let col = self.span.start.saturating_sub(line_start);
        let width = self.span.len().max(1);

        let mut out = String::new();
        out.push_str(&format!("Woops! {} failed!\n", self.stage));
        out.push_str(line_text);
        out.push('\n');
        for _ in 0..col {
            out.push(' ');
        }
        for _ in 0..width {
            out.push('^');
        }
        out.push('\n');
        out.push_str(&self.message);
        out
    }
}

fn line_byte_offset(source: &str, line: u32) -> usize {
    let mut offset = 0;
    for (i, l) in source.split('\n').enumerate() {
        if i as u32 + 1 == line {
            return offset;
        }
        offset += l.len() + 1;
    }
    offset
}

/// Accumulates diagnostics for one compilation unit. The parser (per
/// spec.md §4.2) appends to this but aborts after the first error; the
/// REPL and file driver both read `handler.errors()` afterward to decide
/// whether to print and bail.
#[derive(Default, Debug)]
pub struct Handler {
    diagnostics: Vec<Diagnostic>,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == Level::Error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn first(&self) -> Option<&Diagnostic> {
        self.diagnostics.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_places_caret_under_span() {
        let src = "let x = ;";
        let diag = Diagnostic::error("parse", "expected expression", Span::new(8, 9, 1));
        let rendered = diag.render(src);
        assert!(rendered.contains("Woops! parse failed!"));
        assert!(rendered.contains("let x = ;"));
        assert!(rendered.ends_with("expected expression"));
    }

    #[test]
    fn handler_tracks_errors() {
        let mut h = Handler::new();
        assert!(!h.has_errors());
        h.emit(Diagnostic::error("parse", "oops", Span::DUMMY));
        assert!(h.has_errors());
        assert_eq!(h.diagnostics().len(), 1);
    }
}
