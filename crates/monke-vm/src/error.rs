//! Runtime error type (spec.md §7): carries the failing message plus a
//! call-stack trace captured at the moment the error was raised.

use thiserror::Error;

/// One entry in a call-stack trace: the function name it was bound
/// under (if any) and the source line its frame was executing.
#[derive(Clone, Debug)]
pub struct TraceEntry {
    pub function_name: Option<String>,
    pub line: Option<u32>,
}

#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    /// Innermost frame first (spec.md §4.7: "walks the frame stack from
    /// innermost to outermost").
    pub trace: Vec<TraceEntry>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), trace: Vec::new() }
    }

    /// Full call-stack trace text: one line per frame, then the message
    /// (spec.md §4.7, §7).
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.trace {
            let name = entry.function_name.as_deref().unwrap_or("<anonymous>");
            match entry.line {
                Some(line) => out.push_str(&format!("  at {} (line {})\n", name, line)),
                None => out.push_str(&format!("  at {}\n", name)),
            }
        }
        out.push_str(&self.message);
        out
    }
}
