//! Shared plumbing for the Monke pipeline: source spans and diagnostics.
//!
//! Every other crate in the workspace depends on this one; it carries no
//! dependency of its own beyond `thiserror`, mirroring `faxc-util`'s role
//! as the leaf crate of the pipeline.

pub mod diagnostic;
pub mod span;

pub use diagnostic::{Diagnostic, Handler, Level};
pub use span::Span;
