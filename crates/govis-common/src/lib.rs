mod span;
mod symbol;
mod source;
mod diagnostic;

pub use span::Span;
pub use symbol::{Symbol, SymbolInterner};
pub use source::{SourceFile, SourceId, SourceMap};
pub use diagnostic::Diagnostic;
