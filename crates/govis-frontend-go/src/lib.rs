mod parser;
mod lower;

pub use parser::{first_syntax_error, parse};
pub use lower::lower;

use govis_common::{Diagnostic, SourceFile, Span, SymbolInterner};
use govis_hir::Module;
use miette::Result;

/// Parse a Go source file into HIR.
///
/// Files with syntax errors are rejected before lowering so the checker never
/// sees a partially recovered tree.
pub fn parse_file(source: &SourceFile, interner: &SymbolInterner) -> Result<Module> {
    let tree = parser::parse(&source.content)?;
    if let Some((start, end)) = parser::first_syntax_error(&tree) {
        let span = Span::new(source.id, start as u32, end.max(start + 1) as u32);
        return Err(Diagnostic::error(format!("syntax error in {}", source.display_name()))
            .with_source(source.named_source())
            .with_span(span)
            .with_label("unexpected input here")
            .into());
    }
    let module = lower::lower(tree, source, interner)?;
    tracing::trace!(
        file = %source.display_name(),
        items = module.items.len(),
        "lowered Go file"
    );
    Ok(module)
}
