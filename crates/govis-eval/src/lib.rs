//! Evaluator for programs that passed the visibility check.
//!
//! Runs `main.main` over the HIR, covering the part of Go that struct
//! literal programs exercise: package-level variables, functions and
//! methods, pointers, slices and `fmt` printing. Anything else stops with
//! [`EvalError::Unsupported`].

mod error;
mod fmt;
mod interp;
mod value;

use std::io::Write;

use govis_common::{SourceMap, SymbolInterner};
use govis_hir::Program;

pub use error::{EvalError, EvalResult};
pub use fmt::{quote, sprint, sprintf, sprintln};
pub use interp::{Interpreter, DEFAULT_STEP_LIMIT};
pub use value::{Pointer, RtType, SliceValue, StructLayout, StructValue, Value};

/// Run the program's `main` function, writing its output to `out`.
pub fn run_main(
    program: &Program,
    sources: &SourceMap,
    interner: &SymbolInterner,
    out: &mut dyn Write,
) -> EvalResult<()> {
    Interpreter::new(program, sources, interner, out).run_main()
}
