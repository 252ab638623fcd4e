use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Runtime failures. Constructs the evaluator does not model are reported
/// as `Unsupported` instead of being guessed at.
#[derive(Debug, Error, Diagnostic)]
pub enum EvalError {
    #[error("no package main in program")]
    #[diagnostic(code(govis::eval::no_main_package))]
    NoMainPackage,

    #[error("function main is undeclared in the main package")]
    #[diagnostic(code(govis::eval::missing_main))]
    MissingMain,

    #[error("unsupported: {what}")]
    #[diagnostic(code(govis::eval::unsupported))]
    Unsupported {
        what: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("not supported by the evaluator")]
        span: SourceSpan,
    },

    #[error("undefined: {name}")]
    #[diagnostic(code(govis::eval::undefined))]
    Undefined {
        name: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("not found")]
        span: SourceSpan,
    },

    #[error("runtime error: {message}")]
    #[diagnostic(code(govis::eval::panic))]
    Panic {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    /// A call to the `panic` builtin.
    #[error("panic: {message}")]
    #[diagnostic(code(govis::eval::user_panic))]
    UserPanic {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("panicked here")]
        span: SourceSpan,
    },

    #[error("evaluation exceeded {0} steps")]
    #[diagnostic(
        code(govis::eval::step_limit),
        help("raise the step limit or check for an infinite loop")
    )]
    StepLimit(u64),

    #[error("failed to write program output")]
    #[diagnostic(code(govis::eval::io))]
    Io(#[from] std::io::Error),
}

pub type EvalResult<T> = Result<T, EvalError>;
