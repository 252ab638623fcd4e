use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// A static reference that the visibility rules reject.
#[derive(Debug, Error, Diagnostic)]
pub enum VisibilityError {
    /// The struct has no field with this name at all.
    #[error("unknown field '{field}' in struct literal of type {ty}")]
    #[diagnostic(code(govis::unknown_field))]
    UnknownField {
        field: String,
        ty: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("{ty} has no field named '{field}'")]
        span: SourceSpan,
    },

    /// The field exists but is unexported and the literal sits in another
    /// package. Reported with the same wording as a missing field.
    #[error("unknown field '{field}' in struct literal of type {ty}")]
    #[diagnostic(
        code(govis::private_field),
        help("export the field by renaming it to '{exported}', or construct the value inside package {package}")
    )]
    PrivateFieldAccess {
        field: String,
        ty: String,
        package: String,
        exported: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("'{field}' is only visible inside package {package}")]
        span: SourceSpan,
    },

    #[error("implicit assignment to unexported field '{field}' in struct literal of type {ty}")]
    #[diagnostic(
        code(govis::implicit_private_field),
        help("use field:value elements and omit the unexported field")
    )]
    ImplicitPrivateAssignment {
        field: String,
        ty: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("assigns '{field}'")]
        span: SourceSpan,
    },

    #[error("too few values in struct literal of type {ty}")]
    #[diagnostic(code(govis::too_few_values))]
    TooFewValues {
        ty: String,
        expected: usize,
        found: usize,
        #[source_code]
        src: NamedSource<String>,
        #[label("expected {expected} values, found {found}")]
        span: SourceSpan,
    },

    #[error("too many values in struct literal of type {ty}")]
    #[diagnostic(code(govis::too_many_values))]
    TooManyValues {
        ty: String,
        expected: usize,
        #[source_code]
        src: NamedSource<String>,
        #[label("{ty} has only {expected} fields")]
        span: SourceSpan,
    },

    #[error("duplicate field name '{field}' in struct literal")]
    #[diagnostic(code(govis::duplicate_field))]
    DuplicateField {
        field: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("'{field}' already set")]
        span: SourceSpan,
    },

    #[error("mixture of field:value and value elements in struct literal")]
    #[diagnostic(code(govis::mixed_literal))]
    MixedLiteral {
        #[source_code]
        src: NamedSource<String>,
        #[label("mixed elements")]
        span: SourceSpan,
    },

    #[error("{expr}.{name} undefined (cannot refer to unexported {member} {name})")]
    #[diagnostic(
        code(govis::unexported_selector),
        help("{member} '{name}' is only visible inside package {package}")
    )]
    UnexportedSelector {
        expr: String,
        name: String,
        member: &'static str,
        package: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("unexported {member}")]
        span: SourceSpan,
    },

    #[error("{expr}.{name} undefined (type {ty} has no field or method {name})")]
    #[diagnostic(code(govis::unknown_selector))]
    UnknownSelector {
        expr: String,
        name: String,
        ty: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("not found")]
        span: SourceSpan,
    },

    #[error("name {name} not exported by package {package}")]
    #[diagnostic(code(govis::unexported_name))]
    UnexportedName {
        name: String,
        package: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("unexported")]
        span: SourceSpan,
    },
}

impl VisibilityError {
    /// The field, method or package-level name the error is about, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            VisibilityError::UnknownField { field, .. }
            | VisibilityError::PrivateFieldAccess { field, .. }
            | VisibilityError::ImplicitPrivateAssignment { field, .. }
            | VisibilityError::DuplicateField { field, .. } => Some(field),
            VisibilityError::UnexportedSelector { name, .. }
            | VisibilityError::UnknownSelector { name, .. }
            | VisibilityError::UnexportedName { name, .. } => Some(name),
            VisibilityError::TooFewValues { .. }
            | VisibilityError::TooManyValues { .. }
            | VisibilityError::MixedLiteral { .. } => None,
        }
    }

    pub fn span(&self) -> SourceSpan {
        match self {
            VisibilityError::UnknownField { span, .. }
            | VisibilityError::PrivateFieldAccess { span, .. }
            | VisibilityError::ImplicitPrivateAssignment { span, .. }
            | VisibilityError::TooFewValues { span, .. }
            | VisibilityError::TooManyValues { span, .. }
            | VisibilityError::DuplicateField { span, .. }
            | VisibilityError::MixedLiteral { span, .. }
            | VisibilityError::UnexportedSelector { span, .. }
            | VisibilityError::UnknownSelector { span, .. }
            | VisibilityError::UnexportedName { span, .. } => *span,
        }
    }
}

/// Every error found in one checking pass.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub errors: Vec<VisibilityError>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), CheckFailed> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(CheckFailed {
            count: self.errors.len(),
            errors: self.errors,
        })
    }
}

/// The build fails as a whole when any reference is rejected.
#[derive(Debug, Error, Diagnostic)]
#[error("could not compile due to {count} visibility error(s)")]
#[diagnostic(code(govis::check_failed))]
pub struct CheckFailed {
    pub count: usize,
    #[related]
    pub errors: Vec<VisibilityError>,
}
