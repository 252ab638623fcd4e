//! Static visibility checking.
//!
//! A field, method or package-level name declared in package `P` may be
//! referenced from package `Q` only when `Q == P` or the name is exported.
//! The [`checker`] walks every function body and package-level initializer,
//! resolves the types that struct literals and selectors refer to, and
//! reports each denied or unknown reference as a [`VisibilityError`].

mod visibility;
mod errors;
mod index;
mod types;
pub mod checker;

pub use visibility::{check_access, exported_spelling, Access};
pub use errors::{CheckFailed, CheckReport, VisibilityError};
pub use checker::{check_program, CheckOptions};
pub use index::{FileScope, ImportTarget, ProgramIndex, TypeEntry, VarEntry};
pub use types::display_type;
