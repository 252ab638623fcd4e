mod types;
mod expr;
mod stmt;
mod item;
mod module;

pub use types::*;
pub use expr::*;
pub use stmt::*;
pub use item::*;
pub use module::*;
