pub mod error;
pub mod interpreter;
pub mod ir;
pub mod value;

pub use interpreter::{Interpreter, Outcome};
pub use ir::{Module, ReferenceBuilder};
