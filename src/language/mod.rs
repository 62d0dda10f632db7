pub mod assert;
pub mod ast;
pub mod compiler;
pub mod errors;
pub mod lexer;
pub mod literal;
pub mod operation;
pub mod parser;
pub mod span;
pub mod token;
pub mod types;
