pub mod cli;
pub mod language;
pub mod project;
pub mod runtime;
pub mod target;
pub mod tools;

#[cfg(test)]
mod tests;
