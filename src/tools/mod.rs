#[cfg(feature = "llvm")]
pub mod build;
pub mod diagnostics;
pub mod tester;

pub const LLVM_UNAVAILABLE: &str =
    "the LLVM backend is not available in this build; rebuild with `--features llvm`";
