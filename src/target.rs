use crate::{language::types::ValueType, project::WaspManifest};
use std::{env, mem};

pub const TARGET_ENV: &str = "WASP_TARGET";

/// Target for the LLVM backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildTarget {
    Host,
    Triple(String),
}

impl BuildTarget {
    pub fn host() -> Self {
        Self::Host
    }

    pub fn from_flag_or_env(flag: Option<String>) -> Self {
        let target = flag
            .or_else(|| env::var(TARGET_ENV).ok())
            .filter(|t| !t.trim().is_empty());
        match target {
            Some(triple) => Self::Triple(triple),
            None => Self::Host,
        }
    }

    /// Flag, then `WASP_TARGET`, then `build.target` from the manifest, then
    /// the host.
    pub fn resolve(flag: Option<String>, manifest: &WaspManifest) -> Self {
        match Self::from_flag_or_env(flag) {
            Self::Host => manifest
                .build
                .target
                .clone()
                .map(Self::Triple)
                .unwrap_or(Self::Host),
            explicit => explicit,
        }
    }

    pub fn triple(&self) -> Option<&str> {
        match self {
            BuildTarget::Host => None,
            BuildTarget::Triple(triple) => Some(triple),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, BuildTarget::Host)
    }

    pub fn pointer_width_bits(&self) -> u32 {
        match self.triple() {
            Some(triple) if is_32_bit_triple(triple) => 32,
            Some(_) => 64,
            None => (mem::size_of::<usize>() * 8) as u32,
        }
    }

    /// Pointer type an integer lands in when coerced to an address.
    pub fn pointer_type(&self) -> ValueType {
        if self.pointer_width_bits() == 32 {
            ValueType::Ptr32
        } else {
            ValueType::Ptr64
        }
    }
}

fn is_32_bit_triple(triple: &str) -> bool {
    let arch = triple.split('-').next().unwrap_or_default();
    matches!(arch, "i386" | "i586" | "i686" | "wasm32" | "xtensa" | "mips" | "mipsel")
        || arch.starts_with("riscv32")
        || arch.starts_with("arm")
        || arch.starts_with("thumb")
}
