//! Target description consumed by the concrete layout algorithm.

use std::env;
use std::fmt;

/// Supported architecture families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetArch {
    X86_64,
    Aarch64,
    X86,
    Arm,
    Wasm32,
}

impl TargetArch {
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "x86_64" | "amd64" | "x64" => Some(TargetArch::X86_64),
            "aarch64" | "arm64" => Some(TargetArch::Aarch64),
            "x86" | "i386" | "i586" | "i686" => Some(TargetArch::X86),
            "arm" | "armv7" | "thumbv7" => Some(TargetArch::Arm),
            "wasm32" | "wasm" => Some(TargetArch::Wasm32),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TargetArch::X86_64 => "x86_64",
            TargetArch::Aarch64 => "aarch64",
            TargetArch::X86 => "x86",
            TargetArch::Arm => "arm",
            TargetArch::Wasm32 => "wasm32",
        }
    }

    #[must_use]
    pub fn pointer_size(self) -> usize {
        match self {
            TargetArch::X86_64 | TargetArch::Aarch64 => 8,
            TargetArch::X86 | TargetArch::Arm | TargetArch::Wasm32 => 4,
        }
    }
}

/// Supported operating systems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOs {
    Macos,
    Linux,
    Windows,
    None,
    Other(String),
}

impl TargetOs {
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token {
            "darwin" | "macos" | "ios" => TargetOs::Macos,
            "linux" => TargetOs::Linux,
            "windows" | "pc" | "win" => TargetOs::Windows,
            "none" | "unknown" => TargetOs::None,
            other => TargetOs::Other(other.to_string()),
        }
    }

    fn triple_component(&self) -> &str {
        match self {
            TargetOs::Macos => "macos",
            TargetOs::Linux => "linux",
            TargetOs::Windows => "windows",
            TargetOs::None => "none",
            TargetOs::Other(value) => value.as_str(),
        }
    }
}

/// Target triple plus the ABI facts layout depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    arch: TargetArch,
    os: TargetOs,
    triple: String,
}

impl Target {
    /// Construct the target representing the current host.
    #[must_use]
    pub fn host() -> Self {
        let arch = TargetArch::parse(env::consts::ARCH).unwrap_or(TargetArch::X86_64);
        let os = TargetOs::parse(env::consts::OS);
        Self::from_components(arch, os)
    }

    /// Parse a target triple or architecture shorthand.
    ///
    /// # Errors
    ///
    /// Returns [`TargetError::Empty`] when the input is blank and
    /// [`TargetError::UnsupportedArch`] when the architecture prefix is not recognised.
    pub fn parse(triple: &str) -> Result<Self, TargetError> {
        let trimmed = triple.trim().to_ascii_lowercase();
        if trimmed.is_empty() {
            return Err(TargetError::Empty);
        }

        let mut parts = trimmed.splitn(2, '-');
        let arch_token = parts.next().unwrap_or_default();
        let arch = TargetArch::parse(arch_token)
            .ok_or_else(|| TargetError::UnsupportedArch(arch_token.to_string()))?;

        match parts.next() {
            Some(rest) => {
                let mut rest_iter = rest.split('-');
                let _vendor = rest_iter.next();
                let os = TargetOs::parse(rest_iter.next().unwrap_or("none"));
                Ok(Self {
                    arch,
                    os,
                    triple: trimmed.clone(),
                })
            }
            None => Ok(Self::from_components(arch, TargetOs::None)),
        }
    }

    /// Construct a target from explicit components.
    #[must_use]
    pub fn from_components(arch: TargetArch, os: TargetOs) -> Self {
        let vendor = match os {
            TargetOs::Macos => "apple",
            TargetOs::Windows => "pc",
            TargetOs::Linux | TargetOs::None | TargetOs::Other(_) => "unknown",
        };
        let triple = format!("{}-{}-{}", arch.as_str(), vendor, os.triple_component());
        Self { arch, os, triple }
    }

    #[must_use]
    pub fn arch(&self) -> TargetArch {
        self.arch
    }

    #[must_use]
    pub fn os(&self) -> &TargetOs {
        &self.os
    }

    #[must_use]
    pub fn triple(&self) -> &str {
        &self.triple
    }

    /// Size of object references, native ints and unmanaged pointers.
    #[must_use]
    pub fn pointer_size(&self) -> usize {
        self.arch.pointer_size()
    }

    #[must_use]
    pub fn pointer_align(&self) -> usize {
        self.arch.pointer_size()
    }

    /// 64-bit integers and doubles are only 4-aligned on 32-bit x86.
    #[must_use]
    pub fn int64_align(&self) -> usize {
        match self.arch {
            TargetArch::X86 => 4,
            _ => 8,
        }
    }

    /// Whether the calling convention passes homogeneous float aggregates in registers.
    #[must_use]
    pub fn supports_homogeneous_aggregates(&self) -> bool {
        matches!(self.arch, TargetArch::Aarch64 | TargetArch::Arm)
    }

    /// Homogeneous vector aggregates are an AArch64-only convention.
    #[must_use]
    pub fn supports_vector_aggregates(&self) -> bool {
        matches!(self.arch, TargetArch::Aarch64)
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::host()
    }
}

/// Errors encountered while parsing a target triple.
#[derive(Debug, Clone)]
pub enum TargetError {
    Empty,
    UnsupportedArch(String),
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetError::Empty => write!(f, "target string must not be empty"),
            TargetError::UnsupportedArch(arch) => {
                write!(
                    f,
                    "unsupported architecture '{arch}'; expected one of x86_64, aarch64, x86, arm, wasm32"
                )
            }
        }
    }
}

impl std::error::Error for TargetError {}
