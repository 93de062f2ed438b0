use serde::Serialize;
use std::fmt;

pub const IMAGE_FILE_MACHINE_I386: u16 = 0x014c;
pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
pub const IMAGE_FILE_MACHINE_ARM: u16 = 0x01c0;
pub const IMAGE_FILE_MACHINE_ARMNT: u16 = 0x01c4;
pub const IMAGE_FILE_MACHINE_ARM64: u16 = 0xaa64;

/// Processor architecture an image targets, or the host runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[default]
    Unknown,
    X86,
    X64,
    Arm,
    Arm64,
}

impl Architecture {
    /// Maps a COFF `Machine` value. Unrecognised codes map to `Unknown`.
    pub fn from_machine(machine: u16) -> Self {
        match machine {
            IMAGE_FILE_MACHINE_I386 => Architecture::X86,
            IMAGE_FILE_MACHINE_AMD64 => Architecture::X64,
            IMAGE_FILE_MACHINE_ARM | IMAGE_FILE_MACHINE_ARMNT => Architecture::Arm,
            IMAGE_FILE_MACHINE_ARM64 => Architecture::Arm64,
            _ => Architecture::Unknown,
        }
    }

    /// Architecture of the machine this binary was compiled for.
    pub fn host() -> Self {
        if cfg!(target_arch = "x86_64") {
            Architecture::X64
        } else if cfg!(target_arch = "x86") {
            Architecture::X86
        } else if cfg!(target_arch = "aarch64") {
            Architecture::Arm64
        } else if cfg!(target_arch = "arm") {
            Architecture::Arm
        } else {
            Architecture::Unknown
        }
    }

    pub fn bitness(self) -> u32 {
        match self {
            Architecture::X86 | Architecture::Arm => 32,
            Architecture::X64 | Architecture::Arm64 => 64,
            Architecture::Unknown => 0,
        }
    }

    /// Short name as used in runtime installer file names.
    pub fn as_str(self) -> &'static str {
        match self {
            Architecture::X86 => "x86",
            Architecture::X64 => "x64",
            Architecture::Arm => "arm",
            Architecture::Arm64 => "arm64",
            Architecture::Unknown => "unknown",
        }
    }

    /// Architectures a host can execute natively or through emulation.
    pub fn compatible_guests(host: Architecture) -> &'static [Architecture] {
        match host {
            Architecture::X86 => &[Architecture::X86],
            Architecture::X64 => &[Architecture::X64, Architecture::X86],
            Architecture::Arm => &[Architecture::Arm],
            Architecture::Arm64 => &[
                Architecture::Arm64,
                Architecture::Arm,
                Architecture::X64,
                Architecture::X86,
            ],
            Architecture::Unknown => &[],
        }
    }

    pub fn can_run_on(self, host: Architecture) -> bool {
        Architecture::compatible_guests(host).contains(&self)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
