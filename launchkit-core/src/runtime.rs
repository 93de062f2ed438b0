pub mod enumerate;

use crate::version::Version;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

pub use enumerate::EnumerateOptions;

pub const NET_CORE_ID: &str = "Microsoft.NETCore.App";
pub const WINDOWS_DESKTOP_RUNTIME_ID: &str = "Microsoft.WindowsDesktop.App";

/// The two shared frameworks a launcher cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RuntimeFamily {
    /// `Microsoft.NETCore.App`
    Core,
    /// `Microsoft.WindowsDesktop.App`, shipped since .NET Core 3.0
    Desktop,
}

impl RuntimeFamily {
    pub fn id(self) -> &'static str {
        match self {
            RuntimeFamily::Core => NET_CORE_ID,
            RuntimeFamily::Desktop => WINDOWS_DESKTOP_RUNTIME_ID,
        }
    }

    /// Oldest version whose installations can be detected.
    pub fn minimum_supported(self) -> Version {
        match self {
            RuntimeFamily::Core => Version::new(2, 1, 0),
            RuntimeFamily::Desktop => Version::new(3, 0, 0),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            RuntimeFamily::Core => ".NET Core Runtime",
            RuntimeFamily::Desktop => ".NET Core Desktop Runtime",
        }
    }
}

impl fmt::Display for RuntimeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Installed runtime versions keyed by family id, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InstalledRuntimeSet {
    families: BTreeMap<String, Vec<Version>>,
}

impl InstalledRuntimeSet {
    /// Builds the set from `dotnet --list-runtimes` style output.
    ///
    /// Lines that do not parse are skipped so one bad line cannot hide the
    /// runtimes reported on the others.
    pub fn from_listing(text: &str) -> Self {
        let mut set = Self::default();
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_runtime_info_line(line) {
                Ok((key, version)) => set.insert(key, version),
                Err(e) => log::debug!("Skipping runtime line: {}", e),
            }
        }
        log::debug!(
            "Found {} runtime families ({} versions)",
            set.families.len(),
            set.families.values().map(Vec::len).sum::<usize>()
        );
        set
    }

    /// Runs the enumerator and parses its output.
    pub fn scan(options: &EnumerateOptions) -> Result<Self> {
        let listing = enumerate::list_runtimes(options)?;
        Ok(Self::from_listing(&listing))
    }

    pub fn insert(&mut self, key: impl Into<String>, version: Version) {
        self.families.entry(key.into()).or_default().push(version);
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn families(&self) -> impl Iterator<Item = (&str, &[Version])> {
        self.families
            .iter()
            .map(|(key, versions)| (key.as_str(), versions.as_slice()))
    }

    pub fn versions(&self, key: &str) -> &[Version] {
        self.families.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_family_installed(&self, key: &str, required: &Version) -> bool {
        self.versions(key)
            .iter()
            .any(|installed| required.is_compatible(installed))
    }

    pub fn is_fully_installed(&self, required: &Version, check_desktop: bool) -> bool {
        let core = self.is_family_installed(NET_CORE_ID, required);
        if !check_desktop {
            return core;
        }
        core && self.is_family_installed(WINDOWS_DESKTOP_RUNTIME_ID, required)
    }

    /// Latest compatible installed version of `key`, if any.
    pub fn latest_compatible(&self, key: &str, required: &Version) -> Option<Version> {
        let compatible: Vec<Version> = self
            .versions(key)
            .iter()
            .copied()
            .filter(|installed| required.is_compatible(installed))
            .collect();
        latest(&compatible)
    }

    /// Latest version with the given major that is installed for the core
    /// family and, with `check_desktop`, for the desktop family too.
    pub fn resolve_latest(&self, major: u16, check_desktop: bool) -> Option<Version> {
        let with_major = |key: &str| -> Vec<Version> {
            self.versions(key)
                .iter()
                .copied()
                .filter(|v| v.major == major)
                .collect()
        };

        let mut candidates = with_major(NET_CORE_ID);
        if check_desktop {
            let desktop: HashSet<Version> = with_major(WINDOWS_DESKTOP_RUNTIME_ID)
                .into_iter()
                .collect();
            candidates.retain(|v| desktop.contains(v));
        }

        let found = latest_matching(&candidates, major);
        if found.is_zero() {
            return None;
        }
        log::info!("Resolved latest runtime {} for major {}", found, major);
        Some(found)
    }
}

/// Maximum of `versions` whose major equals `major`, or `0.0.0` if none.
///
/// Among equal `major.minor.patch` triples the final release is preferred
/// over a preview.
pub fn latest_matching(versions: &[Version], major: u16) -> Version {
    let matching: Vec<Version> = versions
        .iter()
        .copied()
        .filter(|v| v.major == major)
        .collect();
    latest(&matching).unwrap_or_default()
}

fn latest(versions: &[Version]) -> Option<Version> {
    versions.iter().copied().max_by(|a, b| {
        a.release_cmp(b)
            .then_with(|| b.is_preview().cmp(&a.is_preview()))
            .then_with(|| a.preview.cmp(&b.preview))
    })
}

/// Splits one `<FamilyId> <Version> [<InstallPath>]` line.
///
/// ```text
/// Microsoft.NETCore.App 6.0.0-preview.3.21201.4 [C:\Program Files\dotnet\shared\Microsoft.NETCore.App]
/// ```
pub fn parse_runtime_info_line(line: &str) -> Result<(String, Version)> {
    let malformed = || Error::MalformedRuntimeLine(line.to_string());
    let line = line.trim();

    let (key, rest) = line.split_once(' ').ok_or_else(malformed)?;
    let version = rest.split(' ').next().unwrap_or_default();
    if key.is_empty() || version.is_empty() {
        return Err(malformed());
    }

    let version = Version::parse(version)?;
    Ok((key.to_string(), version))
}
