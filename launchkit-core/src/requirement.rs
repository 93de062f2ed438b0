use crate::arch::Architecture;
use crate::runtime::{InstalledRuntimeSet, RuntimeFamily};
use crate::version::Version;
use crate::{Error, Result};
use std::fmt;

const NETFX_DOWNLOAD: &str = "https://dotnet.microsoft.com/download/dotnet-framework/thank-you";
const NETCORE_DOWNLOAD: &str = "https://dotnet.microsoft.com/download/dotnet-core/thank-you";

/// Minimum `Release` value under
/// `HKLM\SOFTWARE\Microsoft\NET Framework Setup\NDP\v4\Full` per version.
const NETFX_RELEASES: &[(Version, u32)] = &[
    (Version::new(4, 5, 0), 378389),
    (Version::new(4, 5, 1), 378675),
    (Version::new(4, 5, 2), 379893),
    (Version::new(4, 6, 0), 393295),
    (Version::new(4, 6, 1), 394254),
    (Version::new(4, 6, 2), 394802),
    (Version::new(4, 7, 0), 460798),
    (Version::new(4, 7, 1), 461308),
    (Version::new(4, 7, 2), 461808),
    (Version::new(4, 8, 0), 528040),
];

/// The runtime an application needs before it can be launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// .NET Framework 4.5 or later, detected through its registry release key.
    Framework { version: Version },
    /// .NET Core / .NET 5+, detected through the installed shared frameworks.
    Core { version: Version, desktop: bool },
}

impl Requirement {
    pub fn version(&self) -> Version {
        match self {
            Requirement::Framework { version } | Requirement::Core { version, .. } => *version,
        }
    }

    /// Rejects versions older than the detection logic understands.
    pub fn validate(&self) -> Result<()> {
        let (minimum, what) = match self {
            Requirement::Framework { .. } => (Version::new(4, 5, 0), ".NET Framework Runtime"),
            Requirement::Core { desktop: false, .. } => (
                RuntimeFamily::Core.minimum_supported(),
                RuntimeFamily::Core.display_name(),
            ),
            Requirement::Core { desktop: true, .. } => (
                RuntimeFamily::Desktop.minimum_supported(),
                RuntimeFamily::Desktop.display_name(),
            ),
        };
        if self.version().is_older_than(&minimum) {
            return Err(Error::UnsupportedRequirement(format!(
                "only {} {} or later can be detected",
                what,
                minimum.to_major_minor_string()
            )));
        }
        Ok(())
    }

    /// Checks a .NET Core requirement against the installed shared frameworks.
    ///
    /// .NET Framework is not listed by `dotnet`; check those with
    /// [`Requirement::is_satisfied_by_release`].
    pub fn is_satisfied_by(&self, installed: &InstalledRuntimeSet) -> Result<bool> {
        match self {
            Requirement::Core { version, desktop } => {
                Ok(installed.is_fully_installed(version, *desktop))
            }
            Requirement::Framework { .. } => Err(Error::UnsupportedRequirement(format!(
                "{self} is detected by its registry release value, not by dotnet"
            ))),
        }
    }

    pub fn minimum_release(&self) -> Option<u32> {
        let Requirement::Framework { version } = self else {
            return None;
        };
        NETFX_RELEASES
            .iter()
            .find(|(v, _)| v == version)
            .map(|(_, release)| *release)
    }

    /// Whether an installed .NET Framework `Release` value satisfies this.
    pub fn is_satisfied_by_release(&self, release: u32) -> bool {
        self.minimum_release().is_some_and(|minimum| minimum <= release)
    }

    pub fn installer_url(&self, arch: Architecture) -> String {
        match self {
            // no offline installer exists for 4.5
            Requirement::Framework { version } if *version == Version::new(4, 5, 0) => {
                format!("{NETFX_DOWNLOAD}/net45-web-installer")
            }
            Requirement::Framework { version } => {
                let patch = if version.patch > 0 {
                    version.patch.to_string()
                } else {
                    String::new()
                };
                format!(
                    "{NETFX_DOWNLOAD}/net{}{}{}-offline-installer",
                    version.major, version.minor, patch
                )
            }
            Requirement::Core { version, desktop } => format!(
                "{NETCORE_DOWNLOAD}/runtime-{}{}-windows-{}-installer",
                if *desktop { "desktop-" } else { "" },
                version,
                arch
            ),
        }
    }

    /// Error text shown when the requirement is not met.
    pub fn message(&self, app_name: &str) -> String {
        match self {
            Requirement::Framework { version } => {
                format!("{app_name} requires .NET Framework {version} or later.")
            }
            Requirement::Core { version, desktop } => format!(
                "{app_name} requires .NET Core {}Runtime {}.",
                if *desktop { "Desktop " } else { "" },
                version.to_major_minor_string()
            ),
        }
    }

    pub fn caption(&self) -> String {
        match self {
            Requirement::Framework { version } => format!("Install .NET Framework {version}"),
            Requirement::Core { version, desktop } => format!(
                "Install .NET Core {}{} Runtime",
                version.to_major_minor_string(),
                if *desktop { " Desktop" } else { "" }
            ),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Framework { version } => write!(f, ".NET Framework {version}"),
            Requirement::Core {
                version,
                desktop: false,
            } => write!(f, "{} {version}", RuntimeFamily::Core.display_name()),
            Requirement::Core {
                version,
                desktop: true,
            } => write!(f, "{} {version}", RuntimeFamily::Desktop.display_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core(major: u16, minor: u16, patch: u16, desktop: bool) -> Requirement {
        Requirement::Core {
            version: Version::new(major, minor, patch),
            desktop,
        }
    }

    fn framework(major: u16, minor: u16, patch: u16) -> Requirement {
        Requirement::Framework {
            version: Version::new(major, minor, patch),
        }
    }

    #[test]
    fn validates_minimum_versions() {
        assert!(core(2, 1, 0, false).validate().is_ok());
        assert!(core(2, 0, 9, false).validate().is_err());
        assert!(core(2, 1, 0, true).validate().is_err());
        assert!(core(3, 0, 0, true).validate().is_ok());
        assert!(framework(4, 0, 0).validate().is_err());
        assert!(framework(4, 8, 0).validate().is_ok());
    }

    #[test]
    fn core_installer_urls() {
        assert_eq!(
            core(3, 1, 5, false).installer_url(Architecture::X64),
            "https://dotnet.microsoft.com/download/dotnet-core/thank-you/runtime-3.1.5-windows-x64-installer"
        );
        assert_eq!(
            core(5, 0, 5, true).installer_url(Architecture::Arm64),
            "https://dotnet.microsoft.com/download/dotnet-core/thank-you/runtime-desktop-5.0.5-windows-arm64-installer"
        );
        let preview = Requirement::Core {
            version: Version::preview(6, 0, 0, 3),
            desktop: true,
        };
        assert!(preview
            .installer_url(Architecture::X86)
            .ends_with("runtime-desktop-6.0.0-preview.3-windows-x86-installer"));
    }

    #[test]
    fn framework_installer_urls() {
        assert_eq!(
            framework(4, 5, 0).installer_url(Architecture::X64),
            "https://dotnet.microsoft.com/download/dotnet-framework/thank-you/net45-web-installer"
        );
        assert_eq!(
            framework(4, 8, 0).installer_url(Architecture::X64),
            "https://dotnet.microsoft.com/download/dotnet-framework/thank-you/net48-offline-installer"
        );
        assert_eq!(
            framework(4, 7, 2).installer_url(Architecture::X64),
            "https://dotnet.microsoft.com/download/dotnet-framework/thank-you/net472-offline-installer"
        );
    }

    #[test]
    fn framework_release_keys() {
        assert_eq!(framework(4, 8, 0).minimum_release(), Some(528040));
        assert_eq!(framework(4, 6, 2).minimum_release(), Some(394802));
        assert_eq!(framework(4, 9, 0).minimum_release(), None);
        assert!(framework(4, 7, 2).is_satisfied_by_release(528049));
        assert!(!framework(4, 8, 0).is_satisfied_by_release(461808));
        assert!(!framework(4, 9, 0).is_satisfied_by_release(u32::MAX));
        assert_eq!(core(6, 0, 0, false).minimum_release(), None);
    }

    #[test]
    fn core_requirement_uses_installed_set() {
        let installed = InstalledRuntimeSet::from_listing(
            "Microsoft.NETCore.App 6.0.14 [x]\nMicrosoft.WindowsDesktop.App 6.0.2 [x]\n",
        );
        assert!(core(6, 0, 0, true).is_satisfied_by(&installed).unwrap());
        assert!(core(6, 0, 10, false).is_satisfied_by(&installed).unwrap());
        assert!(!core(6, 0, 10, true).is_satisfied_by(&installed).unwrap());
        assert!(matches!(
            framework(4, 8, 0).is_satisfied_by(&installed),
            Err(Error::UnsupportedRequirement(_))
        ));
    }

    #[test]
    fn messages() {
        assert_eq!(
            core(6, 0, 2, true).message("PEBakery"),
            "PEBakery requires .NET Core Desktop Runtime 6.0."
        );
        assert_eq!(core(6, 0, 2, true).caption(), "Install .NET Core 6.0 Desktop Runtime");
        assert_eq!(core(8, 0, 0, false).caption(), "Install .NET Core 8.0 Runtime");
        assert_eq!(
            framework(4, 7, 2).message("PEBakery"),
            "PEBakery requires .NET Framework 4.7.2 or later."
        );
        assert_eq!(framework(4, 8, 0).caption(), "Install .NET Framework 4.8.0");
    }
}
