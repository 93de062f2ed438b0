use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use launchkit_core::runtime::{EnumerateOptions, NET_CORE_ID, WINDOWS_DESKTOP_RUNTIME_ID};
use launchkit_core::{Architecture, Error, Header, InstalledRuntimeSet, PeHeader, Requirement, Version};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// .NET application launcher toolkit
#[derive(Parser)]
#[command(
    name = "launchkit",
    about = "Inspect launch targets and detect installed .NET runtimes",
    version,
    author
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show architecture, format and managed flag of a PE executable
    Inspect {
        /// Path to executable
        path: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List installed .NET runtimes
    Runtimes {
        #[command(flatten)]
        source: RuntimeSource,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Check that a runtime compatible with a required version is installed
    Check {
        /// Required runtime version, e.g. 6.0.2 or 6.0.0-preview.3
        #[arg(long, value_name = "VERSION")]
        require: Version,
        /// Also require the Windows Desktop runtime
        #[arg(long)]
        desktop: bool,
        /// Application name used in messages
        #[arg(long, default_value = "The application")]
        app_name: String,
        #[command(flatten)]
        source: RuntimeSource,
    },
    /// Print the latest installed runtime of a major version
    Detect {
        /// Major version of the .NET runtime to check
        #[arg(long, value_name = "MAJOR")]
        req_major: u16,
        /// Print only the minor version
        #[arg(long, conflicts_with = "res_patch")]
        res_minor: bool,
        /// Print only the patch version
        #[arg(long)]
        res_patch: bool,
        /// Also check the Windows Desktop runtime
        #[arg(long)]
        win_desktop: bool,
        #[command(flatten)]
        source: RuntimeSource,
    },
    /// Check a .NET Framework release value read from the registry
    Framework {
        /// Required .NET Framework version, e.g. 4.8
        #[arg(long, value_name = "VERSION")]
        require: Version,
        /// Value of NDP\v4\Full\Release
        #[arg(long)]
        release: u32,
        /// Application name used in messages
        #[arg(long, default_value = "The application")]
        app_name: String,
    },
}

#[derive(Args)]
struct RuntimeSource {
    /// Read saved `dotnet --list-runtimes` output instead of running dotnet
    #[arg(long, value_name = "FILE")]
    listing: Option<PathBuf>,

    /// dotnet executable to run (default: looked up on PATH)
    #[arg(long, env = "LAUNCHKIT_DOTNET", value_name = "PATH")]
    dotnet: Option<PathBuf>,

    /// Seconds to wait for `dotnet --list-runtimes`
    #[arg(long, env = "LAUNCHKIT_TIMEOUT_SECS", default_value_t = 10, value_name = "SECS")]
    timeout: u64,
}

impl RuntimeSource {
    fn load(&self) -> Result<InstalledRuntimeSet> {
        if let Some(path) = &self.listing {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return Ok(InstalledRuntimeSet::from_listing(&text));
        }

        let options = EnumerateOptions {
            dotnet: self.dotnet.clone(),
            timeout: Duration::from_secs(self.timeout),
        };
        match InstalledRuntimeSet::scan(&options) {
            Ok(set) => Ok(set),
            // no dotnet host means no runtimes
            Err(Error::DotnetNotFound) => {
                log::warn!("dotnet not found; treating as no runtimes installed");
                Ok(InstalledRuntimeSet::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Serialize)]
struct InspectReport<'a> {
    path: &'a Path,
    #[serde(flatten)]
    header: &'a PeHeader,
    bitness: u32,
    dll: bool,
    runs_on_host: bool,
}

#[derive(Tabled)]
struct RuntimeRow {
    #[tabled(rename = "Runtime")]
    runtime: String,
    #[tabled(rename = "Version")]
    version: Version,
    #[tabled(rename = "Preview")]
    preview: &'static str,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ok = match cli.command {
        Command::Inspect { path, json } => inspect(&path, json)?,
        Command::Runtimes { source, json } => runtimes(&source, json)?,
        Command::Check {
            require,
            desktop,
            app_name,
            source,
        } => check(
            Requirement::Core {
                version: require,
                desktop,
            },
            &app_name,
            &source,
        )?,
        Command::Detect {
            req_major,
            res_minor,
            res_patch,
            win_desktop,
            source,
        } => detect(req_major, res_minor, res_patch, win_desktop, &source)?,
        Command::Framework {
            require,
            release,
            app_name,
        } => framework(Requirement::Framework { version: require }, release, &app_name)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn inspect(path: &Path, json: bool) -> Result<bool> {
    let header = match PeHeader::from_file(path) {
        Ok(header) => header,
        Err(e) => {
            log::error!("{}: {}", path.display(), e);
            eprintln!(
                "{}",
                format!("{} is corrupted or not a valid executable.", path.display()).red()
            );
            return Ok(false);
        }
    };
    let host = Architecture::host();

    if json {
        let report = InspectReport {
            path,
            header: &header,
            bitness: header.architecture.bitness(),
            dll: header.is_dll(),
            runs_on_host: header.architecture.can_run_on(host),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(true);
    }

    print_header(&header, host);
    println!("{:<18} {}", "Subsystem:", header.subsystem);
    println!("{:<18} {}", "", header.subsystem_name());
    println!("{:<18} 0x{:04x}", "Characteristics:", header.characteristics);
    Ok(true)
}

fn print_header(header: &dyn Header, host: Architecture) {
    let arch = header.architecture();
    let yes_no = |b: bool| if b { "yes" } else { "no" };

    println!("{:<18} {}", "Format:", header.format_name());
    println!("{:<18} {} ({}-bit)", "Architecture:", arch, arch.bitness());
    println!("{:<18} {}", "DLL:", yes_no(header.is_library()));
    println!("{:<18} {}", "Managed:", yes_no(header.is_managed()));
    println!(
        "{:<18} {} (host: {})",
        "Runs on host:",
        yes_no(arch.can_run_on(host)),
        host
    );
}

fn runtimes(source: &RuntimeSource, json: bool) -> Result<bool> {
    let installed = source.load()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&installed)?);
        return Ok(true);
    }

    if installed.is_empty() {
        println!("No .NET runtimes found.");
        return Ok(true);
    }

    let rows: Vec<RuntimeRow> = installed
        .families()
        .flat_map(|(key, versions)| {
            versions.iter().map(move |v| RuntimeRow {
                runtime: key.to_string(),
                version: *v,
                preview: if v.is_preview() { "yes" } else { "no" },
            })
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::modern());
    println!("{table}");
    Ok(true)
}

fn check(requirement: Requirement, app_name: &str, source: &RuntimeSource) -> Result<bool> {
    requirement.validate()?;
    let installed = source.load()?;

    if requirement.is_satisfied_by(&installed)? {
        let version = requirement.version();
        let found = installed
            .latest_compatible(NET_CORE_ID, &version)
            .unwrap_or(version);
        println!("{} {} satisfies {}", NET_CORE_ID, found, requirement);
        return Ok(true);
    }

    report_missing(&requirement, app_name);
    Ok(false)
}

fn detect(
    major: u16,
    res_minor: bool,
    res_patch: bool,
    win_desktop: bool,
    source: &RuntimeSource,
) -> Result<bool> {
    if major < 5 {
        eprintln!("--req-major [{major}] is too low, use [5] or later.");
        return Ok(false);
    }

    let installed = source.load()?;
    if installed.is_empty() {
        eprintln!("ERR: .NET Runtime is not installed.");
        return Ok(false);
    }

    let mut families = vec![NET_CORE_ID];
    if win_desktop {
        families.push(WINDOWS_DESKTOP_RUNTIME_ID);
    }
    let mut found = true;
    for key in families {
        let versions = installed.versions(key);
        if versions.is_empty() {
            eprintln!("ERR: .NET [{key}] runtime is not installed.");
            found = false;
        } else if !versions.iter().any(|v| v.major == major) {
            eprintln!("ERR: .NET [{key}] runtime v[{major}.x] is not installed.");
            found = false;
        }
    }
    if !found {
        return Ok(false);
    }

    let Some(latest) = installed.resolve_latest(major, win_desktop) else {
        eprintln!("ERR: .NET Runtime v[{major}.x] is not installed.");
        return Ok(false);
    };

    if res_minor {
        println!("{}", latest.minor);
    } else if res_patch {
        println!("{}", latest.patch);
    } else {
        println!("{latest}");
    }
    Ok(true)
}

fn framework(requirement: Requirement, release: u32, app_name: &str) -> Result<bool> {
    requirement.validate()?;
    if requirement.minimum_release().is_none() {
        log::warn!("No known release key for {}", requirement);
    }

    if requirement.is_satisfied_by_release(release) {
        println!("Release {release} satisfies {requirement}");
        return Ok(true);
    }

    report_missing(&requirement, app_name);
    Ok(false)
}

fn report_missing(requirement: &Requirement, app_name: &str) {
    eprintln!("{}", requirement.caption().bold());
    eprintln!("{}", requirement.message(app_name).red());
    eprintln!(
        "Download: {}",
        requirement.installer_url(Architecture::host())
    );
}
