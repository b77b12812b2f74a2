// SPDX-FileCopyrightText: 2025 2025 Contributors to the dlresolve project.
// SPDX-License-Identifier: Apache-2.0

use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use dlresolve::{HostProbe, NativeLoader, Platform, SearchContext, TargetLibrary};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Show where a shared library would be loaded from, and load it.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Logical library name, e.g. `z` for libz.
    #[arg(required_unless_present = "libmagic")]
    name: Option<String>,

    /// Use the built-in libmagic naming rules.
    #[arg(long, conflicts_with = "name")]
    libmagic: bool,

    /// Linux file name, most specific first. Repeatable.
    #[arg(long = "linux-name")]
    linux_names: Vec<String>,

    /// macOS file name. Repeatable.
    #[arg(long = "darwin-name")]
    darwin_names: Vec<String>,

    /// Windows base name without `.dll`. Repeatable.
    #[arg(long = "windows-name")]
    windows_names: Vec<String>,

    /// Homebrew formula whose Cellar versions are searched on macOS.
    #[arg(long)]
    formula: Option<String>,

    /// Name handed to the OS loader as the last resort.
    #[arg(long)]
    system_name: Option<String>,

    /// Search as if running on this platform (linux, darwin, windows, other).
    #[arg(long)]
    platform: Option<Platform>,

    /// Directory treated as the application's install directory.
    #[arg(long, env = "DLRESOLVE_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Working directory to search instead of the current one.
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Give up on ldconfig after this many milliseconds.
    #[arg(long, default_value_t = 5000)]
    ldconfig_timeout_ms: u64,

    /// Print the candidates in search order without opening anything.
    #[arg(long)]
    list: bool,
}

impl Args {
    fn target(&self) -> TargetLibrary {
        let mut target = match &self.name {
            Some(name) if !self.libmagic => TargetLibrary::new(name.as_str()),
            _ => TargetLibrary::libmagic(),
        };
        if !self.linux_names.is_empty() {
            target = target.with_linux_names(self.linux_names.iter().cloned());
        }
        if !self.darwin_names.is_empty() {
            target = target.with_darwin_names(self.darwin_names.iter().cloned());
        }
        if !self.windows_names.is_empty() {
            target = target.with_windows_names(self.windows_names.iter().cloned());
        }
        if let Some(formula) = &self.formula {
            target = target.with_homebrew_formula(formula.as_str());
        }
        if let Some(system_name) = &self.system_name {
            target = target.with_system_name(system_name.as_str());
        }
        target
    }

    fn context(&self) -> dlresolve::Result<SearchContext> {
        let mut context = SearchContext::from_env()?;
        if let Some(platform) = self.platform {
            context = context.with_platform(platform);
        }
        if let Some(base_dir) = &self.base_dir {
            context = context.with_base_dir(base_dir);
        }
        if let Some(cwd) = &self.cwd {
            context = context.with_cwd(cwd);
        }
        Ok(context)
    }

    fn probe(&self) -> HostProbe {
        HostProbe::new().with_timeout(Duration::from_millis(self.ldconfig_timeout_ms))
    }
}

fn run(args: &Args) -> dlresolve::Result<()> {
    let target = args.target();
    let context = args.context()?;
    let probe = args.probe();
    debug!(
        library = target.name(),
        platform = %context.platform,
        base_dir = %context.base_dir.display(),
        cwd = %context.cwd.display(),
        ldconfig_timeout = ?probe.timeout(),
        "searching"
    );

    if args.list {
        for candidate in dlresolve::generate(&context, &target, &probe) {
            match candidate? {
                Some(candidate) => {
                    println!("{:<20} {}", candidate.source(), candidate.target().display())
                }
                None => println!("{:<20} -", "(not found)"),
            }
        }
        return Ok(());
    }

    let handle = dlresolve::load_with(&target, &context, &probe, NativeLoader)?;
    println!("{}", handle.path().display());
    handle.close();
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
