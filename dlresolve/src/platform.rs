// SPDX-FileCopyrightText: 2025 2025 Contributors to the dlresolve project.
// SPDX-License-Identifier: Apache-2.0

//! Per-platform search policies.
//!
//! Each strategy turns a [`SearchContext`] and a [`TargetLibrary`] into an
//! ordered plan of lookup steps. Building a plan does no I/O; the steps are
//! evaluated lazily by [`crate::Candidates`].

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{
    candidate::{CandidateSource, SearchContext, Step},
    target::TargetLibrary,
};

const DARWIN_PREFIXES: &[&str] = &["/opt/local/lib", "/usr/local/lib", "/opt/homebrew/lib"];
const HOMEBREW_CELLAR: &str = "/usr/local/Cellar";
const LINUX_PREFIXES: &[&str] = &["/usr/local/lib"];
const LINUX_CACHE_FALLBACK_DIR: &str = "/usr/lib";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Darwin,
    Windows,
    Other,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub const fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::Darwin
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Darwin => "darwin",
            Platform::Windows => "windows",
            Platform::Other => "other",
        }
    }

    pub fn library_extension(&self) -> &'static str {
        match self {
            Platform::Darwin => "dylib",
            Platform::Windows => "dll",
            Platform::Linux | Platform::Other => "so",
        }
    }

    pub(crate) fn strategy(self) -> &'static dyn PlatformStrategy {
        match self {
            Platform::Linux => &LinuxStrategy,
            Platform::Darwin => &DarwinStrategy,
            Platform::Windows => &WindowsStrategy,
            Platform::Other => &OtherStrategy,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown platform `{0}`, expected one of linux, darwin, windows, other")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(Platform::Linux),
            "darwin" | "macos" => Ok(Platform::Darwin),
            "windows" | "win32" | "cygwin" => Ok(Platform::Windows),
            "other" => Ok(Platform::Other),
            _ => Err(UnknownPlatform(s.to_owned())),
        }
    }
}

pub(crate) trait PlatformStrategy: Sync {
    /// Ordered lookup steps, most trusted first, without the trailing
    /// system-default step which every platform shares.
    fn plan(&self, context: &SearchContext, target: &TargetLibrary) -> Vec<Step>;
}

/// Every file in `dir`, in name order.
fn dir_steps<'a>(
    dir: &'a Path,
    files: &'a [String],
    source: CandidateSource,
) -> impl Iterator<Item = Step> + 'a {
    files.iter().map(move |file| Step::path(dir, file, source))
}

/// Bundled directory first, then the working directory.
fn local_steps(context: &SearchContext, files: &[String]) -> Vec<Step> {
    dir_steps(&context.base_dir, files, CandidateSource::Bundled)
        .chain(dir_steps(&context.cwd, files, CandidateSource::WorkingDir))
        .collect()
}

fn prefix_steps(prefixes: &[&str], files: &[String]) -> Vec<Step> {
    prefixes
        .iter()
        .flat_map(|prefix| dir_steps(Path::new(prefix), files, CandidateSource::WellKnownPrefix))
        .collect()
}

struct DarwinStrategy;

impl PlatformStrategy for DarwinStrategy {
    fn plan(&self, context: &SearchContext, target: &TargetLibrary) -> Vec<Step> {
        let files = target.file_names(Platform::Darwin);
        let mut steps = local_steps(context, &files);
        steps.extend(prefix_steps(DARWIN_PREFIXES, &files));
        if let Some(formula) = target.homebrew_formula() {
            let root = PathBuf::from(HOMEBREW_CELLAR).join(formula);
            steps.extend(files.into_iter().map(|file| Step::VersionedDirs {
                root: root.clone(),
                subdir: "lib".into(),
                file,
            }));
        }
        steps
    }
}

struct WindowsStrategy;

impl PlatformStrategy for WindowsStrategy {
    fn plan(&self, context: &SearchContext, target: &TargetLibrary) -> Vec<Step> {
        let mut steps = Vec::new();
        for file in target.file_names(Platform::Windows) {
            steps.extend(local_steps(context, std::slice::from_ref(&file)));
            // PATH, but not the working directory
            steps.push(Step::PathSearch { file });
        }
        steps
    }
}

struct LinuxStrategy;

impl PlatformStrategy for LinuxStrategy {
    fn plan(&self, context: &SearchContext, target: &TargetLibrary) -> Vec<Step> {
        let files = target.file_names(Platform::Linux);
        let mut steps = local_steps(context, &files);
        // default install prefix for libraries built from source
        steps.extend(prefix_steps(LINUX_PREFIXES, &files));
        steps.extend(files.into_iter().map(|file| Step::LinkerCache {
            fallback: Path::new(LINUX_CACHE_FALLBACK_DIR).join(&file),
            file,
        }));
        steps
    }
}

struct OtherStrategy;

impl PlatformStrategy for OtherStrategy {
    fn plan(&self, context: &SearchContext, target: &TargetLibrary) -> Vec<Step> {
        local_steps(context, &target.file_names(Platform::Other))
    }
}
