// SPDX-FileCopyrightText: 2025 2025 Contributors to the dlresolve project.
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::VecDeque,
    env, fmt,
    path::{Path, PathBuf},
    vec,
};

use crate::{
    Error, Result,
    platform::Platform,
    probe::SystemProbe,
    target::TargetLibrary,
};

/// Where a candidate came from, in rough order of trust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateSource {
    /// Shipped next to the application.
    Bundled,
    WorkingDir,
    WellKnownPrefix,
    /// Resolved through the dynamic linker cache.
    PackageCacheQuery,
    /// Found on `PATH`.
    PathSearch,
    /// Bare name left to the OS loader's own search.
    SystemDefault,
}

impl CandidateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::Bundled => "bundled",
            CandidateSource::WorkingDir => "cwd",
            CandidateSource::WellKnownPrefix => "well-known-prefix",
            CandidateSource::PackageCacheQuery => "package-cache-query",
            CandidateSource::PathSearch => "path-search",
            CandidateSource::SystemDefault => "system-default",
        }
    }
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A path, or a bare library name, worth handing to the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    target: PathBuf,
    source: CandidateSource,
}

impl Candidate {
    pub fn new(target: impl Into<PathBuf>, source: CandidateSource) -> Self {
        Self {
            target: target.into(),
            source,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn source(&self) -> CandidateSource {
        self.source
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.target.display(), self.source)
    }
}

/// The host facts candidate generation depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchContext {
    pub platform: Platform,
    /// Directory the application is installed in.
    pub base_dir: PathBuf,
    pub cwd: PathBuf,
}

impl SearchContext {
    pub fn new(platform: Platform, base_dir: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            platform,
            base_dir: base_dir.into(),
            cwd: cwd.into(),
        }
    }

    /// Current platform, the running executable's directory and the process
    /// working directory.
    pub fn from_env() -> Result<Self> {
        let cwd = env::current_dir().map_err(Error::CurrentDir)?;
        let base_dir = env::current_exe()
            .map_err(Error::ExecutableDir)?
            .parent()
            .map_or_else(|| cwd.clone(), Path::to_path_buf);
        Ok(Self::new(Platform::current(), base_dir, cwd))
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }
}

/// One planned lookup. Steps that need the probe run only when pulled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Path {
        target: PathBuf,
        source: CandidateSource,
    },
    /// Linker cache lookup, or `fallback` when the cache has no entry.
    LinkerCache { file: String, fallback: PathBuf },
    PathSearch { file: String },
    /// `<root>/<each subdirectory>/<subdir>/<file>`
    VersionedDirs {
        root: PathBuf,
        subdir: String,
        file: String,
    },
    SystemDefault { name: String },
}

impl Step {
    pub(crate) fn path(dir: impl AsRef<Path>, file: &str, source: CandidateSource) -> Self {
        Step::Path {
            target: dir.as_ref().join(file),
            source,
        }
    }
}

/// Lazy, single-pass candidate sequence produced by [`generate`].
///
/// Yields `Ok(None)` for lookups that found nothing and `Err` when a probe
/// could not run at all.
pub struct Candidates<'a> {
    probe: &'a dyn SystemProbe,
    steps: vec::IntoIter<Step>,
    pending: VecDeque<Candidate>,
}

impl Iterator for Candidates<'_> {
    type Item = Result<Option<Candidate>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(candidate) = self.pending.pop_front() {
                return Some(Ok(Some(candidate)));
            }

            let item = match self.steps.next()? {
                Step::Path { target, source } => Ok(Some(Candidate::new(target, source))),
                Step::LinkerCache { file, fallback } => match self.probe.linker_cache(&file) {
                    Ok(Some(path)) => Ok(Some(Candidate::new(
                        path,
                        CandidateSource::PackageCacheQuery,
                    ))),
                    Ok(None) => Ok(Some(Candidate::new(
                        fallback,
                        CandidateSource::WellKnownPrefix,
                    ))),
                    Err(err) => Err(err.into()),
                },
                Step::PathSearch { file } => Ok(self
                    .probe
                    .search_path(&file)
                    .map(|path| Candidate::new(path, CandidateSource::PathSearch))),
                Step::VersionedDirs { root, subdir, file } => {
                    self.pending.extend(self.probe.list_dir(&root).into_iter().map(|dir| {
                        Candidate::new(
                            dir.join(&subdir).join(&file),
                            CandidateSource::WellKnownPrefix,
                        )
                    }));
                    continue;
                }
                Step::SystemDefault { name } => {
                    Ok(Some(Candidate::new(name, CandidateSource::SystemDefault)))
                }
            };
            return Some(item);
        }
    }
}

/// Builds the prioritized candidate sequence for `target` on `context.platform`.
///
/// Bundled copies come first, then the working directory, then the
/// platform's well-known locations, and finally the bare system name.
pub fn generate<'a>(
    context: &SearchContext,
    target: &TargetLibrary,
    probe: &'a dyn SystemProbe,
) -> Candidates<'a> {
    let mut steps = context.platform.strategy().plan(context, target);
    steps.push(Step::SystemDefault {
        name: target.system_name(context.platform),
    });
    Candidates {
        probe,
        steps: steps.into_iter(),
        pending: VecDeque::new(),
    }
}
