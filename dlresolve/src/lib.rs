// SPDX-FileCopyrightText: 2025 2025 Contributors to the dlresolve project.
// SPDX-License-Identifier: Apache-2.0

//! Locate and open a native shared library without knowing where it was installed.
//!
//! Candidates are generated lazily in priority order (bundled with the
//! application, working directory, well-known prefixes, linker cache or
//! `PATH`, and finally the bare library name) and the first one the OS
//! dynamic loader accepts is returned.
//!
//! ```no_run
//! use dlresolve::TargetLibrary;
//!
//! let handle = dlresolve::load(&TargetLibrary::libmagic())?;
//! println!("using {}", handle.path().display());
//! # Ok::<(), dlresolve::Error>(())
//! ```

mod candidate;
mod error;
mod loader;
mod platform;
mod probe;
mod target;

pub use candidate::{Candidate, CandidateSource, Candidates, SearchContext, generate};
pub use error::{Attempt, Error, ProbeError, Result};
pub use loader::{LibraryHandle, Loader, NativeLoader, Resolver};
pub use platform::{Platform, UnknownPlatform};
pub use probe::{
    DEFAULT_LDCONFIG_PROGRAMS, DEFAULT_LDCONFIG_TIMEOUT, HostProbe, SystemProbe,
    parse_ldconfig_output,
};
pub use target::TargetLibrary;

/// Finds and opens `target` using the host environment.
pub fn load(target: &TargetLibrary) -> Result<LibraryHandle> {
    let context = SearchContext::from_env()?;
    load_with(target, &context, &HostProbe::default(), NativeLoader)
}

/// Same as [`load`] with every collaborator supplied by the caller.
pub fn load_with<L: Loader>(
    target: &TargetLibrary,
    context: &SearchContext,
    probe: &dyn SystemProbe,
    loader: L,
) -> Result<L::Handle> {
    Resolver::new(loader).resolve(target.name(), generate(context, target, probe))
}
