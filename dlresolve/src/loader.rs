// SPDX-FileCopyrightText: 2025 2025 Contributors to the dlresolve project.
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, path::Path};

use dlopen2::raw::Library;
use tracing::{debug, info, warn};

use crate::{
    Error, Result,
    candidate::{Candidate, CandidateSource},
    error::Attempt,
};

/// Opens a single candidate as a dynamic library.
pub trait Loader {
    type Handle;

    fn open(&self, candidate: &Candidate) -> Result<Self::Handle>;
}

impl<L: Loader + ?Sized> Loader for &L {
    type Handle = L::Handle;

    fn open(&self, candidate: &Candidate) -> Result<Self::Handle> {
        (**self).open(candidate)
    }
}

/// Loads through the OS dynamic loader (`dlopen` / `LoadLibrary`).
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

impl Loader for NativeLoader {
    type Handle = LibraryHandle;

    fn open(&self, candidate: &Candidate) -> Result<LibraryHandle> {
        let library = Library::open(candidate.target())?;
        Ok(LibraryHandle {
            library,
            candidate: candidate.clone(),
        })
    }
}

/// An opened dynamic library. Closed when dropped or via [`LibraryHandle::close`].
pub struct LibraryHandle {
    library: Library,
    candidate: Candidate,
}

impl LibraryHandle {
    /// Path or name the library was opened from.
    pub fn path(&self) -> &Path {
        self.candidate.target()
    }

    pub fn source(&self) -> CandidateSource {
        self.candidate.source()
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    /// The raw library, for binding symbols.
    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn close(self) {
        debug!(path = %self.path().display(), "closing library");
        drop(self.library);
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("candidate", &self.candidate)
            .finish_non_exhaustive()
    }
}

/// Walks candidates in order and keeps the first one the loader accepts.
#[derive(Debug, Default, Clone)]
pub struct Resolver<L> {
    loader: L,
}

impl<L: Loader> Resolver<L> {
    pub fn new(loader: L) -> Self {
        Self { loader }
    }

    /// Opens the first loadable candidate for the library called `name`.
    ///
    /// Empty candidates are skipped without touching the loader and loader
    /// failures move on to the next candidate. Errors produced by the
    /// candidate sequence itself are returned as is. At most one library is
    /// opened per call.
    pub fn resolve<I>(&self, name: &str, candidates: I) -> Result<L::Handle>
    where
        I: IntoIterator<Item = Result<Option<Candidate>>>,
    {
        let mut attempts = Vec::new();
        for candidate in candidates {
            let Some(candidate) = candidate? else {
                debug!(library = name, "skipping unresolved lookup");
                continue;
            };
            match self.loader.open(&candidate) {
                Ok(handle) => {
                    info!(
                        library = name,
                        path = %candidate.target().display(),
                        source = %candidate.source(),
                        "loaded library"
                    );
                    return Ok(handle);
                }
                Err(err) => {
                    debug!(library = name, %candidate, error = %err, "candidate unavailable");
                    attempts.push(Attempt {
                        candidate,
                        reason: err.to_string(),
                    });
                }
            }
        }

        warn!(
            library = name,
            attempts = attempts.len(),
            "no candidate could be loaded"
        );
        Err(Error::LibraryNotFound {
            name: name.to_owned(),
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, io};

    use super::*;
    use crate::error::ProbeError;

    /// Succeeds only for the listed targets and records every open.
    #[derive(Default)]
    struct FakeLoader {
        loadable: Vec<&'static str>,
        opened: RefCell<Vec<String>>,
    }

    impl Loader for FakeLoader {
        type Handle = String;

        fn open(&self, candidate: &Candidate) -> Result<String> {
            let target = candidate.target().to_string_lossy().into_owned();
            self.opened.borrow_mut().push(target.clone());
            if self.loadable.contains(&target.as_str()) {
                Ok(target)
            } else {
                Err(Error::Open(dlopen2::Error::OpeningLibraryError(io::Error::from(
                    io::ErrorKind::NotFound,
                ))))
            }
        }
    }

    fn candidates(targets: &[&str]) -> Vec<Result<Option<Candidate>>> {
        targets
            .iter()
            .map(|t| Ok(Some(Candidate::new(*t, CandidateSource::WellKnownPrefix))))
            .collect()
    }

    #[test]
    fn stops_at_first_success() {
        let loader = FakeLoader {
            loadable: vec!["/c", "/d"],
            ..Default::default()
        };
        let handle = Resolver::new(&loader)
            .resolve("demo", candidates(&["/a", "/b", "/c", "/d", "/e"]))
            .unwrap();
        assert_eq!(handle, "/c");
        assert_eq!(*loader.opened.borrow(), ["/a", "/b", "/c"]);
    }

    #[test]
    fn exhaustion_reports_every_attempt_in_order() {
        let loader = FakeLoader::default();
        let err = Resolver::new(&loader)
            .resolve("demo", candidates(&["/a", "/b", "/c"]))
            .unwrap_err();
        assert_eq!(*loader.opened.borrow(), ["/a", "/b", "/c"]);
        match err {
            Error::LibraryNotFound { name, attempts } => {
                assert_eq!(name, "demo");
                let tried: Vec<_> = attempts
                    .iter()
                    .map(|a| a.candidate.target().to_string_lossy().into_owned())
                    .collect();
                assert_eq!(tried, ["/a", "/b", "/c"]);
                assert!(attempts.iter().all(|a| !a.reason.is_empty()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_candidates_never_reach_the_loader() {
        let loader = FakeLoader {
            loadable: vec!["/found"],
            ..Default::default()
        };
        let sequence = vec![
            Ok(None),
            Ok(Some(Candidate::new("/missing", CandidateSource::Bundled))),
            Ok(None),
            Ok(Some(Candidate::new("/found", CandidateSource::PathSearch))),
            Ok(None),
        ];
        let handle = Resolver::new(&loader).resolve("demo", sequence).unwrap();
        assert_eq!(handle, "/found");
        assert_eq!(*loader.opened.borrow(), ["/missing", "/found"]);
    }

    #[test]
    fn empty_sequence_is_not_found() {
        let loader = FakeLoader::default();
        let err = Resolver::new(&loader).resolve("demo", Vec::new()).unwrap_err();
        assert!(matches!(err, Error::LibraryNotFound { attempts, .. } if attempts.is_empty()));
    }

    #[test]
    fn probe_failures_propagate() {
        let loader = FakeLoader {
            loadable: vec!["/late"],
            ..Default::default()
        };
        let sequence = vec![
            Ok(Some(Candidate::new("/a", CandidateSource::Bundled))),
            Err(Error::Probe(ProbeError::Spawn {
                program: "ldconfig".into(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            })),
            Ok(Some(Candidate::new("/late", CandidateSource::SystemDefault))),
        ];
        let err = Resolver::new(&loader).resolve("demo", sequence).unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
        assert_eq!(*loader.opened.borrow(), ["/a"]);
    }

    #[test]
    fn native_loader_rejects_missing_file() {
        let candidate = Candidate::new(
            "/nonexistent/dlresolve-test/libnothing.so",
            CandidateSource::Bundled,
        );
        assert!(matches!(NativeLoader.open(&candidate), Err(Error::Open(_))));
    }
}
