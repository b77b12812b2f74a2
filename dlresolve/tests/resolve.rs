// SPDX-FileCopyrightText: 2025 2025 Contributors to the dlresolve project.
// SPDX-License-Identifier: Apache-2.0

use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use dlresolve::{
    Candidate, CandidateSource, Error, HostProbe, Loader, NativeLoader, Platform, ProbeError,
    SearchContext, SystemProbe, TargetLibrary, load_with,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dlresolve=debug")
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct CannedProbe {
    cache: HashMap<String, PathBuf>,
}

impl SystemProbe for CannedProbe {
    fn linker_cache(&self, file_name: &str) -> Result<Option<PathBuf>, ProbeError> {
        Ok(self.cache.get(file_name).cloned())
    }

    fn search_path(&self, _file_name: &str) -> Option<PathBuf> {
        None
    }

    fn list_dir(&self, _dir: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Accepts only the n-th candidate it is asked to open.
struct NthLoader {
    accept: usize,
    opened: RefCell<Vec<Candidate>>,
}

impl Loader for NthLoader {
    type Handle = Candidate;

    fn open(&self, candidate: &Candidate) -> dlresolve::Result<Candidate> {
        let mut opened = self.opened.borrow_mut();
        opened.push(candidate.clone());
        if opened.len() == self.accept {
            Ok(candidate.clone())
        } else {
            Err(Error::Open(not_found()))
        }
    }
}

fn not_found() -> dlopen2::Error {
    dlopen2::Error::OpeningLibraryError(std::io::Error::from(std::io::ErrorKind::NotFound))
}

fn linux_magic_probe() -> CannedProbe {
    CannedProbe {
        cache: HashMap::from([(
            "libmagic.so.1".to_owned(),
            PathBuf::from("/var/cache/libmagic.so.1"),
        )]),
    }
}

#[test]
fn third_candidate_wins_and_nothing_after_is_opened() {
    init_tracing();
    let loader = NthLoader {
        accept: 3,
        opened: RefCell::default(),
    };
    let context = SearchContext::new(Platform::Linux, "/app", "/work");

    let handle = load_with(&TargetLibrary::libmagic(), &context, &linux_magic_probe(), &loader)
        .unwrap();

    assert_eq!(handle.target(), Path::new("/work/libmagic.so.1"));
    assert_eq!(handle.source(), CandidateSource::WorkingDir);
    assert_eq!(loader.opened.borrow().len(), 3);
}

#[test]
fn linux_exhaustion_lists_full_search_order() {
    init_tracing();
    let loader = NthLoader {
        accept: usize::MAX,
        opened: RefCell::default(),
    };
    let context = SearchContext::new(Platform::Linux, "/app", "/work");

    let err = load_with(&TargetLibrary::libmagic(), &context, &linux_magic_probe(), &loader)
        .unwrap_err();

    let Error::LibraryNotFound { name, attempts } = err else {
        panic!("expected LibraryNotFound");
    };
    assert_eq!(name, "magic");
    let tried: Vec<_> = attempts
        .iter()
        .map(|a| (a.candidate.target().to_path_buf(), a.candidate.source()))
        .collect();
    let expected = [
        ("/app/libmagic.so.1", CandidateSource::Bundled),
        ("/app/libmagic.so", CandidateSource::Bundled),
        ("/work/libmagic.so.1", CandidateSource::WorkingDir),
        ("/work/libmagic.so", CandidateSource::WorkingDir),
        ("/usr/local/lib/libmagic.so.1", CandidateSource::WellKnownPrefix),
        ("/usr/local/lib/libmagic.so", CandidateSource::WellKnownPrefix),
        ("/var/cache/libmagic.so.1", CandidateSource::PackageCacheQuery),
        ("/usr/lib/libmagic.so", CandidateSource::WellKnownPrefix),
        ("libmagic.so.1", CandidateSource::SystemDefault),
    ]
    .map(|(path, source)| (PathBuf::from(path), source));
    assert_eq!(tried, expected);
    assert_eq!(loader.opened.borrow().len(), attempts.len());
}

#[test]
fn corrupt_bundled_library_is_skipped() {
    init_tracing();
    let base = tempfile::tempdir().unwrap();
    let cwd = tempfile::tempdir().unwrap();
    let bogus = base.path().join("libdlresolve-fixture.so");
    fs::write(&bogus, b"not an ELF file").unwrap();

    let target = TargetLibrary::new("dlresolve-fixture")
        .with_system_name("libdlresolve-fixture-missing.so");
    let context = SearchContext::new(Platform::Other, base.path(), cwd.path());

    let err = load_with(&target, &context, &HostProbe::new(), NativeLoader).unwrap_err();

    let Error::LibraryNotFound { attempts, .. } = err else {
        panic!("expected LibraryNotFound");
    };
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[0].candidate.target(), bogus);
    assert_eq!(attempts[0].candidate.source(), CandidateSource::Bundled);
    assert!(err_mentions_all(&attempts));
}

fn err_mentions_all(attempts: &[dlresolve::Attempt]) -> bool {
    let message = Error::LibraryNotFound {
        name: "dlresolve-fixture".into(),
        attempts: attempts.to_vec(),
    }
    .to_string();
    attempts
        .iter()
        .all(|a| message.contains(&a.candidate.target().display().to_string()))
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
#[test]
fn loads_libc_from_the_host() {
    init_tracing();
    let empty = tempfile::tempdir().unwrap();
    let target = TargetLibrary::new("c").with_linux_names(["libc.so.6"]);
    let context = SearchContext::new(Platform::Linux, empty.path(), empty.path());

    let handle = load_with(&target, &context, &HostProbe::new(), NativeLoader).unwrap();

    assert!(matches!(
        handle.source(),
        CandidateSource::PackageCacheQuery
            | CandidateSource::WellKnownPrefix
            | CandidateSource::SystemDefault
    ));
    let strlen: *const () = unsafe { handle.library().symbol("strlen") }.unwrap();
    assert!(!strlen.is_null());
    handle.close();
}
