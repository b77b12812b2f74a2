// SPDX-FileCopyrightText: 2025 2025 Contributors to the dlresolve project.
// SPDX-License-Identifier: Apache-2.0

//! Host lookups that candidate generation delegates to: the dynamic linker
//! cache, `PATH`, and directory listings.

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::error::ProbeError;

pub const DEFAULT_LDCONFIG_PROGRAMS: &[&str] = &["ldconfig", "/sbin/ldconfig", "/usr/sbin/ldconfig"];
pub const DEFAULT_LDCONFIG_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub trait SystemProbe: Send + Sync {
    /// Absolute path the dynamic linker cache holds for `file_name`.
    ///
    /// `Ok(None)` covers a missing tool as well as a cache without a match.
    fn linker_cache(&self, file_name: &str) -> Result<Option<PathBuf>, ProbeError>;

    /// First match for `file_name` on `PATH`.
    fn search_path(&self, file_name: &str) -> Option<PathBuf>;

    /// Subdirectories of `dir`, sorted. Empty when `dir` cannot be read.
    fn list_dir(&self, dir: &Path) -> Vec<PathBuf>;
}

/// [`SystemProbe`] backed by the real host.
#[derive(Debug, Clone)]
pub struct HostProbe {
    programs: Vec<PathBuf>,
    timeout: Duration,
}

impl Default for HostProbe {
    fn default() -> Self {
        Self {
            programs: DEFAULT_LDCONFIG_PROGRAMS.iter().map(PathBuf::from).collect(),
            timeout: DEFAULT_LDCONFIG_TIMEOUT,
        }
    }
}

impl HostProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// ldconfig executables to try, in order. The first one that can be
    /// spawned is used.
    pub fn with_programs<I, P>(mut self, programs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.programs = programs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Output of `ldconfig -p`, or `None` when no usable listing was produced.
    fn list_linker_cache(&self) -> Result<Option<String>, ProbeError> {
        for program in &self.programs {
            let spawned = Command::new(program)
                .arg("-p")
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn();
            match spawned {
                Ok(child) => return self.wait_for_listing(program, child),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(program = %program.display(), "ldconfig not found");
                }
                Err(source) => {
                    return Err(ProbeError::Spawn {
                        program: program.clone(),
                        source,
                    });
                }
            }
        }
        debug!("no ldconfig available, skipping linker cache");
        Ok(None)
    }

    fn wait_for_listing(&self, program: &Path, mut child: Child) -> Result<Option<String>, ProbeError> {
        let io_error = |source: io::Error| ProbeError::Io {
            program: program.to_path_buf(),
            source,
        };

        // Drain stdout concurrently so a full pipe cannot stall the child.
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| io_error(io::Error::other("stdout was not captured")))?;
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = tx.send(stdout.read_to_end(&mut buf).map(|_| buf));
        });

        // No deadline when the timeout does not fit in an `Instant`.
        let deadline = Instant::now().checked_add(self.timeout);
        let status = loop {
            match child.try_wait().map_err(io_error)? {
                Some(status) => break status,
                None if deadline.is_some_and(|d| Instant::now() >= d) => {
                    self.warn_timed_out(program);
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(None);
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        // A grandchild may still hold the pipe open after the tool exits.
        let received = match deadline {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        let output = match received {
            Ok(output) => output.map_err(io_error)?,
            Err(RecvTimeoutError::Timeout) => {
                self.warn_timed_out(program);
                return Ok(None);
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(io_error(io::Error::other("stdout reader panicked")));
            }
        };

        if !status.success() {
            debug!(program = %program.display(), %status, "ldconfig exited unsuccessfully");
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output).into_owned()))
    }

    fn warn_timed_out(&self, program: &Path) {
        warn!(
            program = %program.display(),
            timeout = ?self.timeout,
            "ldconfig timed out, ignoring linker cache"
        );
    }
}

impl SystemProbe for HostProbe {
    fn linker_cache(&self, file_name: &str) -> Result<Option<PathBuf>, ProbeError> {
        let Some(listing) = self.list_linker_cache()? else {
            return Ok(None);
        };
        let found = parse_ldconfig_output(&listing, file_name);
        debug!(file_name, found = ?found, "linker cache lookup");
        Ok(found)
    }

    fn search_path(&self, file_name: &str) -> Option<PathBuf> {
        which::which(file_name).ok()
    }

    fn list_dir(&self, dir: &Path) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        dirs.sort();
        dirs
    }
}

/// Finds `file_name` in `ldconfig -p` output.
///
/// Entries look like `\tlibz.so.1 (libc6,x86-64) => /lib/x86_64-linux-gnu/libz.so.1`.
/// The library name must match exactly and the path must be absolute.
pub fn parse_ldconfig_output(output: &str, file_name: &str) -> Option<PathBuf> {
    output.lines().find_map(|line| {
        let (entry, path) = line.split_once("=>")?;
        if entry.split_whitespace().next()? != file_name {
            return None;
        }
        let path = Path::new(path.trim());
        path.is_absolute().then(|| path.to_path_buf())
    })
}
