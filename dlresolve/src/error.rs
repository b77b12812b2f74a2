// SPDX-FileCopyrightText: 2025 2025 Contributors to the dlresolve project.
// SPDX-License-Identifier: Apache-2.0

use std::{fmt, io, path::PathBuf};

use crate::candidate::Candidate;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to find {name}. Check that it is installed{}", AttemptList(.attempts))]
    LibraryNotFound { name: String, attempts: Vec<Attempt> },

    #[error("system probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("dynamic loader error: {0}")]
    Open(#[from] dlopen2::Error),

    #[error("cannot determine the current working directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("cannot determine the executable's directory: {0}")]
    ExecutableDir(#[source] io::Error),
}

/// Failure of the external tool mechanism itself.
///
/// A tool that ran and found nothing is not an error; the probe reports it as
/// `Ok(None)`.
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("failed to run {}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("i/o error while talking to {}: {source}", .program.display())]
    Io {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A candidate the loader rejected, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub candidate: Candidate,
    pub reason: String,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.candidate, self.reason)
    }
}

struct AttemptList<'a>(&'a [Attempt]);

impl fmt::Display for AttemptList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, " (tried {} candidates)", self.0.len())?;
        for attempt in self.0 {
            write!(f, "\n  {attempt}")?;
        }
        Ok(())
    }
}
