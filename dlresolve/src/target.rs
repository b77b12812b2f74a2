// SPDX-FileCopyrightText: 2025 2025 Contributors to the dlresolve project.
// SPDX-License-Identifier: Apache-2.0

use crate::platform::Platform;

/// Describes the shared library to look for and how it is named on each platform.
///
/// Name lists are ordered, most specific first. Windows names are base names;
/// the `.dll` extension is appended when candidates are generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLibrary {
    name: String,
    linux_names: Vec<String>,
    darwin_names: Vec<String>,
    windows_names: Vec<String>,
    other_names: Vec<String>,
    homebrew_formula: Option<String>,
    system_name: Option<String>,
}

impl TargetLibrary {
    /// Conventional names for a library with logical name `name`, e.g. `z` for zlib.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            linux_names: vec![format!("lib{name}.so")],
            darwin_names: vec![format!("lib{name}.dylib")],
            windows_names: vec![format!("lib{name}"), name.clone()],
            other_names: vec![format!("lib{name}.so")],
            homebrew_formula: None,
            system_name: None,
            name,
        }
    }

    /// libmagic, including the vendor and MSYS/Cygwin builds seen on Windows.
    pub fn libmagic() -> Self {
        Self::new("magic")
            .with_linux_names(["libmagic.so.1", "libmagic.so"])
            .with_windows_names([
                "libmagic",
                "magic1",
                "magic-1",
                "cygmagic-1",
                "libmagic-1",
                "msys-magic-1",
            ])
            .with_homebrew_formula("libmagic")
    }

    pub fn with_linux_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.linux_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_darwin_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.darwin_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Base names without the `.dll` extension.
    pub fn with_windows_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.windows_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_other_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.other_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Homebrew formula whose versioned Cellar directories are searched on macOS.
    pub fn with_homebrew_formula(mut self, formula: impl Into<String>) -> Self {
        self.homebrew_formula = Some(formula.into());
        self
    }

    /// Name handed to the OS loader as the last resort.
    pub fn with_system_name(mut self, name: impl Into<String>) -> Self {
        self.system_name = Some(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn homebrew_formula(&self) -> Option<&str> {
        self.homebrew_formula.as_deref()
    }

    pub fn windows_base_names(&self) -> &[String] {
        &self.windows_names
    }

    /// Concrete file names searched for on `platform`, in priority order.
    pub fn file_names(&self, platform: Platform) -> Vec<String> {
        match platform {
            Platform::Linux => self.linux_names.clone(),
            Platform::Darwin => self.darwin_names.clone(),
            Platform::Windows => self
                .windows_names
                .iter()
                .map(|base| windows_file_name(base))
                .collect(),
            Platform::Other => self.other_names.clone(),
        }
    }

    /// Logical name for the loader's own search path resolution.
    ///
    /// Defaults to the most specific file name for the platform, or
    /// `<name>.dll` on Windows.
    pub fn system_name(&self, platform: Platform) -> String {
        if let Some(name) = &self.system_name {
            return name.clone();
        }
        let first = match platform {
            Platform::Linux => self.linux_names.first(),
            Platform::Darwin => self.darwin_names.first(),
            Platform::Windows => return windows_file_name(&self.name),
            Platform::Other => self.other_names.first(),
        };
        first
            .cloned()
            .unwrap_or_else(|| format!("lib{}.{}", self.name, platform.library_extension()))
    }
}

fn windows_file_name(base: &str) -> String {
    format!("{base}.dll")
}
