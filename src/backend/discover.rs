//! Locate the external tools used by the Ghostscript backend.

use serde::Serialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(windows)]
const GS_NAMES: &[&str] = &["gswin64c.exe", "gswin32c.exe"];
#[cfg(not(windows))]
const GS_NAMES: &[&str] = &["gs"];

#[cfg(windows)]
const QPDF_NAMES: &[&str] = &["qpdf.exe"];
#[cfg(not(windows))]
const QPDF_NAMES: &[&str] = &["qpdf"];

/// Paths to the optional external tools. `None` means not installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolPaths {
    pub ghostscript: Option<PathBuf>,
    pub qpdf: Option<PathBuf>,
}

impl ToolPaths {
    /// Probe the environment for both tools
    pub fn discover() -> Self {
        Self {
            ghostscript: find_ghostscript(),
            qpdf: find_qpdf(),
        }
    }

    /// Keep explicitly configured paths, probe for the rest
    pub fn or_discover(self) -> Self {
        Self {
            ghostscript: self.ghostscript.or_else(find_ghostscript),
            qpdf: self.qpdf.or_else(find_qpdf),
        }
    }
}

/// Find a Ghostscript executable on PATH or in the usual install locations
pub fn find_ghostscript() -> Option<PathBuf> {
    find_on_path(GS_NAMES).or_else(|| {
        let roots = windows_install_roots();
        search_install_dirs(&roots, |name| name == "gs", "gswin64c.exe")
            .or_else(|| search_install_dirs(&roots, |name| name == "gs", "gswin32c.exe"))
    })
}

/// Find a qpdf executable on PATH or in the usual install locations
pub fn find_qpdf() -> Option<PathBuf> {
    find_on_path(QPDF_NAMES).or_else(|| {
        let roots = windows_install_roots();
        search_install_dirs(&roots, |name| name.starts_with("qpdf"), "qpdf.exe")
    })
}

fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    names.iter().find_map(|name| which::which(name).ok())
}

/// Program directories scanned when a tool is not on PATH (Windows only)
fn windows_install_roots() -> Vec<PathBuf> {
    if !cfg!(windows) {
        return Vec::new();
    }

    let mut roots = vec![
        PathBuf::from("C:/Program Files"),
        PathBuf::from("C:/Program Files (x86)"),
    ];
    if let Some(local) = env::var_os("LOCALAPPDATA") {
        roots.push(Path::new(&local).join("Programs"));
    }
    roots
}

/// Look for `<root>/<dir>/<version>/bin/<exe>` (Ghostscript layout) or
/// `<root>/<dir>/bin/<exe>` (qpdf layout) where `dir` matches `dir_matches`.
fn search_install_dirs(
    roots: &[PathBuf],
    dir_matches: impl Fn(&str) -> bool,
    exe: &str,
) -> Option<PathBuf> {
    for root in roots {
        let Ok(entries) = fs::read_dir(root) else {
            continue;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            if !dir_matches(&*name.to_string_lossy()) {
                continue;
            }

            let direct = entry.path().join("bin").join(exe);
            if direct.is_file() {
                return Some(direct);
            }

            let Ok(versions) = fs::read_dir(entry.path()) else {
                continue;
            };
            for version in versions.flatten() {
                let candidate = version.path().join("bin").join(exe);
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }
    None
}
