use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The smallest output produced so far in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub size: u64,
    pub step: &'static str,
}

/// Single-slot holder for the best candidate file of one run.
///
/// The slot owns at most one file inside the run's scratch directory. A new
/// candidate replaces the held one only if strictly smaller, and the previous
/// file is deleted before the slot is reassigned. Rejected candidates are
/// deleted immediately.
#[derive(Debug)]
pub struct CandidateSlot {
    baseline: u64,
    best: Option<Candidate>,
}

impl CandidateSlot {
    /// `baseline` is the size a candidate must beat (the original file size)
    pub fn new(baseline: u64) -> Self {
        Self {
            baseline,
            best: None,
        }
    }

    /// Size to beat: the held candidate's, or the baseline
    pub fn best_size(&self) -> u64 {
        self.best.as_ref().map_or(self.baseline, |c| c.size)
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    /// Offer a freshly produced file. Takes ownership of `path` either way:
    /// returns true if it became the best, otherwise the file is removed.
    /// A scratch file that cannot be removed is logged and left for the
    /// run's scratch directory cleanup.
    pub fn offer(&mut self, path: &Path, size: u64, step: &'static str) -> bool {
        if size >= self.best_size() {
            discard(path);
            return false;
        }

        if let Some(previous) = self.best.take() {
            discard(&previous.path);
        }
        self.best = Some(Candidate {
            path: path.to_path_buf(),
            size,
            step,
        });
        true
    }

    /// Copy the held candidate to `output`. Returns `None` if nothing was
    /// ever accepted.
    pub fn promote(self, output: &Path) -> io::Result<Option<Candidate>> {
        let Some(best) = self.best else {
            return Ok(None);
        };
        fs::copy(&best.path, output)?;
        discard(&best.path);
        Ok(Some(best))
    }
}

fn discard(path: &Path) {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            log::warn!("Could not remove {}: {}", path.display(), e);
        }
        _ => {}
    }
}
