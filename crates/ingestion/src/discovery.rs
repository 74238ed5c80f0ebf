//! Input file discovery.
//!
//! Scans a directory for target pixel files matching a wildcard pattern
//! and returns them in lexicographic file-name order, which for Kepler
//! and K2 archive names is also EPIC ID order.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, StitchError};

/// Lists files directly under `dir` whose names match `pattern`.
///
/// The pattern supports `*` (any run of characters) and `?` (exactly
/// one character). Subdirectories are not descended into. Returns
/// [`StitchError::NoInputFiles`] when nothing matches.
pub fn discover_inputs(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut matches = Vec::new();

    for entry in walkdir::WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| StitchError::FileRead(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if wildcard_match(pattern, &name) {
            matches.push(entry.path().to_path_buf());
        } else {
            debug!(file = %name, pattern = %pattern, "skipping non-matching file");
        }
    }

    if matches.is_empty() {
        return Err(StitchError::NoInputFiles {
            dir: dir.display().to_string(),
            pattern: pattern.to_string(),
        });
    }

    matches.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(matches)
}

/// Matches `name` against a glob-style pattern with `*` and `?`.
///
/// Uses the classic two-pointer scan with backtracking to the most
/// recent `*`, so patterns like `ktwo*-c16*.fits.gz` stay linear.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = name.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_txt = 0usize;

    while t < txt.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some(p);
            star_txt = t;
            p += 1;
        } else if let Some(sp) = star {
            // Retry the last '*' against one more character.
            p = sp + 1;
            star_txt += 1;
            t = star_txt;
        } else {
            return false;
        }
    }

    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}
