//! Separate debug file lookup.
//!
//! Candidates, in order:
//!
//! 1. `DIR/.build-id/xx/yyyy….debug` for every absolute search path entry
//! 2. the `.gnu_debuglink` name next to the main file (empty entry)
//! 3. the debuglink name in a relative subdirectory of the main file's
//!    directory (relative entry, e.g. `.debug`)
//! 4. the debuglink name under an absolute entry, joined with the main file's
//!    directory (e.g. `/usr/lib/debug/usr/bin/app.debug`)
//!
//! A candidate carrying a different build-id than the main file is skipped.

use std::fs;
use std::path::{Path, PathBuf};

use object::Object;
use tracing::trace;

use crate::options::DebugInfoConfig;
use crate::types::BuildId;

/// Find the separate debug file of `main_file`, if any.
pub(crate) fn find_debug_file(
    main_file: &Path,
    build_id: Option<&BuildId>,
    debuglink: Option<&str>,
    config: &DebugInfoConfig,
) -> Option<PathBuf>
{
    candidates(main_file, build_id, debuglink, config)
        .into_iter()
        .find(|candidate| {
            trace!(candidate = %candidate.display(), "trying debug file");
            candidate.is_file() && build_id_matches(candidate, build_id)
        })
}

/// Every path worth trying, in search order.
pub(crate) fn candidates(
    main_file: &Path,
    build_id: Option<&BuildId>,
    debuglink: Option<&str>,
    config: &DebugInfoConfig,
) -> Vec<PathBuf>
{
    let mut paths = Vec::new();

    if let Some(build_id) = build_id.filter(|id| id.as_bytes().len() > 1) {
        let hex = build_id.to_string();
        let (head, tail) = hex.split_at(2);
        for entry in config.entries().filter(|entry| entry.starts_with('/')) {
            paths.push(Path::new(entry).join(".build-id").join(head).join(format!("{tail}.debug")));
        }
    }

    if let Some(link) = debuglink.filter(|link| !link.is_empty()) {
        let directory = main_file.parent().unwrap_or_else(|| Path::new("/"));
        for entry in config.entries() {
            let candidate = if entry.is_empty() {
                directory.join(link)
            } else if entry.starts_with('/') {
                let relative = directory.strip_prefix("/").unwrap_or(directory);
                Path::new(entry).join(relative).join(link)
            } else {
                directory.join(entry).join(link)
            };
            // The main file is never its own debug file.
            if candidate != main_file {
                paths.push(candidate);
            }
        }
    }

    paths
}

fn build_id_matches(candidate: &Path, expected: Option<&BuildId>) -> bool
{
    let Some(expected) = expected else {
        return true;
    };
    let Ok(bytes) = fs::read(candidate) else {
        return false;
    };
    let Ok(file) = object::File::parse(&*bytes) else {
        return false;
    };
    match file.build_id() {
        Ok(Some(found)) => found == expected.as_bytes(),
        _ => true,
    }
}
