//! `/proc/PID/maps` parsing.
//!
//! ```text
//! 55d0c9a00000-55d0c9a25000 r--p 00000000 08:01 1234       /usr/bin/app
//! 7ffd5c8e9000-7ffd5c90a000 rw-p 00000000 00:00 0          [stack]
//! ```
//!
//! Only file-backed mappings are kept: pseudo paths such as `[stack]` and
//! anonymous mappings have no module behind them.

use std::path::PathBuf;

use crate::symbols::Mapping;

const DELETED_SUFFIX: &str = " (deleted)";

/// Parse every line of a maps file, skipping ones that do not name a file.
pub(crate) fn parse_maps(text: &str) -> Vec<Mapping>
{
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<Mapping>
{
    let mut fields = line.splitn(6, ' ');
    let range = fields.next()?;
    let _perms = fields.next()?;
    let offset = fields.next()?;
    let _device = fields.next()?;
    let _inode = fields.next()?;
    let path = fields.next()?.trim_start();
    if !path.starts_with('/') {
        return None;
    }
    let path = path.strip_suffix(DELETED_SUFFIX).unwrap_or(path);

    let (start, end) = range.split_once('-')?;
    Some(Mapping {
        start: u64::from_str_radix(start, 16).ok()?,
        end: u64::from_str_radix(end, 16).ok()?,
        offset: u64::from_str_radix(offset, 16).ok()?,
        path: PathBuf::from(path),
    })
}
