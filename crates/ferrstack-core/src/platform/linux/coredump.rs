//! # Core Files
//!
//! ELF core dumps written by the Linux kernel. A core carries:
//!
//! - one `NT_PRSTATUS` note per thread: thread id and general registers
//! - an `NT_PRPSINFO` note: the process id
//! - an `NT_FILE` note: which files were mapped where
//! - `PT_LOAD` segments: the dumped memory (only `p_filesz` bytes are present)
//!
//! Only 64-bit x86_64 and aarch64 cores are read.

use std::fs;
use std::path::{Path, PathBuf};

use object::elf::{FileHeader64, EM_AARCH64, EM_X86_64, ET_CORE, NT_PRPSINFO, NT_PRSTATUS, PT_LOAD, PT_NOTE};
use object::read::elf::{FileHeader, ProgramHeader};
use object::{Endian, Endianness};
use tracing::debug;

use super::regs::{aarch64_registers, user_regs_words, x86_64_registers};
use crate::error::{Result, StackError};
use crate::symbols::Mapping;
use crate::types::{Address, Architecture, ProcessId, Registers, ThreadId};
use crate::unwind::MemoryAccess;

/// `NT_FILE`, spelled "FILE" in ASCII.
const NT_FILE: u32 = 0x4649_4c45;

const CORE_NOTE_NAME: &[u8] = b"CORE";

/// `pr_pid` in `struct elf_prstatus`.
const PRSTATUS_PID_OFFSET: usize = 32;
/// `pr_reg` in `struct elf_prstatus`.
const PRSTATUS_REGS_OFFSET: usize = 112;
/// `pr_pid` in `struct elf_prpsinfo`.
const PRPSINFO_PID_OFFSET: usize = 24;

#[derive(Debug, Clone, Copy)]
struct CoreSegment
{
    address: u64,
    offset: u64,
    size: u64,
}

/// A parsed core file, memory included.
pub(crate) struct CoreFile
{
    data: Vec<u8>,
    little_endian: bool,
    architecture: Architecture,
    segments: Vec<CoreSegment>,
    threads: Vec<(ThreadId, Registers)>,
    pid: ProcessId,
    mappings: Vec<Mapping>,
}

struct NoteContents
{
    threads: Vec<(ThreadId, Registers)>,
    pid: Option<ProcessId>,
    mappings: Vec<Mapping>,
}

impl CoreFile
{
    /// Read and parse a core file.
    pub(crate) fn open(path: &Path) -> Result<Self>
    {
        let data = fs::read(path).map_err(|err| core_error(path, err))?;
        Self::parse(path, data)
    }

    /// Parse core file contents.
    pub(crate) fn parse(path: &Path, data: Vec<u8>) -> Result<Self>
    {
        let header = FileHeader64::<Endianness>::parse(&*data).map_err(|err| core_error(path, err))?;
        let endian = header.endian().map_err(|err| core_error(path, err))?;
        if header.e_type(endian) != ET_CORE {
            return Err(core_error(path, "not a core file"));
        }
        let architecture = match header.e_machine(endian) {
            EM_X86_64 => Architecture::X86_64,
            EM_AARCH64 => Architecture::Arm64,
            machine => return Err(core_error(path, format!("unsupported machine {machine}"))),
        };

        let mut segments = Vec::new();
        let mut notes = NoteContents {
            threads: Vec::new(),
            pid: None,
            mappings: Vec::new(),
        };
        let headers = header
            .program_headers(endian, &*data)
            .map_err(|err| core_error(path, err))?;
        for segment in headers {
            match segment.p_type(endian) {
                PT_LOAD => segments.push(CoreSegment {
                    address: segment.p_vaddr(endian),
                    offset: segment.p_offset(endian),
                    size: segment.p_filesz(endian),
                }),
                PT_NOTE => {
                    let Some(mut iter) = segment.notes(endian, &*data).map_err(|err| core_error(path, err))? else {
                        continue;
                    };
                    while let Some(note) = iter.next().map_err(|err| core_error(path, err))? {
                        if note.name() != CORE_NOTE_NAME {
                            continue;
                        }
                        read_note(&mut notes, note.n_type(endian), note.desc(), architecture, endian);
                    }
                }
                _ => {}
            }
        }

        let pid = notes
            .pid
            .or_else(|| notes.threads.first().map(|(tid, _)| ProcessId(u32::try_from(tid.raw()).unwrap_or(0))))
            .ok_or_else(|| core_error(path, "no process status notes"))?;

        debug!(
            core = %path.display(),
            pid = pid.0,
            threads = notes.threads.len(),
            mappings = notes.mappings.len(),
            "core file parsed"
        );

        Ok(Self {
            little_endian: endian.is_little_endian(),
            architecture,
            segments,
            threads: notes.threads,
            pid,
            mappings: notes.mappings,
            data,
        })
    }

    pub(crate) fn pid(&self) -> ProcessId
    {
        self.pid
    }

    pub(crate) fn architecture(&self) -> Architecture
    {
        self.architecture
    }

    /// Thread ids in note order.
    pub(crate) fn threads(&self) -> Vec<ThreadId>
    {
        self.threads.iter().map(|(tid, _)| *tid).collect()
    }

    pub(crate) fn registers(&self, thread: ThreadId) -> Option<&Registers>
    {
        self.threads
            .iter()
            .find(|(tid, _)| *tid == thread)
            .map(|(_, registers)| registers)
    }

    /// File-backed mappings from the `NT_FILE` note.
    pub(crate) fn mappings(&self) -> &[Mapping]
    {
        &self.mappings
    }
}

impl MemoryAccess for CoreFile
{
    fn read_u64(&self, address: Address) -> Result<u64>
    {
        let wanted = address.value();
        self.segments
            .iter()
            .find(|segment| {
                segment.address <= wanted
                    && wanted
                        .checked_add(8)
                        .is_some_and(|end| end <= segment.address.saturating_add(segment.size))
            })
            .and_then(|segment| {
                let offset = usize::try_from(segment.offset.checked_add(wanted - segment.address)?).ok()?;
                word(&self.data, offset, self.little_endian)
            })
            .ok_or(StackError::MemoryRead(wanted))
    }
}

fn read_note(notes: &mut NoteContents, kind: u32, desc: &[u8], architecture: Architecture, endian: Endianness)
{
    let little = endian.is_little_endian();
    match kind {
        NT_PRSTATUS => {
            let Some(tid) = word32(desc, PRSTATUS_PID_OFFSET, little) else {
                return;
            };
            let words: Vec<u64> = (0..user_regs_words(architecture))
                .map_while(|index| word(desc, PRSTATUS_REGS_OFFSET + index * 8, little))
                .collect();
            let registers = match architecture {
                Architecture::X86_64 => x86_64_registers(&words),
                Architecture::Arm64 => aarch64_registers(&words),
            };
            match registers {
                Some(registers) => notes.threads.push((ThreadId(u64::from(tid)), registers)),
                None => debug!(tid, "truncated prstatus note"),
            }
        }
        NT_PRPSINFO => {
            if let Some(pid) = word32(desc, PRPSINFO_PID_OFFSET, little) {
                notes.pid = Some(ProcessId(pid));
            }
        }
        NT_FILE => notes.mappings = parse_file_note(desc, little),
        _ => {}
    }
}

/// `count`, `page_size`, `count` triples of `(start, end, page offset)`,
/// then `count` NUL terminated names.
fn parse_file_note(desc: &[u8], little: bool) -> Vec<Mapping>
{
    let Some(count) = word(desc, 0, little).and_then(|count| usize::try_from(count).ok()) else {
        return Vec::new();
    };
    let Some(page_size) = word(desc, 8, little) else {
        return Vec::new();
    };
    let Some(names_offset) = count.checked_mul(24).and_then(|size| size.checked_add(16)) else {
        return Vec::new();
    };
    let Some(names) = desc.get(names_offset..) else {
        return Vec::new();
    };

    names
        .split(|byte| *byte == 0)
        .take(count)
        .enumerate()
        .filter_map(|(index, name)| {
            let base = 16 + index * 24;
            Some(Mapping {
                start: word(desc, base, little)?,
                end: word(desc, base + 8, little)?,
                offset: word(desc, base + 16, little)?.wrapping_mul(page_size),
                path: PathBuf::from(String::from_utf8_lossy(name).into_owned()),
            })
        })
        .collect()
}

fn word(bytes: &[u8], offset: usize, little: bool) -> Option<u64>
{
    let raw: [u8; 8] = bytes.get(offset..offset.checked_add(8)?)?.try_into().ok()?;
    Some(if little {
        u64::from_le_bytes(raw)
    } else {
        u64::from_be_bytes(raw)
    })
}

fn word32(bytes: &[u8], offset: usize, little: bool) -> Option<u32>
{
    let raw: [u8; 4] = bytes.get(offset..offset.checked_add(4)?)?.try_into().ok()?;
    Some(if little {
        u32::from_le_bytes(raw)
    } else {
        u32::from_be_bytes(raw)
    })
}

fn core_error(path: &Path, reason: impl ToString) -> StackError
{
    StackError::CoreFile {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
