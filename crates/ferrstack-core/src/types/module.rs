//! Loaded module (executable or shared object) descriptions.

use std::fmt;
use std::path::PathBuf;

use super::Address;

/// Identity of a module inside one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub usize);

/// ELF class of a module, which fixes how wide its addresses are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass
{
    /// ELFCLASS32
    Elf32,
    /// ELFCLASS64
    Elf64,
}

impl AddressClass
{
    /// Number of hex digits used to print an address of this class.
    #[must_use]
    pub const fn hex_width(self) -> usize
    {
        match self {
            AddressClass::Elf32 => 8,
            AddressClass::Elf64 => 16,
        }
    }
}

/// GNU build-id note contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildId(pub Vec<u8>);

impl BuildId
{
    /// Raw bytes of the note descriptor.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8]
    {
        &self.0
    }
}

impl fmt::Display for BuildId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// What the printer needs to know about a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor
{
    /// Identity used for per-module caches
    pub id: ModuleId,
    /// Module name, normally the mapped file path
    pub name: String,
    /// Lowest mapped address
    pub start: Address,
    /// One past the highest mapped address
    pub end: Address,
    /// ELF class, when the file could be read
    pub class: Option<AddressClass>,
    /// Build-id, when the file carries one
    pub build_id: Option<BuildId>,
}

impl ModuleDescriptor
{
    /// Final path component of the module name.
    #[must_use]
    pub fn basename(&self) -> &str
    {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Where a module's DWARF came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebugFile
{
    /// The main file carries its own debug sections
    Embedded,
    /// A separate debug file was found
    Separate(PathBuf),
}

/// Files backing a module, resolved on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleFiles
{
    /// The ELF file, if it could be opened
    pub main_file: Option<PathBuf>,
    /// The debug information, if any was found
    pub debug_file: Option<DebugFile>,
}
