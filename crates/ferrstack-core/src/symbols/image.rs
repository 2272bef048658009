//! Binary image parsing, symbol tables and DWARF section loading.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use addr2line::Context;
use gimli::{Dwarf, EndianArcSlice, RunTimeEndian, SectionId};
use object::{Object, ObjectSection, ObjectSegment, ObjectSymbol, SymbolKind};
use once_cell::unsync::OnceCell;
use tracing::debug;

use super::debuglink::find_debug_file;
use super::scopes::DwarfScopes;
use crate::error::{map_dwarf_error, Result, StackError};
use crate::options::DebugInfoConfig;
use crate::types::{AddressClass, BuildId, DebugFile, ScopeChain, SourceLocation};

/// Reader type used for all DWARF parsing.
pub(crate) type OwnedReader = EndianArcSlice<RunTimeEndian>;

/// A section's bytes together with its link-time address.
#[derive(Clone)]
pub(crate) struct SectionBlob
{
    pub(crate) data: Arc<[u8]>,
    pub(crate) address: u64,
}

fn section_bytes(section: &object::Section<'_, '_>) -> Result<Arc<[u8]>>
{
    let name = section.name().unwrap_or("<section>");
    let data = section
        .uncompressed_data()
        .map_err(|err| StackError::Dwarf(format!("failed to read {name}: {err}")))?;
    Ok(match data {
        Cow::Borrowed(bytes) => Arc::<[u8]>::from(bytes),
        Cow::Owned(vec) => vec.into(),
    })
}

fn load_section_blob(file: &object::File<'_>, name: &str) -> Result<Option<SectionBlob>>
{
    let Some(section) = file.section_by_name(name) else {
        return Ok(None);
    };
    let data = section_bytes(&section)?;
    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(SectionBlob {
        data,
        address: section.address(),
    }))
}

/// Sorted function symbols of one file.
#[derive(Debug, Default)]
pub(crate) struct SymbolTable
{
    entries: Vec<SymbolEntry>,
}

#[derive(Debug)]
struct SymbolEntry
{
    address: u64,
    size: u64,
    name: String,
}

impl SymbolTable
{
    fn from_symbols<'data, I, S>(symbols: I) -> Self
    where
        I: Iterator<Item = S>,
        S: ObjectSymbol<'data>,
    {
        let entries = symbols
            .filter(|symbol| symbol.kind() == SymbolKind::Text && symbol.is_definition() && symbol.address() != 0)
            .filter_map(|symbol| {
                let name = symbol.name().ok().filter(|name| !name.is_empty())?;
                Some(SymbolEntry {
                    address: symbol.address(),
                    size: symbol.size(),
                    name: name.to_string(),
                })
            })
            .collect();
        Self::from_entries(entries)
    }

    fn from_entries(mut entries: Vec<SymbolEntry>) -> Self
    {
        // Prefer sized entries when several symbols share an address.
        entries.sort_by(|a, b| a.address.cmp(&b.address).then(b.size.cmp(&a.size)));
        entries.dedup_by_key(|entry| entry.address);
        Self { entries }
    }

    /// Static `.symtab`, falling back to `.dynsym`.
    fn load(file: &object::File<'_>) -> (Self, bool)
    {
        let table = Self::from_symbols(file.symbols());
        if !table.is_empty() {
            return (table, true);
        }
        (Self::from_symbols(file.dynamic_symbols()), false)
    }

    pub(crate) fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }

    /// Name of the symbol covering a file address.
    pub(crate) fn lookup(&self, address: u64) -> Option<&str>
    {
        let index = self.entries.partition_point(|entry| entry.address <= address);
        let entry = self.entries.get(index.checked_sub(1)?)?;
        if entry.size == 0 || address < entry.address.saturating_add(entry.size) {
            Some(&entry.name)
        } else {
            None
        }
    }
}

/// DWARF of a module, from the main file or a separate debug file.
pub(crate) struct DebugData
{
    file: DebugFile,
    scopes: DwarfScopes,
    context: Context<OwnedReader>,
    symbols: SymbolTable,
}

impl DebugData
{
    /// Load DWARF from an already parsed object file.
    fn from_object(file: &object::File<'_>, origin: DebugFile) -> Result<Self>
    {
        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };

        let load = |id: SectionId| -> Result<OwnedReader> {
            let data = match file.section_by_name(id.name()) {
                Some(section) => section_bytes(&section)?,
                None => Arc::<[u8]>::from(Vec::new()),
            };
            Ok(EndianArcSlice::new(data, endian))
        };

        let context_dwarf = Dwarf::load(load)?;
        let scope_dwarf = Dwarf::load(load)?;
        let context = Context::from_dwarf(context_dwarf).map_err(|err| map_dwarf_error("indexing line tables", err))?;

        Ok(Self {
            file: origin,
            scopes: DwarfScopes::new(scope_dwarf)?,
            context,
            symbols: SymbolTable::load(file).0,
        })
    }

    fn from_path(path: &Path) -> Result<Self>
    {
        let bytes = read_regular_file(path)?;
        let file = object::File::parse(&*bytes).map_err(|err| StackError::Object {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        Self::from_object(&file, DebugFile::Separate(path.to_path_buf()))
    }

    pub(crate) fn file(&self) -> &DebugFile
    {
        &self.file
    }

    /// Line table lookup for a file address.
    pub(crate) fn source_line(&self, address: u64) -> Option<SourceLocation>
    {
        let location = self.context.find_location(address).ok()??;
        let file = location.file?;
        let mut source = SourceLocation::from_file(file);
        source.line = location.line.filter(|line| *line > 0);
        source.column = location.column.filter(|column| *column > 0);
        Some(source)
    }

    /// Scope chain for a file address.
    pub(crate) fn scopes(&self, address: u64) -> Option<ScopeChain>
    {
        match self.scopes.scopes_at(address) {
            Ok(chain) => chain,
            Err(err) => {
                debug!("scope lookup at 0x{address:x} failed: {err}");
                None
            }
        }
    }
}

/// Read a file, refusing devices, pipes and directories.
///
/// Character devices such as `/dev/zero` never reach end of file, and
/// render nodes block on read.
fn read_regular_file(path: &Path) -> Result<Vec<u8>>
{
    if !fs::metadata(path)?.is_file() {
        return Err(StackError::Object {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }
    Ok(fs::read(path)?)
}

/// Symbol table answering for an image.
///
/// The image's own `.symtab` wins; a stripped image uses the debug file's
/// table, then its own dynamic symbols.
fn symbol_source<'a, F>(own: &'a SymbolTable, static_symbols: bool, debug: F) -> &'a SymbolTable
where
    F: FnOnce() -> Option<&'a SymbolTable>,
{
    if static_symbols {
        return own;
    }
    debug().filter(|table| !table.is_empty()).unwrap_or(own)
}

/// First loadable segment, used to relate file addresses to mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LoadSegment
{
    pub(crate) address: u64,
    pub(crate) file_offset: u64,
}

/// Parsed ELF file of one module.
pub struct BinaryImage
{
    path: PathBuf,
    class: AddressClass,
    endian: RunTimeEndian,
    build_id: Option<BuildId>,
    debuglink: Option<String>,
    first_load: Option<LoadSegment>,
    text_address: u64,
    got_address: Option<u64>,
    eh_frame: Option<SectionBlob>,
    eh_frame_hdr: Option<SectionBlob>,
    debug_frame: Option<SectionBlob>,
    symbols: SymbolTable,
    static_symbols: bool,
    has_dwarf: bool,
    debug: OnceCell<Option<DebugData>>,
}

impl BinaryImage
{
    /// Read and parse an ELF file.
    ///
    /// ## Errors
    ///
    /// Returns an error if the file cannot be read or is not an object file.
    pub fn parse(path: &Path) -> Result<Self>
    {
        let bytes = read_regular_file(path)?;
        let file = object::File::parse(&*bytes).map_err(|err| StackError::Object {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        let endian = if file.is_little_endian() {
            RunTimeEndian::Little
        } else {
            RunTimeEndian::Big
        };
        let class = if file.is_64() {
            AddressClass::Elf64
        } else {
            AddressClass::Elf32
        };

        let build_id = file.build_id().ok().flatten().map(|id| BuildId(id.to_vec()));
        let debuglink = file
            .gnu_debuglink()
            .ok()
            .flatten()
            .map(|(name, _crc)| String::from_utf8_lossy(name).into_owned());

        let first_load = file
            .segments()
            .map(|segment| LoadSegment {
                address: segment.address(),
                file_offset: segment.file_range().0,
            })
            .min_by_key(|segment| segment.address);

        let text_address = file.section_by_name(".text").map_or(0, |section| section.address());
        let got_address = file.section_by_name(".got").map(|section| section.address());
        let has_dwarf = file
            .section_by_name(".debug_info")
            .is_some_and(|section| section.uncompressed_data().is_ok_and(|data| !data.is_empty()));
        let (symbols, static_symbols) = SymbolTable::load(&file);

        let image = Self {
            path: path.to_path_buf(),
            class,
            endian,
            build_id,
            debuglink,
            first_load,
            text_address,
            got_address,
            eh_frame: load_section_blob(&file, ".eh_frame")?,
            eh_frame_hdr: load_section_blob(&file, ".eh_frame_hdr")?,
            debug_frame: load_section_blob(&file, ".debug_frame")?,
            symbols,
            static_symbols,
            has_dwarf,
            debug: OnceCell::new(),
        };

        // Embedded DWARF is loaded now, while the file is already parsed.
        if has_dwarf {
            let data = match DebugData::from_object(&file, DebugFile::Embedded) {
                Ok(data) => Some(data),
                Err(err) => {
                    debug!("{}: unusable debug information: {err}", path.display());
                    None
                }
            };
            let _ = image.debug.set(data);
        }

        debug!(
            path = %path.display(),
            build_id = ?image.build_id.as_ref().map(ToString::to_string),
            dwarf = has_dwarf,
            "loaded image"
        );
        Ok(image)
    }

    /// Path the image was read from.
    #[must_use]
    pub fn path(&self) -> &Path
    {
        &self.path
    }

    /// ELF class.
    #[must_use]
    pub fn class(&self) -> AddressClass
    {
        self.class
    }

    /// GNU build-id.
    #[must_use]
    pub fn build_id(&self) -> Option<&BuildId>
    {
        self.build_id.as_ref()
    }

    pub(crate) fn endian(&self) -> RunTimeEndian
    {
        self.endian
    }

    pub(crate) fn first_load(&self) -> Option<LoadSegment>
    {
        self.first_load
    }

    pub(crate) fn text_address(&self) -> u64
    {
        self.text_address
    }

    pub(crate) fn got_address(&self) -> Option<u64>
    {
        self.got_address
    }

    pub(crate) fn eh_frame(&self) -> Option<&SectionBlob>
    {
        self.eh_frame.as_ref()
    }

    pub(crate) fn eh_frame_hdr(&self) -> Option<&SectionBlob>
    {
        self.eh_frame_hdr.as_ref()
    }

    pub(crate) fn debug_frame(&self) -> Option<&SectionBlob>
    {
        self.debug_frame.as_ref()
    }

    /// DWARF for this image, loading a separate debug file on first use.
    pub(crate) fn debug_data(&self, config: &DebugInfoConfig) -> Option<&DebugData>
    {
        self.debug
            .get_or_init(|| {
                if self.has_dwarf {
                    return None;
                }
                let path = find_debug_file(&self.path, self.build_id.as_ref(), self.debuglink.as_deref(), config)?;
                match DebugData::from_path(&path) {
                    Ok(data) => {
                        debug!(image = %self.path.display(), debug = %path.display(), "loaded separate debug info");
                        Some(data)
                    }
                    Err(err) => {
                        debug!("{}: {err}", path.display());
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Symbol covering a file address.
    pub(crate) fn symbol_name(&self, address: u64, config: &DebugInfoConfig) -> Option<&str>
    {
        symbol_source(&self.symbols, self.static_symbols, || {
            self.debug_data(config).map(|debug| &debug.symbols)
        })
        .lookup(address)
    }
}

#[cfg(test)]
mod tests
{
    use std::cell::Cell;

    use super::*;

    fn table(symbols: &[(u64, u64, &str)]) -> SymbolTable
    {
        SymbolTable::from_entries(
            symbols
                .iter()
                .map(|&(address, size, name)| SymbolEntry {
                    address,
                    size,
                    name: name.to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_sized_symbol_preferred_at_same_address()
    {
        let symbols = table(&[(0x1000, 0, "alias"), (0x1000, 0x40, "real"), (0x2000, 0, "other")]);
        assert_eq!(symbols.lookup(0x1000), Some("real"));
        assert_eq!(symbols.lookup(0x103f), Some("real"));
    }

    #[test]
    fn test_unsized_symbol_covers_until_next()
    {
        let symbols = table(&[(0x2000, 0, "next"), (0x1000, 0, "start")]);
        assert_eq!(symbols.lookup(0x0fff), None);
        assert_eq!(symbols.lookup(0x1000), Some("start"));
        assert_eq!(symbols.lookup(0x1fff), Some("start"));
        assert_eq!(symbols.lookup(0x2000), Some("next"));
    }

    #[test]
    fn test_address_past_sized_symbol()
    {
        let symbols = table(&[(0x1000, 0x10, "short"), (0x2000, 0x10, "far")]);
        assert_eq!(symbols.lookup(0x100f), Some("short"));
        assert_eq!(symbols.lookup(0x1010), None);
        assert_eq!(symbols.lookup(0x2010), None);
    }

    #[test]
    fn test_static_symbols_win()
    {
        let own = table(&[(0x1000, 0x10, "static_fn")]);
        let debug = table(&[(0x1000, 0x10, "debug_fn")]);
        let loaded = Cell::new(false);

        let source = symbol_source(&own, true, || {
            loaded.set(true);
            Some(&debug)
        });
        assert_eq!(source.lookup(0x1000), Some("static_fn"));
        // No separate debug file is looked up.
        assert!(!loaded.get());
    }

    #[test]
    fn test_debug_file_symbols_before_dynamic()
    {
        let dynamic = table(&[(0x1000, 0x10, "exported")]);
        let debug = table(&[(0x1000, 0x10, "debug_fn")]);

        let source = symbol_source(&dynamic, false, || Some(&debug));
        assert_eq!(source.lookup(0x1000), Some("debug_fn"));
    }

    #[test]
    fn test_dynamic_symbols_last()
    {
        let dynamic = table(&[(0x1000, 0x10, "exported")]);
        let empty = SymbolTable::default();

        assert_eq!(symbol_source(&dynamic, false, || None).lookup(0x1000), Some("exported"));
        assert_eq!(symbol_source(&dynamic, false, || Some(&empty)).lookup(0x1000), Some("exported"));
    }

    #[test]
    fn test_device_file_refused()
    {
        let err = BinaryImage::parse(Path::new("/dev/zero")).err();
        assert!(matches!(err, Some(StackError::Object { .. })));
    }
}
