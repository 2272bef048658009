//! # Module Map
//!
//! File-backed mappings of a target grouped into modules. Every mapping of
//! one path becomes part of one module spanning its lowest start to its
//! highest end. Module files are parsed on first use, so a run that only
//! touches three libraries never opens the other forty.
//!
//! Addresses handed to [`DebugInfoSource`] are run-time addresses; the map
//! subtracts each module's load bias before asking the image.

use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;
use tracing::{debug, warn};

use super::image::BinaryImage;
use crate::error::Result;
use crate::options::DebugInfoConfig;
use crate::provider::DebugInfoSource;
use crate::types::{Address, ModuleDescriptor, ModuleFiles, ModuleId, ScopeChain, SourceLocation};

/// One file-backed mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping
{
    /// First mapped address
    pub start: u64,
    /// One past the last mapped address
    pub end: u64,
    /// File offset of `start`
    pub offset: u64,
    /// Mapped file
    pub path: PathBuf,
}

struct MappedModule
{
    name: String,
    path: PathBuf,
    start: u64,
    end: u64,
    base_offset: u64,
    image: OnceCell<Option<BinaryImage>>,
}

impl MappedModule
{
    fn image(&self) -> Option<&BinaryImage>
    {
        self.image
            .get_or_init(|| match BinaryImage::parse(&self.path) {
                Ok(image) => Some(image),
                Err(err) => {
                    debug!("{}: {err}", self.path.display());
                    None
                }
            })
            .as_ref()
    }

    /// Difference between run-time and link-time addresses.
    fn bias(&self) -> Option<u64>
    {
        let image = self.image()?;
        let Some(load) = image.first_load() else {
            return Some(0);
        };
        let linked = load
            .address
            .wrapping_add(self.base_offset)
            .wrapping_sub(load.file_offset);
        Some(self.start.wrapping_sub(linked))
    }

    fn contains(&self, address: u64) -> bool
    {
        self.start <= address && address < self.end
    }
}

/// Modules of one target, sorted by start address.
pub struct ModuleMap
{
    modules: Vec<MappedModule>,
    config: DebugInfoConfig,
}

impl ModuleMap
{
    /// Group mappings into modules.
    #[must_use]
    pub fn from_mappings<I>(mappings: I, config: DebugInfoConfig) -> Self
    where
        I: IntoIterator<Item = Mapping>,
    {
        let mut modules: Vec<MappedModule> = Vec::new();
        for mapping in mappings {
            if mapping.start >= mapping.end {
                continue;
            }
            match modules.iter_mut().find(|module| module.path == mapping.path) {
                Some(module) => {
                    if mapping.start < module.start {
                        module.start = mapping.start;
                        module.base_offset = mapping.offset;
                    }
                    module.end = module.end.max(mapping.end);
                }
                None => modules.push(MappedModule {
                    name: mapping.path.to_string_lossy().into_owned(),
                    path: mapping.path,
                    start: mapping.start,
                    end: mapping.end,
                    base_offset: mapping.offset,
                    image: OnceCell::new(),
                }),
            }
        }
        modules.sort_by_key(|module| module.start);
        debug!(count = modules.len(), "module map built");
        Self { modules, config }
    }

    /// Read the module whose file name matches `executable` from that path
    /// instead. Returns whether a module matched.
    pub fn override_path(&mut self, executable: &Path) -> bool
    {
        let Some(wanted) = executable.file_name() else {
            return false;
        };
        let Some(module) = self
            .modules
            .iter_mut()
            .find(|module| module.path.file_name() == Some(wanted))
        else {
            warn!("{}: no mapped module has this name", executable.display());
            return false;
        };
        module.path = executable.to_path_buf();
        module.image = OnceCell::new();
        true
    }

    /// Number of modules.
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.modules.len()
    }

    /// Whether no file-backed mapping was found.
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.modules.is_empty()
    }

    /// Parsed image and load bias of the module containing `address`.
    pub(crate) fn image_at(&self, address: u64) -> Option<(&BinaryImage, u64)>
    {
        let module = self.find(address)?;
        Some((module.image()?, module.bias()?))
    }

    fn find_index(&self, address: u64) -> Option<usize>
    {
        let index = self.modules.partition_point(|module| module.start <= address);
        let index = index.checked_sub(1)?;
        self.modules[index].contains(address).then_some(index)
    }

    fn find(&self, address: u64) -> Option<&MappedModule>
    {
        self.modules.get(self.find_index(address)?)
    }

    /// Image of a module and a run-time address rebased to a file address.
    fn file_address(&self, id: ModuleId, address: Address) -> Option<(&BinaryImage, u64)>
    {
        let module = self.modules.get(id.0)?;
        let image = module.image()?;
        Some((image, address.value().wrapping_sub(module.bias()?)))
    }
}

impl DebugInfoSource for ModuleMap
{
    fn modules(&self) -> Result<Vec<ModuleId>>
    {
        Ok((0..self.modules.len()).map(ModuleId).collect())
    }

    fn module_at(&self, address: Address) -> Option<ModuleId>
    {
        self.find_index(address.value()).map(ModuleId)
    }

    fn module(&self, id: ModuleId) -> Option<ModuleDescriptor>
    {
        let module = self.modules.get(id.0)?;
        let image = module.image();
        Some(ModuleDescriptor {
            id,
            name: module.name.clone(),
            start: Address::new(module.start),
            end: Address::new(module.end),
            class: image.map(BinaryImage::class),
            build_id: image.and_then(|image| image.build_id().cloned()),
        })
    }

    fn module_files(&self, id: ModuleId) -> ModuleFiles
    {
        let Some(image) = self.modules.get(id.0).and_then(MappedModule::image) else {
            return ModuleFiles::default();
        };
        ModuleFiles {
            main_file: Some(image.path().to_path_buf()),
            debug_file: image.debug_data(&self.config).map(|debug| debug.file().clone()),
        }
    }

    fn symbol_name(&self, id: ModuleId, address: Address) -> Option<String>
    {
        let (image, address) = self.file_address(id, address)?;
        image.symbol_name(address, &self.config).map(ToString::to_string)
    }

    fn scopes(&self, id: ModuleId, address: Address) -> Option<ScopeChain>
    {
        let (image, address) = self.file_address(id, address)?;
        image.debug_data(&self.config)?.scopes(address)
    }

    fn source_line(&self, id: ModuleId, address: Address) -> Option<SourceLocation>
    {
        let (image, address) = self.file_address(id, address)?;
        image.debug_data(&self.config)?.source_line(address)
    }
}
