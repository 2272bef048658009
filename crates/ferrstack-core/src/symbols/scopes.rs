//! Lexical scope lookup over DWARF debugging information entries.
//!
//! For an address, the scope chain is every DIE whose ranges contain it,
//! from the compile unit down to the innermost lexical block. DIEs without
//! ranges of their own (namespaces, classes) are searched through but not
//! recorded. Names follow `DW_AT_abstract_origin` and `DW_AT_specification`
//! so inlined instances report the name of the function they came from.

use std::path::PathBuf;

use gimli::{
    constants, AttributeValue, DebugInfoOffset, DebuggingInformationEntry, Dwarf, DwTag, EntriesTreeNode, Range, Reader,
    Unit, UnitOffset,
};
use smallvec::SmallVec;
use tracing::debug;

use super::image::OwnedReader;
use crate::error::{map_dwarf_error, Result};
use crate::types::{DieHandle, Scope, ScopeChain, ScopeTag, SourceLocation, UnitHandle};

/// Hops followed through abstract-origin and specification links.
const MAX_ORIGIN_DEPTH: usize = 8;

type Entry<'abbrev, 'unit> = DebuggingInformationEntry<'abbrev, 'unit, OwnedReader>;

struct IndexedUnit
{
    unit: Unit<OwnedReader>,
    ranges: Vec<Range>,
}

impl IndexedUnit
{
    fn contains(&self, address: u64) -> bool
    {
        self.ranges
            .iter()
            .any(|range| range.begin <= address && address < range.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Containment
{
    Inside,
    Outside,
    /// The entry has no address ranges
    Unbounded,
}

/// Compile units of one module, indexed by address range.
pub(crate) struct DwarfScopes
{
    dwarf: Dwarf<OwnedReader>,
    units: Vec<IndexedUnit>,
}

impl DwarfScopes
{
    /// Parse every unit header and its address ranges.
    pub(crate) fn new(dwarf: Dwarf<OwnedReader>) -> Result<Self>
    {
        let mut units = Vec::new();
        let mut headers = dwarf.units();
        while let Some(header) = headers
            .next()
            .map_err(|err| map_dwarf_error("reading unit headers", err))?
        {
            let unit = match dwarf.unit(header) {
                Ok(unit) => unit,
                Err(err) => {
                    debug!("skipping unreadable unit: {err}");
                    continue;
                }
            };
            let ranges = unit_ranges(&dwarf, &unit).unwrap_or_else(|err| {
                debug!("unit ranges unreadable: {err}");
                Vec::new()
            });
            units.push(IndexedUnit { unit, ranges });
        }
        Ok(Self { dwarf, units })
    }

    /// Scopes enclosing a file address, innermost first.
    pub(crate) fn scopes_at(&self, address: u64) -> Result<Option<ScopeChain>>
    {
        // Units that claim the address first; units without ranges are searched last.
        let claimed = self.units.iter().enumerate().filter(|(_, unit)| unit.contains(address));
        let unranged = self.units.iter().enumerate().filter(|(_, unit)| unit.ranges.is_empty());

        for (index, indexed) in claimed.chain(unranged) {
            let mut chain = Vec::new();
            self.scopes_in_unit(index, &indexed.unit, address, &mut chain)
                .map_err(|err| map_dwarf_error("walking scopes", err))?;
            if !chain.is_empty() {
                chain.reverse();
                return Ok(Some(ScopeChain {
                    unit: UnitHandle(index),
                    scopes: SmallVec::from_vec(chain),
                }));
            }
        }
        Ok(None)
    }

    fn scopes_in_unit(
        &self,
        unit_index: usize,
        unit: &Unit<OwnedReader>,
        address: u64,
        chain: &mut Vec<Scope>,
    ) -> gimli::Result<()>
    {
        let mut tree = unit.entries_tree(None)?;
        let root = tree.root()?;
        self.descend(unit_index, unit, root, address, chain)
    }

    fn descend(
        &self,
        unit_index: usize,
        unit: &Unit<OwnedReader>,
        node: EntriesTreeNode<'_, '_, '_, OwnedReader>,
        address: u64,
        chain: &mut Vec<Scope>,
    ) -> gimli::Result<()>
    {
        let mut children = node.children();
        while let Some(child) = children.next()? {
            let entry = child.entry();
            let tag = entry.tag();
            match self.containment(unit, entry, address)? {
                Containment::Outside => {}
                Containment::Inside => {
                    let scope = self.scope(unit_index, unit, entry)?;
                    chain.push(scope);
                    return self.descend(unit_index, unit, child, address, chain);
                }
                Containment::Unbounded if is_container(tag) => {
                    let before = chain.len();
                    self.descend(unit_index, unit, child, address, chain)?;
                    if chain.len() > before {
                        return Ok(());
                    }
                }
                Containment::Unbounded => {}
            }
        }
        Ok(())
    }

    fn containment(&self, unit: &Unit<OwnedReader>, entry: &Entry<'_, '_>, address: u64) -> gimli::Result<Containment>
    {
        let mut ranges = self.dwarf.die_ranges(unit, entry)?;
        let mut bounded = false;
        while let Some(range) = ranges.next()? {
            bounded = true;
            if range.begin <= address && address < range.end {
                return Ok(Containment::Inside);
            }
        }
        Ok(if bounded {
            Containment::Outside
        } else {
            Containment::Unbounded
        })
    }

    fn scope(&self, unit_index: usize, unit: &Unit<OwnedReader>, entry: &Entry<'_, '_>) -> gimli::Result<Scope>
    {
        let tag = scope_tag(entry.tag());
        let name = if tag.is_function_like() {
            self.die_name(unit_index, entry.offset())?
        } else {
            None
        };
        let call_site = if tag == ScopeTag::InlinedSubroutine {
            self.call_site(unit, entry)?
        } else {
            None
        };

        Ok(Scope {
            die: DieHandle(entry.offset().0 as u64),
            tag,
            name,
            call_site,
        })
    }

    /// Linkage name if any, else the plain name, following origin links.
    fn die_name(&self, unit_index: usize, offset: UnitOffset) -> gimli::Result<Option<String>>
    {
        for attribute in [
            constants::DW_AT_MIPS_linkage_name,
            constants::DW_AT_linkage_name,
            constants::DW_AT_name,
        ] {
            if let Some(name) = self.integrated_string(unit_index, offset, attribute)? {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }

    fn integrated_string(
        &self,
        mut unit_index: usize,
        mut offset: UnitOffset,
        attribute: constants::DwAt,
    ) -> gimli::Result<Option<String>>
    {
        for _ in 0..MAX_ORIGIN_DEPTH {
            let Some(indexed) = self.units.get(unit_index) else {
                return Ok(None);
            };
            let unit = &indexed.unit;
            let entry = unit.entry(offset)?;

            if let Some(value) = entry.attr_value(attribute)? {
                let string = self.dwarf.attr_string(unit, value)?;
                return Ok(Some(string.to_string_lossy()?.into_owned()));
            }

            let link = match entry.attr_value(constants::DW_AT_abstract_origin)? {
                Some(link) => Some(link),
                None => entry.attr_value(constants::DW_AT_specification)?,
            };
            match link {
                Some(AttributeValue::UnitRef(target)) => offset = target,
                Some(AttributeValue::DebugInfoRef(target)) => match self.locate(target) {
                    Some((index, target)) => {
                        unit_index = index;
                        offset = target;
                    }
                    None => return Ok(None),
                },
                _ => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Unit and unit-relative offset of a section offset.
    fn locate(&self, offset: DebugInfoOffset) -> Option<(usize, UnitOffset)>
    {
        self.units
            .iter()
            .enumerate()
            .find_map(|(index, indexed)| offset.to_unit_offset(&indexed.unit.header).map(|unit_offset| (index, unit_offset)))
    }

    fn call_site(&self, unit: &Unit<OwnedReader>, entry: &Entry<'_, '_>) -> gimli::Result<Option<SourceLocation>>
    {
        let index = match entry.attr_value(constants::DW_AT_call_file)? {
            Some(AttributeValue::FileIndex(index)) => index,
            Some(other) => match other.udata_value() {
                Some(index) => index,
                None => return Ok(None),
            },
            None => return Ok(None),
        };
        let Some(file) = self.file_path(unit, index)? else {
            return Ok(None);
        };

        let mut location = SourceLocation::from_file(file);
        if let Some(line) = entry.attr(constants::DW_AT_call_line)?.and_then(|attr| attr.udata_value()) {
            location = location.with_line(u32::try_from(line).unwrap_or(0));
            if let Some(column) = entry
                .attr(constants::DW_AT_call_column)?
                .and_then(|attr| attr.udata_value())
            {
                location = location.with_column(u32::try_from(column).unwrap_or(0));
            }
        }
        Ok(Some(location))
    }

    /// Full path of a line table file entry.
    fn file_path(&self, unit: &Unit<OwnedReader>, index: u64) -> gimli::Result<Option<String>>
    {
        let Some(program) = &unit.line_program else {
            return Ok(None);
        };
        let header = program.header();
        let Some(file) = header.file(index) else {
            return Ok(None);
        };

        let mut path = PathBuf::new();
        if let Some(comp_dir) = &unit.comp_dir {
            path.push(comp_dir.to_string_lossy()?.as_ref());
        }
        if let Some(directory) = file.directory(header) {
            let directory = self.dwarf.attr_string(unit, directory)?;
            path.push(directory.to_string_lossy()?.as_ref());
        }
        let name = self.dwarf.attr_string(unit, file.path_name())?;
        path.push(name.to_string_lossy()?.as_ref());
        Ok(Some(path.to_string_lossy().into_owned()))
    }
}

fn unit_ranges(dwarf: &Dwarf<OwnedReader>, unit: &Unit<OwnedReader>) -> gimli::Result<Vec<Range>>
{
    let mut ranges = Vec::new();
    let mut iter = dwarf.unit_ranges(unit)?;
    while let Some(range) = iter.next()? {
        if range.begin < range.end {
            ranges.push(range);
        }
    }
    Ok(ranges)
}

fn scope_tag(tag: DwTag) -> ScopeTag
{
    match tag {
        constants::DW_TAG_subprogram => ScopeTag::Subprogram,
        constants::DW_TAG_inlined_subroutine => ScopeTag::InlinedSubroutine,
        constants::DW_TAG_entry_point => ScopeTag::EntryPoint,
        _ => ScopeTag::Block,
    }
}

/// Range-less entries that may hold functions.
fn is_container(tag: DwTag) -> bool
{
    matches!(
        tag,
        constants::DW_TAG_namespace
            | constants::DW_TAG_module
            | constants::DW_TAG_class_type
            | constants::DW_TAG_structure_type
            | constants::DW_TAG_union_type
            | constants::DW_TAG_interface_type
    )
}
