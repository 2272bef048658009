//! Address to name and source resolution for captured frames.
//!
//! The resolver decides what a frame is called and where it points in the
//! source, given a [`DebugInfoSource`]:
//!
//! 1. `quiet` suppresses names entirely.
//! 2. With debug names on, the innermost named function-like scope (subprogram,
//!    inlined subroutine or entry point) enclosing the address wins.
//! 3. Otherwise the symbol table covering the address is used.
//!
//! Mangled names are demangled unless `raw` is set. With inline expansion on,
//! one captured frame can turn into several printed frames, one per inlined
//! call plus the function that holds them.

use smallvec::SmallVec;

use super::demangle::Demangler;
use crate::options::StackOptions;
use crate::provider::DebugInfoSource;
use crate::types::{Address, DieHandle, Frame, ModuleDescriptor, ScopeChain, ScopeTag, SourceLocation, UnitHandle};

/// Reference to the scope a frame's name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeRef
{
    /// Compile unit of the scope
    pub unit: UnitHandle,
    /// The scope itself
    pub die: DieHandle,
}

/// A frame ready to be printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFrame
{
    /// The captured frame
    pub frame: Frame,
    /// Program counter used for lookups
    pub adjusted_pc: Address,
    /// Module owning `adjusted_pc`
    pub module: Option<ModuleDescriptor>,
    /// Name to print
    pub display_name: Option<String>,
    /// Scope the name came from, in debug-name mode
    pub scope: Option<ScopeRef>,
    /// Source location to print
    pub source: Option<SourceLocation>,
}

impl ResolvedFrame
{
    /// A frame with nothing resolved beyond its adjusted pc.
    #[must_use]
    pub fn unresolved(frame: Frame) -> Self
    {
        Self {
            frame,
            adjusted_pc: frame.lookup_pc(),
            module: None,
            display_name: None,
            scope: None,
            source: None,
        }
    }
}

/// Frames printed for one captured frame.
pub type Expansion = SmallVec<[ResolvedFrame; 4]>;

/// Resolves names and sources of captured frames.
#[derive(Debug)]
pub struct SymbolResolver
{
    options: StackOptions,
    demangler: Demangler,
}

impl SymbolResolver
{
    /// Create a resolver for the given output options.
    #[must_use]
    pub fn new(options: StackOptions) -> Self
    {
        Self {
            options,
            demangler: Demangler::new(),
        }
    }

    /// Resolve every printed frame for one captured frame.
    ///
    /// Returns a single frame unless inline expansion is on and the frame's
    /// name came from a scope.
    pub fn resolve<D>(&mut self, info: &D, frame: Frame) -> Expansion
    where
        D: DebugInfoSource + ?Sized,
    {
        let mut resolved = ResolvedFrame::unresolved(frame);
        let module_id = info.module_at(resolved.adjusted_pc);
        resolved.module = module_id.and_then(|id| info.module(id));

        let mut chain = None;
        if !self.options.quiet {
            if let Some(id) = module_id {
                if self.options.show_debugname {
                    chain = info.scopes(id, resolved.adjusted_pc);
                }
                let scoped = chain.as_ref().and_then(|chain| {
                    let index = chain.innermost_function()?;
                    Some((index, chain.scopes[index].name.clone()?))
                });

                match scoped {
                    Some((index, name)) => {
                        if let Some(chain) = &chain {
                            resolved.scope = Some(ScopeRef {
                                unit: chain.unit,
                                die: chain.scopes[index].die,
                            });
                        }
                        resolved.display_name = Some(name);
                    }
                    None => resolved.display_name = info.symbol_name(id, resolved.adjusted_pc),
                }
            }
            resolved.display_name = resolved.display_name.map(|name| self.present(name));
        }

        if self.options.show_source {
            resolved.source = module_id.and_then(|id| info.source_line(id, resolved.adjusted_pc));
        }

        let mut expansion = Expansion::new();
        match (self.options.show_inlines, resolved.scope, chain) {
            (true, Some(scope), Some(chain)) => {
                let outer = self.inline_callers(&resolved, scope, &chain);
                expansion.push(resolved);
                expansion.extend(outer);
            }
            _ => expansion.push(resolved),
        }
        expansion
    }

    /// Frames for the callers an inlined scope was expanded into.
    ///
    /// Walks outward from `scope`. Each function-like scope yields one frame
    /// whose source is the call site recorded on the scope emitted before it.
    /// The walk ends after the first out-of-line subprogram.
    fn inline_callers(&mut self, innermost: &ResolvedFrame, scope: ScopeRef, chain: &ScopeChain) -> Expansion
    {
        let mut frames = Expansion::new();
        let Some(start) = chain.position_of(scope.die) else {
            return frames;
        };
        if chain.scopes[start].tag == ScopeTag::Subprogram {
            return frames;
        }

        let mut last = start;
        for index in start + 1..chain.scopes.len() {
            let current = &chain.scopes[index];
            if !current.tag.is_function_like() {
                continue;
            }

            let mut frame = innermost.clone();
            frame.scope = Some(ScopeRef {
                unit: chain.unit,
                die: current.die,
            });
            frame.display_name = current.name.clone().map(|name| self.present(name));
            frame.source = if self.options.show_source {
                chain.scopes[last].call_site.clone()
            } else {
                None
            };
            frames.push(frame);

            if current.tag == ScopeTag::Subprogram {
                break;
            }
            last = index;
        }
        frames
    }

    /// Apply the raw/demangle policy to a name.
    fn present(&mut self, name: String) -> String
    {
        if self.options.raw {
            return name;
        }
        match self.demangler.demangle(&name) {
            Some(demangled) => demangled.to_string(),
            None => name,
        }
    }
}
