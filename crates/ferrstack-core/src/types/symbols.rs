//! Source location and lexical scope types.

use std::fmt;

use smallvec::SmallVec;

/// Source code location for a frame or a call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation
{
    /// Path as recorded in the debug information.
    pub file: String,
    /// Line number, if known.
    pub line: Option<u32>,
    /// Column number, if known.
    pub column: Option<u32>,
}

impl SourceLocation
{
    /// Helper to build a location when only a file is known.
    pub fn from_file(file: impl Into<String>) -> Self
    {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }

    /// Builder-style line setter; zero means unknown.
    #[must_use]
    pub fn with_line(mut self, line: u32) -> Self
    {
        self.line = (line > 0).then_some(line);
        self
    }

    /// Builder-style column setter; zero means unknown.
    #[must_use]
    pub fn with_column(mut self, column: u32) -> Self
    {
        self.column = (column > 0).then_some(column);
        self
    }
}

impl fmt::Display for SourceLocation
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
        }
        Ok(())
    }
}

/// Opaque handle of a compile unit inside one module's debug information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitHandle(pub usize);

/// Opaque handle of a debugging information entry inside its compile unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DieHandle(pub u64);

/// The kinds of lexical scope the resolver cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeTag
{
    /// An out-of-line function body
    Subprogram,
    /// A function body inlined into its caller
    InlinedSubroutine,
    /// An alternate entry point into a function
    EntryPoint,
    /// Any other range-bearing scope (lexical blocks and the like)
    Block,
}

impl ScopeTag
{
    /// Scopes that name a function and can be shown as a frame.
    #[must_use]
    pub const fn is_function_like(self) -> bool
    {
        matches!(self, ScopeTag::Subprogram | ScopeTag::InlinedSubroutine | ScopeTag::EntryPoint)
    }
}

/// One scope enclosing an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope
{
    /// Handle of the entry inside its unit
    pub die: DieHandle,
    /// What kind of scope this is
    pub tag: ScopeTag,
    /// Linkage name if present, else the plain name
    pub name: Option<String>,
    /// Where an inlined scope was called from
    pub call_site: Option<SourceLocation>,
}

/// All scopes enclosing an address, innermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeChain
{
    /// Compile unit containing the scopes
    pub unit: UnitHandle,
    /// Scopes, innermost first
    pub scopes: SmallVec<[Scope; 8]>,
}

impl ScopeChain
{
    /// Index of the innermost named function-like scope.
    #[must_use]
    pub fn innermost_function(&self) -> Option<usize>
    {
        self.scopes
            .iter()
            .position(|scope| scope.tag.is_function_like() && scope.name.is_some())
    }

    /// Index of the scope with the given handle.
    #[must_use]
    pub fn position_of(&self, die: DieHandle) -> Option<usize>
    {
        self.scopes.iter().position(|scope| scope.die == die)
    }
}
