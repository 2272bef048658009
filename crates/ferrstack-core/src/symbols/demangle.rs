//! Symbol demangling utilities.
//!
//! Compilers "mangle" symbol names to encode namespaces and types. The
//! demangler turns them back into readable names:
//!
//! - **Rust legacy**: `_ZN...17h<hash>E`, handled by `rustc-demangle`
//! - **Rust v0**: `_R...`, handled by `rustc-demangle`
//! - **C++**: Itanium ABI `_Z...`, handled by `cpp_demangle`
//!
//! Names without one of these prefixes are left alone, as are names that fail
//! to demangle.

use std::fmt::Write;

use cpp_demangle::Symbol;

/// Demangler that writes into one scratch buffer for the whole run.
#[derive(Debug, Default)]
pub struct Demangler
{
    scratch: String,
}

impl Demangler
{
    /// Create a demangler with an empty scratch buffer.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Whether `name` carries a mangling prefix we know how to decode.
    #[must_use]
    pub fn is_mangled(name: &str) -> bool
    {
        name.starts_with("_Z") || name.starts_with("_R")
    }

    /// Demangle `name`, returning the readable form.
    ///
    /// Returns `None` if `name` is not mangled or cannot be decoded. The
    /// returned string lives in the scratch buffer and is overwritten by the
    /// next call.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use ferrstack_core::symbols::Demangler;
    ///
    /// let mut demangler = Demangler::new();
    /// assert_eq!(demangler.demangle("_ZN3foo3barEv"), Some("foo::bar()"));
    /// assert_eq!(demangler.demangle("main"), None);
    /// ```
    pub fn demangle(&mut self, name: &str) -> Option<&str>
    {
        if !Self::is_mangled(name) {
            return None;
        }

        self.scratch.clear();
        if let Ok(rust) = rustc_demangle::try_demangle(name) {
            if write!(self.scratch, "{rust:#}").is_ok() {
                return Some(&self.scratch);
            }
            self.scratch.clear();
        }

        if !name.starts_with("_Z") {
            return None;
        }

        let symbol = Symbol::new(name).ok()?;
        if write!(self.scratch, "{symbol}").is_err() || self.scratch.is_empty() {
            self.scratch.clear();
            return None;
        }
        Some(&self.scratch)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_demangle_cpp()
    {
        let mut demangler = Demangler::new();
        assert_eq!(demangler.demangle("_ZN3foo3barEv"), Some("foo::bar()"));
    }

    #[test]
    fn test_demangle_rust_legacy_drops_hash()
    {
        let mut demangler = Demangler::new();
        assert_eq!(
            demangler.demangle("_ZN4core3fmt5write17h0123456789abcdefE"),
            Some("core::fmt::write")
        );
    }

    #[test]
    fn test_unmangled_names_are_ignored()
    {
        let mut demangler = Demangler::new();
        assert_eq!(demangler.demangle("main"), None);
        assert_eq!(demangler.demangle("__libc_start_main"), None);
    }

    #[test]
    fn test_garbage_after_prefix_fails_quietly()
    {
        let mut demangler = Demangler::new();
        assert_eq!(demangler.demangle("_Z"), None);
        assert_eq!(demangler.demangle("_Zqqq"), None);
    }

    #[test]
    fn test_scratch_is_reused_between_calls()
    {
        let mut demangler = Demangler::new();
        assert_eq!(demangler.demangle("_ZN3foo3barEv"), Some("foo::bar()"));
        assert_eq!(demangler.demangle("_ZN1a1bEv"), Some("a::b()"));
    }
}
