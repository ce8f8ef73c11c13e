//! Symbol undecoration.
//!
//! Stores usually record a symbol's undecorated name next to the decorated
//! one. When they do not, Rust-mangled names (`_R...` v0 and legacy `_ZN...`)
//! can still be undecorated locally with `rustc_demangle`.

use rustc_demangle::try_demangle;

/// Undecorated form of `raw`, if it is a mangling scheme we understand.
///
/// The trailing hash of legacy Rust symbols is dropped.
///
/// ## Example
///
/// ```rust
/// use diaport_core::demangle::undecorate;
///
/// assert_eq!(undecorate("_ZN4core3ptr13drop_in_place17h0123456789abcdefE").as_deref(), Some("core::ptr::drop_in_place"));
/// assert_eq!(undecorate("main"), None);
/// ```
pub fn undecorate(raw: &str) -> Option<String>
{
    try_demangle(raw).ok().map(|demangled| format!("{demangled:#}"))
}

/// Heuristic check for a decorated name.
///
/// Covers Rust (`_R`, `_ZN`), Itanium C++ (`_Z`) and MSVC C++ (`?`).
pub fn is_decorated(raw: &str) -> bool
{
    raw.starts_with("_R") || raw.starts_with("_Z") || raw.starts_with('?')
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_msvc_names_are_decorated_but_not_undecorated_locally()
    {
        assert!(is_decorated("?foo@@YAXXZ"));
        assert_eq!(undecorate("?foo@@YAXXZ"), None);
        assert!(!is_decorated("foo"));
    }
}
