//! Name comparison options for name-based queries.
//!
//! The options are independent bit flags rather than an exclusive mode, so a
//! caller can ask for e.g. a case-insensitive wildcard match over file names
//! in one query.

use bitflags::bitflags;

bitflags! {
    /// How a query's name selector is compared against symbol or file names.
    ///
    /// With neither case flag set (or both set) comparison is case-sensitive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NameSearchOptions: u32 {
        /// Compare names case-sensitively.
        const CASE_SENSITIVE = 0x01;
        /// Compare names ignoring case.
        const CASE_INSENSITIVE = 0x02;
        /// Treat names as paths and compare the `file.ext` component,
        /// with `/` and `\` as interchangeable separators.
        const FILE_NAME_EXT = 0x04;
        /// Match with `*` and `?` wildcards.
        const REGULAR_EXPRESSION = 0x08;
        /// Compare against the undecorated form of the name.
        const UNDECORATED_NAME = 0x10;

        /// Case-sensitive wildcard match.
        const CASE_REGULAR_EXPRESSION = Self::CASE_SENSITIVE.bits() | Self::REGULAR_EXPRESSION.bits();
        /// Case-insensitive wildcard match.
        const CASE_INSENSITIVE_REGULAR_EXPRESSION = Self::CASE_INSENSITIVE.bits() | Self::REGULAR_EXPRESSION.bits();
    }
}

impl NameSearchOptions
{
    /// Whether comparisons fold case under these options.
    pub fn ignores_case(self) -> bool
    {
        self.contains(Self::CASE_INSENSITIVE) && !self.contains(Self::CASE_SENSITIVE)
    }
}

/// A compiled name selector.
///
/// A matcher built from `None` accepts every name, which is how queries treat
/// an absent name selector.
#[derive(Debug, Clone)]
pub struct NameMatcher
{
    pattern: Option<Vec<char>>,
    options: NameSearchOptions,
}

impl NameMatcher
{
    pub fn new(pattern: Option<&str>, options: NameSearchOptions) -> Self
    {
        let pattern = pattern.map(|raw| normalize(raw, options));
        Self { pattern, options }
    }

    /// Options this matcher was built with.
    pub fn options(&self) -> NameSearchOptions
    {
        self.options
    }

    /// Returns `true` when the matcher places no constraint on names.
    pub fn is_unconstrained(&self) -> bool
    {
        self.pattern.is_none()
    }

    /// Pick which of a symbol's names the options say to compare.
    pub fn select<'n>(&self, name: &'n str, undecorated: Option<&'n str>) -> &'n str
    {
        if self.options.contains(NameSearchOptions::UNDECORATED_NAME) {
            undecorated.unwrap_or(name)
        } else {
            name
        }
    }

    /// Test `candidate` against the selector.
    ///
    /// ```rust
    /// use diaport_core::types::{NameMatcher, NameSearchOptions};
    ///
    /// let matcher = NameMatcher::new(Some("Get*"), NameSearchOptions::CASE_INSENSITIVE_REGULAR_EXPRESSION);
    /// assert!(matcher.matches("getValue"));
    /// assert!(!matcher.matches("SetValue"));
    /// ```
    pub fn matches(&self, candidate: &str) -> bool
    {
        let Some(pattern) = &self.pattern else {
            return true;
        };

        let mut candidate = normalize(candidate, self.options);
        if self.options.contains(NameSearchOptions::FILE_NAME_EXT) && !pattern.contains(&'/') {
            candidate = file_component(&candidate).to_vec();
        }

        if self.options.contains(NameSearchOptions::REGULAR_EXPRESSION) {
            wildcard_match(pattern, &candidate)
        } else if self.options.contains(NameSearchOptions::FILE_NAME_EXT) {
            candidate == *pattern || ends_with_component(&candidate, pattern)
        } else {
            candidate == *pattern
        }
    }
}

fn normalize(raw: &str, options: NameSearchOptions) -> Vec<char>
{
    raw.chars()
        .map(|c| {
            let c = if options.contains(NameSearchOptions::FILE_NAME_EXT) && c == '\\' {
                '/'
            } else {
                c
            };
            if options.ignores_case() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

fn file_component(path: &[char]) -> &[char]
{
    match path.iter().rposition(|c| *c == '/') {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

fn ends_with_component(candidate: &[char], pattern: &[char]) -> bool
{
    candidate.len() > pattern.len()
        && candidate.ends_with(pattern)
        && candidate[candidate.len() - pattern.len() - 1] == '/'
}

/// `*` matches any run, `?` matches exactly one character.
fn wildcard_match(pattern: &[char], text: &[char]) -> bool
{
    let (mut p, mut t) = (0, 0);
    let mut star: Option<usize> = None;
    let mut resume = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            p += 1;
            resume = t;
        } else if let Some(star_at) = star {
            p = star_at + 1;
            resume += 1;
            t = resume;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_absent_pattern_matches_everything()
    {
        let matcher = NameMatcher::new(None, NameSearchOptions::empty());
        assert!(matcher.is_unconstrained());
        assert!(matcher.matches("anything"));
    }

    #[test]
    fn test_case_flags()
    {
        let exact = NameMatcher::new(Some("Main"), NameSearchOptions::CASE_SENSITIVE);
        assert!(exact.matches("Main"));
        assert!(!exact.matches("main"));

        let folded = NameMatcher::new(Some("Main"), NameSearchOptions::CASE_INSENSITIVE);
        assert!(folded.matches("MAIN"));

        // Both case flags set: sensitive wins.
        let both = NameMatcher::new(
            Some("Main"),
            NameSearchOptions::CASE_SENSITIVE | NameSearchOptions::CASE_INSENSITIVE,
        );
        assert!(!both.matches("main"));
    }

    #[test]
    fn test_wildcards()
    {
        let matcher = NameMatcher::new(Some("a?c*"), NameSearchOptions::REGULAR_EXPRESSION);
        assert!(matcher.matches("abc"));
        assert!(matcher.matches("axcdef"));
        assert!(!matcher.matches("ac"));
        assert!(!matcher.matches("Abc"));

        let inner = NameMatcher::new(Some("*::new"), NameSearchOptions::REGULAR_EXPRESSION);
        assert!(inner.matches("Vec::new"));
        assert!(!inner.matches("Vec::new_in"));
    }

    #[test]
    fn test_file_name_ext_compares_last_component()
    {
        let options = NameSearchOptions::FILE_NAME_EXT | NameSearchOptions::CASE_INSENSITIVE;
        let matcher = NameMatcher::new(Some("main.c"), options);
        assert!(matcher.matches("C:\\src\\app\\Main.c"));
        assert!(matcher.matches("/home/build/main.c"));
        assert!(!matcher.matches("C:\\src\\app\\domain.c"));

        let with_dir = NameMatcher::new(Some("app/main.c"), options);
        assert!(with_dir.matches("C:\\src\\app\\main.c"));
        assert!(!with_dir.matches("C:\\src\\lib\\main.c"));
    }

    #[test]
    fn test_select_undecorated()
    {
        let matcher = NameMatcher::new(Some("foo"), NameSearchOptions::UNDECORATED_NAME);
        assert_eq!(matcher.select("?foo@@YAXXZ", Some("foo")), "foo");
        assert_eq!(matcher.select("bar", None), "bar");
    }
}
