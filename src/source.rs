//! Diagnostic source attribution
//!
//! Every recorded element and configuration error carries a [`Source`] so
//! that messages point at the caller's module code. The typed binder API
//! captures the caller's [`CallSite`] with `#[track_caller]`; binders then
//! resolve the final source in this order:
//!
//! 1. an explicit source set with `with_source`
//! 2. the call site, unless its file is in the binder's [`SkipList`]
//! 3. the innermost module being installed
//! 4. [`Source::Unknown`]
//!
//! Decorators in this crate add their own files to the skip list, so a call
//! that originates inside library code falls back to the installing module.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Caller location captured by `#[track_caller]`
pub type CallSite = &'static Location<'static>;

// ============================================================================
// SOURCE
// ============================================================================

/// Where an element or error was declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// No attribution available
    Unknown,

    /// Free-form source set explicitly with `with_source`
    Declared(Arc<str>),

    /// A line of caller code
    Location {
        file: &'static str,
        line: u32,
        column: u32,
    },

    /// The module whose `configure` was running
    Module(&'static str),
}

impl Source {
    pub fn declared(text: impl Into<Arc<str>>) -> Self {
        Source::Declared(text.into())
    }

    pub fn at(site: CallSite) -> Self {
        Source::Location {
            file: site.file(),
            line: site.line(),
            column: site.column(),
        }
    }

    /// Source of the caller of the current (track_caller) function
    #[track_caller]
    pub fn caller() -> Self {
        Source::at(Location::caller())
    }

    /// Resolve the source of a new element
    pub fn attribute(
        explicit: Option<&Source>,
        site: CallSite,
        skipped: &SkipList,
        modules: &[&'static str],
    ) -> Source {
        if let Some(source) = explicit {
            return source.clone();
        }
        if !skipped.contains(site) {
            return Source::at(site);
        }
        match modules.last() {
            Some(module) => Source::Module(module),
            None => Source::Unknown,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Unknown => f.write_str("[unknown source]"),
            Source::Declared(text) => f.write_str(text),
            Source::Location { file, line, column } => write!(f, "{}:{}:{}", file, line, column),
            Source::Module(name) => write!(f, "{}.configure()", name),
        }
    }
}

// ============================================================================
// SKIPPED SOURCES
// ============================================================================

/// A source file whose call sites are never used for attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceTag(&'static str);

impl SourceTag {
    pub const fn file(path: &'static str) -> Self {
        SourceTag(path)
    }

    pub fn path(&self) -> &'static str {
        self.0
    }

    pub fn matches(&self, site: CallSite) -> bool {
        site.file() == self.0
    }
}

/// Tag for the file the macro is expanded in
#[macro_export]
macro_rules! source_tag {
    () => {
        $crate::source::SourceTag::file(file!())
    };
}

/// Ordered set of skipped sources, shared between binder copies
#[derive(Debug, Clone, Default)]
pub struct SkipList(Arc<Vec<SourceTag>>);

impl SkipList {
    pub fn new() -> Self {
        Self::default()
    }

    /// New list with `tags` appended (duplicates ignored)
    pub fn extended(&self, tags: &[SourceTag]) -> Self {
        let mut merged = self.0.as_ref().clone();
        for tag in tags {
            if !merged.contains(tag) {
                merged.push(*tag);
            }
        }
        SkipList(Arc::new(merged))
    }

    pub fn contains(&self, site: CallSite) -> bool {
        self.0.iter().any(|tag| tag.matches(site))
    }

    pub fn contains_tag(&self, tag: &SourceTag) -> bool {
        self.0.contains(tag)
    }

    pub fn tags(&self) -> &[SourceTag] {
        &self.0
    }
}
