//! Ordered fallback resolution
//!
//! A [`Cascade`] tries named sources in order and stops at the first one
//! that yields a value. Sources are closures, so later sources (config file
//! reads, filesystem lookups) only run when every earlier source came up empty.
//! A source that fails aborts the whole cascade.

use crate::error::{ChainError, Result};

type Lookup<'a, T> = Box<dyn FnOnce() -> Result<Option<T>> + 'a>;

/// Value and the name of the source that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved<T> {
    /// Resolved value
    pub value: T,
    /// Winning source
    pub source: &'static str,
}

impl<T> Resolved<T> {
    /// Map the value, keeping the source
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Resolved<U> {
        Resolved {
            value: f(self.value),
            source: self.source,
        }
    }
}

/// Ordered list of sources for one setting
pub struct Cascade<'a, T> {
    field: &'static str,
    sources: Vec<(&'static str, Lookup<'a, T>)>,
}

impl<'a, T> Cascade<'a, T> {
    /// Empty cascade for `field`
    #[must_use]
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            sources: Vec::new(),
        }
    }

    /// Append a fallible source
    #[must_use]
    pub fn source(
        mut self,
        name: &'static str,
        lookup: impl FnOnce() -> Result<Option<T>> + 'a,
    ) -> Self {
        self.sources.push((name, Box::new(lookup)));
        self
    }

    /// Append a source that is already known
    #[must_use]
    pub fn value(self, name: &'static str, value: Option<T>) -> Self
    where
        T: 'a,
    {
        self.source(name, move || Ok(value))
    }

    /// Source names in evaluation order
    #[must_use]
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|(name, _)| *name).collect()
    }

    /// Evaluate sources in order
    ///
    /// # Errors
    /// - the first source error encountered
    /// - `ChainError::Unresolved` if every source is empty
    pub fn resolve(self) -> Result<Resolved<T>> {
        for (name, lookup) in self.sources {
            if let Some(value) = lookup()? {
                tracing::trace!(field = self.field, source = name, "resolved setting");
                return Ok(Resolved {
                    value,
                    source: name,
                });
            }
        }
        Err(ChainError::Unresolved { field: self.field })
    }
}

/// `Some` for non-empty strings
pub(crate) fn non_empty(s: String) -> Option<String> {
    Some(s).filter(|s| !s.is_empty())
}
