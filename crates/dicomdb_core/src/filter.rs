//! Attribute filter vocabulary.
//!
//! Record listings accept a restricted filter language with exactly
//! three predicate kinds: exact match, substring match, and set
//! membership. Predicates combine by conjunction, across and within
//! attributes. There is deliberately no richer query language.

use dicomdb_codec::{Tag, Value};

/// A conjunction of attribute predicates.
///
/// ```
/// use dicomdb_core::{Filter, Tag};
///
/// let filter = Filter::new()
///     .eq(Tag::StudyDescription, "MRI")
///     .contains(Tag::PatientName, "DOE");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone)]
enum Predicate {
    Equals { tag: Tag, value: Value },
    Contains { tag: Tag, needle: String },
    IsIn { tag: Tag, values: Vec<Value> },
}

impl Filter {
    /// Creates an empty filter that matches everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exact-match predicate.
    #[must_use]
    pub fn eq(mut self, tag: Tag, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Equals {
            tag,
            value: value.into(),
        });
        self
    }

    /// Adds a substring predicate. The attribute's text form must
    /// contain `needle`.
    #[must_use]
    pub fn contains(mut self, tag: Tag, needle: impl Into<String>) -> Self {
        self.predicates.push(Predicate::Contains {
            tag,
            needle: needle.into(),
        });
        self
    }

    /// Adds a set-membership predicate.
    #[must_use]
    pub fn is_in(mut self, tag: Tag, values: Vec<Value>) -> Self {
        self.predicates.push(Predicate::IsIn { tag, values });
        self
    }

    /// Whether this filter has no predicates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Evaluates the filter against an attribute lookup.
    ///
    /// A predicate on an absent attribute fails, so rows missing the
    /// attribute are excluded rather than matched by default.
    pub(crate) fn matches_with(&self, lookup: &mut dyn FnMut(Tag) -> Option<Value>) -> bool {
        self.predicates.iter().all(|predicate| match predicate {
            Predicate::Equals { tag, value } => lookup(*tag).is_some_and(|v| &v == value),
            Predicate::Contains { tag, needle } => lookup(*tag)
                .is_some_and(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string).contains(needle)),
            Predicate::IsIn { tag, values } => lookup(*tag).is_some_and(|v| values.contains(&v)),
        })
    }
}
