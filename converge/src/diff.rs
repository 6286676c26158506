//! Field-level change sets between observed and desired state.
//!
//! Entries are appended in the declaration order of the resource's fields,
//! so the same pair of states always yields the same change set.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Placeholder rendered for a value that is absent on one side.
pub const ABSENT: &str = "<none>";

/// One differing field. `None` on a side means the field is absent there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub field: String,
    pub observed: Option<String>,
    pub desired: Option<String>,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.field,
            self.observed.as_deref().unwrap_or(ABSENT),
            self.desired.as_deref().unwrap_or(ABSENT)
        )
    }
}

/// Ordered list of changes. Empty means converged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    /// Whether any entry touches `field` or one of its sub-fields.
    pub fn touches(&self, field: &str) -> bool {
        self.changes.iter().any(|c| {
            c.field == field
                || c.field
                    .strip_prefix(field)
                    .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('['))
        })
    }

    /// Human-readable lines, one per change.
    pub fn lines(&self) -> Vec<String> {
        self.changes.iter().map(ToString::to_string).collect()
    }

    /// Callers compare typed values before pushing.
    fn push(&mut self, field: String, observed: Option<String>, desired: Option<String>) {
        self.changes.push(Change {
            field,
            observed,
            desired,
        });
    }

    /// Exact comparison of a scalar field.
    pub fn scalar<T>(&mut self, field: &str, observed: &T, desired: &T)
    where
        T: PartialEq + fmt::Display + ?Sized,
    {
        if observed != desired {
            self.push(
                field.to_string(),
                Some(observed.to_string()),
                Some(desired.to_string()),
            );
        }
    }

    /// A field present only in the desired state.
    pub fn added<T: fmt::Display + ?Sized>(&mut self, field: &str, desired: &T) {
        self.push(field.to_string(), None, Some(desired.to_string()));
    }

    /// A field present only on the live resource.
    pub fn removed<T: fmt::Display + ?Sized>(&mut self, field: &str, observed: &T) {
        self.push(field.to_string(), Some(observed.to_string()), None);
    }

    /// Comparison of an optional scalar. `None` renders as [`ABSENT`].
    pub fn optional<T>(&mut self, field: &str, observed: &Option<T>, desired: &Option<T>)
    where
        T: PartialEq + fmt::Display,
    {
        if observed != desired {
            self.push(
                field.to_string(),
                observed.as_ref().map(ToString::to_string),
                desired.as_ref().map(ToString::to_string),
            );
        }
    }

    /// Tag-map comparison. Reports each desired key whose live value differs.
    /// Keys present only on the live resource are left alone.
    pub fn tags(
        &mut self,
        field: &str,
        observed: &BTreeMap<String, String>,
        desired: &BTreeMap<String, String>,
    ) {
        for (key, value) in desired {
            match observed.get(key) {
                Some(live) if live == value => {}
                Some(live) => self.push(
                    format!("{field}.{key}"),
                    Some(live.clone()),
                    Some(value.clone()),
                ),
                None => self.push(format!("{field}.{key}"), None, Some(value.clone())),
            }
        }
    }

    /// Set comparison of an unordered member list. Members missing on the live
    /// resource are reported first (in desired order), then extra live members
    /// (in observed order).
    pub fn members(&mut self, field: &str, observed: &[String], desired: &[String]) {
        let live: HashSet<&str> = observed.iter().map(String::as_str).collect();
        let wanted: HashSet<&str> = desired.iter().map(String::as_str).collect();

        let mut seen = HashSet::new();
        for member in desired {
            if !live.contains(member.as_str()) && seen.insert(member.as_str()) {
                self.push(
                    format!("{field}[{member}]"),
                    Some("absent".to_string()),
                    Some("present".to_string()),
                );
            }
        }
        for member in observed {
            if !wanted.contains(member.as_str()) && seen.insert(member.as_str()) {
                self.push(
                    format!("{field}[{member}]"),
                    Some("present".to_string()),
                    Some("absent".to_string()),
                );
            }
        }
    }

    /// Comparison of an ordered list, position by position.
    pub fn sequence<T>(&mut self, field: &str, observed: &[T], desired: &[T])
    where
        T: PartialEq + fmt::Display,
    {
        let len = observed.len().max(desired.len());
        for idx in 0..len {
            let live = observed.get(idx);
            let want = desired.get(idx);
            if live != want {
                self.push(
                    format!("{field}[{idx}]"),
                    live.map(ToString::to_string),
                    want.map(ToString::to_string),
                );
            }
        }
    }

    /// Merge a nested change set, prefixing each field.
    pub fn nested(&mut self, prefix: &str, other: ChangeSet) {
        for change in other.changes {
            self.changes.push(Change {
                field: format!("{prefix}.{}", change.field),
                ..change
            });
        }
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, change) in self.changes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{change}")?;
        }
        Ok(())
    }
}
