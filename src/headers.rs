//! Header accumulation with per-field merge rules.
//!
//! Incoming header lines arrive one (name, value) pair at a time from the
//! parser. Repeated fields are not all equal: `set-cookie` legitimately
//! occurs many times, `content-length` must not, and most other fields are
//! defined to be equivalent to their comma-joined concatenation. The
//! [`HeaderSet`] applies the right rule per field while also keeping the
//! raw pairs in wire order.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// How repeated occurrences of a header field are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergePolicy {
    /// Every occurrence is kept as a separate value (set-cookie).
    Multi,
    /// Only the first occurrence counts, duplicates are silently dropped.
    FirstWins,
    /// Occurrences are joined with `", "` in arrival order.
    Join,
}

/// The merge policy is fixed per field name. This table is never mutated.
fn policy_for(lower_name: &str) -> MergePolicy {
    match lower_name {
        "set-cookie" => MergePolicy::Multi,

        "content-type" | "content-length" | "user-agent" | "referer" | "host"
        | "authorization" | "proxy-authorization" | "if-modified-since"
        | "if-unmodified-since" | "from" | "location" | "max-forwards" => MergePolicy::FirstWins,

        _ => MergePolicy::Join,
    }
}

/// A merged header value. Which variant a field ends up as follows from its
/// merge policy, so a given field name always produces the same variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergedValue {
    /// A single (possibly comma-joined) value.
    Single(String),
    /// One entry per occurrence, in arrival order.
    Multi(Vec<String>),
}

/// An ordered set of header lines plus a case-insensitive merged mapping.
///
/// The raw pairs keep their original casing and wire order. The merged
/// mapping is keyed by lowercased name and never contains duplicate keys.
#[derive(Debug, Clone, Default)]
pub struct HeaderSet {
    raw: Vec<(String, String)>,
    merged: HashMap<String, MergedValue>,
}

impl HeaderSet {
    /// Create an empty set.
    pub fn new() -> Self {
        HeaderSet::default()
    }

    /// Add one header line, applying the field's merge policy.
    pub fn add_header_line(&mut self, name: &str, value: &str) {
        self.raw.push((name.to_string(), value.to_string()));

        let key = name.to_ascii_lowercase();
        let policy = policy_for(&key);

        match self.merged.entry(key) {
            Entry::Vacant(e) => {
                let v = match policy {
                    MergePolicy::Multi => MergedValue::Multi(vec![value.to_string()]),
                    _ => MergedValue::Single(value.to_string()),
                };
                e.insert(v);
            }
            Entry::Occupied(mut e) => match (policy, e.get_mut()) {
                (MergePolicy::Multi, MergedValue::Multi(list)) => {
                    list.push(value.to_string());
                }
                (MergePolicy::FirstWins, _) => {
                    // first occurrence wins, drop this one
                }
                (MergePolicy::Join, MergedValue::Single(existing)) => {
                    existing.push_str(", ");
                    existing.push_str(value);
                }
                // A field name maps to exactly one policy, so the variant
                // can never disagree with it.
                _ => unreachable!("merge policy/variant mismatch"),
            },
        }
    }

    /// Add many header lines at once.
    pub fn add_header_lines<'a, I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in pairs {
            self.add_header_line(name, value);
        }
    }

    /// Get the merged value for a field, by case-insensitive name. For a
    /// multi-value field this is the first value seen.
    pub fn get(&self, name: &str) -> Option<&str> {
        match self.merged.get(&name.to_ascii_lowercase()) {
            Some(MergedValue::Single(v)) => Some(v.as_str()),
            Some(MergedValue::Multi(list)) => list.first().map(String::as_str),
            None => None,
        }
    }

    /// Get every value for a field, by case-insensitive name.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        match self.merged.get(&name.to_ascii_lowercase()) {
            Some(MergedValue::Single(v)) => vec![v.as_str()],
            Some(MergedValue::Multi(list)) => list.iter().map(String::as_str).collect(),
            None => vec![],
        }
    }

    /// Get the merged representation for a field.
    pub fn get_merged(&self, name: &str) -> Option<&MergedValue> {
        self.merged.get(&name.to_ascii_lowercase())
    }

    /// Tells if the field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.merged.contains_key(&name.to_ascii_lowercase())
    }

    /// The raw (name, value) pairs, original casing, wire order.
    pub fn raw(&self) -> &[(String, String)] {
        &self.raw
    }

    /// Number of raw header lines.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Tells if the set holds no header lines.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}
