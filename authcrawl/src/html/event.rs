//! Tag events and per-tag attribute sets.

use std::fmt;

/// An ordered attribute set scoped to one tag instance.
///
/// Built once per tag event and never mutated afterwards, so handlers can
/// hold on to what they read without observing changes from later events.
/// Lookup is by lowercase attribute name; the first occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    entries: Vec<(String, String)>,
}

impl AttributeSet {
    /// Creates an empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an attribute set from (name, value) pairs, preserving order.
    ///
    /// Names are lowercased on the way in; duplicate names keep their first
    /// value on lookup but remain present for iteration.
    #[must_use]
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(n, v)| (n.into().to_ascii_lowercase(), v.into()))
            .collect();
        Self { entries }
    }

    /// Looks up an attribute value by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Looks up an attribute, returning `""` when absent.
    #[must_use]
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    /// Returns true if the attribute is present, regardless of its value.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates attributes in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no attributes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (n, v) in self.iter() {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{n}={v:?}")?;
            first = false;
        }
        Ok(())
    }
}

/// One event from the lower-layer tokenizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    /// An opening (or self-closing) tag with its attributes.
    Open {
        /// Tag name as produced by the tokenizer.
        name: String,
        /// The tag's attributes, decoded.
        attributes: AttributeSet,
    },
    /// A closing tag.
    Close {
        /// Tag name as produced by the tokenizer.
        name: String,
    },
    /// One character of document text outside of tags.
    Text(char),
    /// End of document. Always the last event of a stream.
    End,
}

impl TagEvent {
    /// Convenience constructor for an open tag.
    #[must_use]
    pub fn open<N, V>(name: &str, attributes: Vec<(N, V)>) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        Self::Open {
            name: name.to_string(),
            attributes: AttributeSet::from_pairs(attributes),
        }
    }

    /// Convenience constructor for a close tag.
    #[must_use]
    pub fn close(name: &str) -> Self {
        Self::Close {
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_lookup_is_case_insensitive() {
        let attrs = AttributeSet::from_pairs(vec![("HREF", "/a"), ("Name", "login")]);
        assert_eq!(attrs.get("href"), Some("/a"));
        assert_eq!(attrs.get("NAME"), Some("login"));
        assert_eq!(attrs.get("missing"), None);
        assert_eq!(attrs.get_or_empty("missing"), "");
    }

    #[test]
    fn test_first_duplicate_wins() {
        let attrs = AttributeSet::from_pairs(vec![("type", "text"), ("type", "hidden")]);
        assert_eq!(attrs.get("type"), Some("text"));
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn test_iteration_preserves_order() {
        let attrs = AttributeSet::from_pairs(vec![("a", "1"), ("b", "2"), ("c", "3")]);
        let names: Vec<&str> = attrs.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
