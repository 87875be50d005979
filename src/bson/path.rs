//! Field paths for error reporting
//!
//! Encoders, decoders and the mapping layer thread a borrowed path through
//! their recursion so that errors can name the offending field without
//! allocating on the happy path.

use std::fmt;

/// Location of a value inside a document tree.
#[derive(Debug, Clone, Copy)]
pub enum FieldPath<'a> {
    /// The top-level document.
    Root,

    /// A named field of the parent.
    Key(&'a FieldPath<'a>, &'a str),

    /// An array element of the parent.
    Index(&'a FieldPath<'a>, usize),
}

impl<'a> FieldPath<'a> {
    /// Path of a named child field.
    pub fn key(&'a self, name: &'a str) -> FieldPath<'a> {
        FieldPath::Key(self, name)
    }

    /// Path of an array element.
    pub fn index(&'a self, index: usize) -> FieldPath<'a> {
        FieldPath::Index(self, index)
    }

    /// Whether this is the document root.
    pub fn is_root(&self) -> bool {
        matches!(self, FieldPath::Root)
    }
}

impl fmt::Display for FieldPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Root => write!(f, "$"),
            FieldPath::Key(parent, name) if parent.is_root() => write!(f, "{name}"),
            FieldPath::Key(parent, name) => write!(f, "{parent}.{name}"),
            FieldPath::Index(parent, index) if parent.is_root() => write!(f, "[{index}]"),
            FieldPath::Index(parent, index) => write!(f, "{parent}[{index}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display() {
        let root = FieldPath::Root;
        assert_eq!(root.to_string(), "$");

        let tags = root.key("tags");
        let second = tags.index(1);
        let name = second.key("name");
        assert_eq!(tags.to_string(), "tags");
        assert_eq!(second.to_string(), "tags[1]");
        assert_eq!(name.to_string(), "tags[1].name");
    }
}
