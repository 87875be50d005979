//! Ordered BSON document
//!
//! Field order is insertion order and is preserved through encode and
//! decode. Field names are unique within one document; lookups and
//! inserts are constant time so wide documents decode in linear time.

use indexmap::IndexMap;

use super::value::Bson;

/// An ordered map of uniquely named fields
#[derive(Debug, Clone, Default)]
pub struct Document {
    fields: IndexMap<String, Bson>,
}

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty document with room for `capacity` fields
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: IndexMap::with_capacity(capacity),
        }
    }

    /// Insert a field
    ///
    /// An existing field with the same name keeps its position and has its
    /// value replaced.
    ///
    /// # Returns
    /// * `Option<Bson>` - The previous value, if the field already existed
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Bson>) -> Option<Bson> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Bson> {
        self.fields.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Remove a field, preserving the order of the remaining ones
    pub fn remove(&mut self, key: &str) -> Option<Bson> {
        self.fields.shift_remove(key)
    }

    /// Remove a field in constant time; the last field takes its place
    pub(crate) fn take(&mut self, key: &str) -> Option<Bson> {
        self.fields.swap_remove(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Bson::as_str)
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(Bson::as_i32)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Bson::as_i64)
    }

    pub fn get_document(&self, key: &str) -> Option<&Document> {
        self.get(key).and_then(Bson::as_document)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bson)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field names in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Documents are equal when they hold the same fields in the same order
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl IntoIterator for Document {
    type Item = (String, Bson);
    type IntoIter = indexmap::map::IntoIter<String, Bson>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<K: Into<String>, V: Into<Bson>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (k, v) in iter {
            doc.insert(k, v);
        }
        doc
    }
}

/// Build a [`Document`] from `key => value` pairs in order.
///
/// ```
/// use mongowire::bson_doc;
///
/// let doc = bson_doc! { "Name" => "DBTest", "SizeOnDisk" => 42 };
/// assert_eq!(doc.keys().collect::<Vec<_>>(), ["Name", "SizeOnDisk"]);
/// ```
#[macro_export]
macro_rules! bson_doc {
    () => { $crate::bson::Document::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut doc = $crate::bson::Document::new();
        $( doc.insert($key, $crate::bson::Bson::from($value)); )+
        doc
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order_and_replaces_in_place() {
        let mut doc = Document::new();
        doc.insert("b", 1);
        doc.insert("a", 2);
        doc.insert("c", 3);
        let previous = doc.insert("a", 20);

        assert_eq!(previous, Some(Bson::Int32(2)));
        assert_eq!(doc.keys().collect::<Vec<_>>(), ["b", "a", "c"]);
        assert_eq!(doc.get_i32("a"), Some(20));
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let mut doc = crate::bson_doc! { "x" => 1, "y" => 2, "z" => 3 };
        assert_eq!(doc.remove("y"), Some(Bson::Int32(2)));
        assert_eq!(doc.remove("missing"), None);
        assert_eq!(doc.keys().collect::<Vec<_>>(), ["x", "z"]);
    }

    #[test]
    fn test_equality_is_order_sensitive() {
        let ab = crate::bson_doc! { "a" => 1, "b" => 2 };
        let ba = crate::bson_doc! { "b" => 2, "a" => 1 };
        assert_ne!(ab, ba);
        assert_eq!(ab, crate::bson_doc! { "a" => 1, "b" => 2 });
    }

    #[test]
    fn test_take_removes_field() {
        let mut doc = crate::bson_doc! { "x" => 1, "y" => 2, "z" => 3 };
        assert_eq!(doc.take("x"), Some(Bson::Int32(1)));
        assert_eq!(doc.take("x"), None);
        assert_eq!(doc.len(), 2);
        assert!(doc.contains_key("y") && doc.contains_key("z"));
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let doc = crate::bson_doc! { "Name" => "a" };
        assert!(doc.contains_key("Name"));
        assert!(!doc.contains_key("name"));
    }
}
