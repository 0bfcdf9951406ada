use serde::ser::{Serialize, SerializeMap, Serializer};

/// Ordered string parameters of an endpoint.
///
/// Insertion order is kept for every encoding. Inserting an existing key
/// replaces its value without moving it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HttpParameters {
    pairs: Vec<(String, String)>,
}

impl HttpParameters {
    #[inline]
    pub fn new() -> Self {
        Self { pairs: Vec::new() }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.pairs.push((key, value)),
        }
    }

    #[inline]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(idx).1)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HttpParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut out = HttpParameters::new();
        for (k, v) in iter {
            out.insert(k, v);
        }
        out
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for HttpParameters {
    fn from(arr: [(K, V); N]) -> Self {
        arr.into_iter().collect()
    }
}

/// Serializes as a map, so JSON output is an object in insertion order.
impl Serialize for HttpParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (k, v) in &self.pairs {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut p = HttpParameters::from([("a", "1"), ("b", "2")]);
        p.insert("a", "3");
        let got: Vec<_> = p.iter().collect();
        assert_eq!(got, vec![("a", "3"), ("b", "2")]);
        assert_eq!(p.remove("a").as_deref(), Some("3"));
        assert_eq!(p.get("a"), None);
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn serializes_as_ordered_json_object() {
        let p = HttpParameters::new().with("z", "last").with("a", "first");
        assert_eq!(
            serde_json::to_string(&p).unwrap(),
            r#"{"z":"last","a":"first"}"#
        );
    }
}
