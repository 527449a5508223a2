//! Index to target-list mappings
//!
//! In the config file a mapping value may be a single string or a list of
//! strings; both load as a list.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

/// Ordered mapping from a control index to its configured names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping<K: Ord> {
    entries: BTreeMap<K, Vec<String>>,
}

impl<K: Ord> Mapping<K> {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Names configured for an index
    pub fn get(&self, key: &K) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Set the names for an index
    pub fn insert(&mut self, key: K, names: Vec<String>) {
        self.entries.insert(key, names);
    }

    /// Iterate entries in index order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &[String])> {
        self.entries.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Number of mapped indices
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is mapped
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Mapping<usize> {
    /// Number of controls the device is expected to report
    ///
    /// This is the highest mapped index plus one, so gaps still count.
    pub fn num_sliders(&self) -> usize {
        self.entries.keys().next_back().map_or(0, |max| max + 1)
    }
}

impl<K: Ord> Default for Mapping<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> FromIterator<(K, Vec<S>)> for Mapping<K>
where
    K: Ord,
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Vec<S>)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, names)| (k, names.into_iter().map(Into::into).collect()))
                .collect(),
        }
    }
}

impl<'de, K> Deserialize<'de> for Mapping<K>
where
    K: Deserialize<'de> + Ord,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<K, OneOrMany>::deserialize(deserializer)?;
        Ok(Self {
            entries: raw.into_iter().map(|(k, v)| (k, v.into_vec())).collect(),
        })
    }
}

impl<K> Serialize for Mapping<K>
where
    K: Serialize + Ord,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}
