use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordTag {
    key: String,
    value: String,
}

impl RecordTag {
    pub fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordTags {
    inner: Vec<RecordTag>,
}

impl RecordTags {
    pub fn new(inner: Vec<RecordTag>) -> Self {
        let mut tags = Self { inner };
        tags.inner.sort();
        tags
    }

    pub fn add(&mut self, tag: RecordTag) {
        self.inner.retain(|existing| existing.key() != tag.key());
        self.inner.push(tag);
        self.inner.sort();
    }

    pub fn merge(&mut self, other: RecordTags) {
        for tag in other.inner {
            self.add(tag);
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.inner.retain(|tag| tag.key() != key);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|tag| tag.key() == key)
            .map(RecordTag::value)
    }

    /// Whether every tag in `filter` is present with an equal value.
    /// Tag filters are equality conjunctions, nothing richer.
    pub fn satisfies(&self, filter: &RecordTags) -> bool {
        filter.inner.iter().all(|tag| self.inner.contains(tag))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn into_inner(self) -> Vec<RecordTag> {
        self.inner
    }
}

impl IntoIterator for RecordTags {
    type Item = RecordTag;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl FromIterator<RecordTag> for RecordTags {
    fn from_iter<T: IntoIterator<Item = RecordTag>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
