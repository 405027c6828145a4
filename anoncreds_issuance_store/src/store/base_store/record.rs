use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use super::record_category::RecordCategory;
use crate::store::record_tags::RecordTags;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct Record {
    category: RecordCategory,
    name: String,
    value: String,
    #[builder(default)]
    tags: RecordTags,
}

impl Record {
    pub fn category(&self) -> RecordCategory {
        self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn tags(&self) -> &RecordTags {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut RecordTags {
        &mut self.tags
    }

    pub fn set_value(&mut self, value: String) {
        self.value = value;
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }
}
