use crate::error::{ModelError, ModelResult};
use crate::record::{is_truthy, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use websync_types::{validate_content_type, ReverseKey};

/// A relationship a record wants resolved.
///
/// `multiple = true` targets a collection: each entry of `items_to_relate`
/// carries a value that is compared against `target_match_field` on every
/// target item. `multiple = false` targets a one-off content type: any
/// truthy entry relates the record to it.
///
/// Each entry of `items_to_relate` is keyed by the target content type,
/// e.g. `{ "employees": "E1001" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDescriptor {
    pub multiple: bool,
    pub relationship_key: String,
    pub target_content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_match_field: Option<String>,
    #[serde(default)]
    pub items_to_relate: Vec<Record>,
}

impl RelationshipDescriptor {
    /// A relationship to items of a collection, matched on `match_field`.
    pub fn collection(relationship_key: &str, target_content_type: &str, match_field: &str) -> Self {
        Self {
            multiple: true,
            relationship_key: relationship_key.into(),
            target_content_type: target_content_type.into(),
            target_match_field: Some(match_field.into()),
            items_to_relate: Vec::new(),
        }
    }

    /// A relationship to a one-off content type.
    pub fn one_off(relationship_key: &str, target_content_type: &str) -> Self {
        Self {
            multiple: false,
            relationship_key: relationship_key.into(),
            target_content_type: target_content_type.into(),
            target_match_field: None,
            items_to_relate: Vec::new(),
        }
    }

    /// Adds an item to relate, keyed by the target content type.
    #[must_use]
    pub fn relate(mut self, value: impl Into<Value>) -> Self {
        let mut item = Record::new();
        item.insert(self.target_content_type.clone(), value.into());
        self.items_to_relate.push(item);
        self
    }

    /// The values to match, in `items_to_relate` order. Entries without a
    /// value for the target content type are skipped.
    pub fn match_values(&self) -> impl Iterator<Item = &Value> {
        self.items_to_relate
            .iter()
            .filter_map(|item| item.get(&self.target_content_type))
    }

    /// Whether resolving this descriptor needs the related data at all.
    pub fn has_work(&self) -> bool {
        if self.multiple {
            !self.items_to_relate.is_empty()
        } else {
            self.one_off_target_present()
        }
    }

    /// For one-off descriptors: whether any entry flags the target as present.
    pub fn one_off_target_present(&self) -> bool {
        self.match_values().any(is_truthy)
    }

    /// The back-reference field name on the target for `source_content_type`.
    pub fn reverse_key(&self, source_content_type: &str) -> websync_types::Result<ReverseKey> {
        ReverseKey::new(source_content_type, self.relationship_key.clone())
    }

    /// Checks that the descriptor can address the store: a usable
    /// relationship key, a valid target content type and, for collections,
    /// a match field.
    pub fn validate(&self) -> ModelResult<()> {
        if self.relationship_key.is_empty() || self.relationship_key.contains('/') {
            return Err(ModelError::InvalidRecord(format!(
                "relationship key must be a single path segment: {:?}",
                self.relationship_key
            )));
        }
        validate_content_type(&self.target_content_type)?;
        if self.multiple && self.target_match_field.as_deref().is_none_or(str::is_empty) {
            return Err(ModelError::MissingField(format!(
                "{}: target match field",
                self.relationship_key
            )));
        }
        Ok(())
    }
}
