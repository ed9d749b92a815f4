use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes one class of content record.
///
/// A collection content type stores many keyed records under
/// `data/{name}/{key}`; a one-off content type stores a single record at
/// `data/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentType {
    pub name: String,
    pub is_collection: bool,
    pub controls: Vec<Control>,
}

impl ContentType {
    /// Shorthand for a collection content type.
    pub fn collection(name: &str, controls: Vec<Control>) -> Self {
        Self {
            name: name.into(),
            is_collection: true,
            controls,
        }
    }

    /// Shorthand for a one-off content type.
    pub fn one_off(name: &str, controls: Vec<Control>) -> Self {
        Self {
            name: name.into(),
            is_collection: false,
            controls,
        }
    }

    /// Reads a content type from its schema node, where collection-ness is
    /// stored inverted as `oneOff`.
    pub fn from_value(name: &str, value: &Value) -> ModelResult<Self> {
        let stored: StoredContentType = serde_json::from_value(value.clone())
            .map_err(|e| ModelError::InvalidRecord(format!("content type {name}: {e}")))?;
        Ok(Self {
            name: name.into(),
            is_collection: !stored.one_off,
            controls: stored.controls,
        })
    }
}

#[derive(Deserialize)]
struct StoredContentType {
    #[serde(rename = "oneOff", default)]
    one_off: bool,
    #[serde(default)]
    controls: Vec<Control>,
}

/// Reads every content type out of the schema namespace node
/// (`{ name: { oneOff, controls } }`). A missing node yields no types.
pub fn content_types_from_value(value: Option<&Value>) -> ModelResult<Vec<ContentType>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(name, entry)| ContentType::from_value(name, entry))
            .collect(),
        Some(other) => Err(ModelError::InvalidRecord(format!(
            "content type namespace is not an object: {other}"
        ))),
    }
}

/// One field of a content type. Grid controls nest child controls and
/// store a list of rows, each row keyed by the child control names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    pub name: String,
    #[serde(default)]
    pub control_type: ControlType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ControlMeta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<Control>,
}

impl Control {
    /// Shorthand for a plain field control.
    pub fn field(name: &str) -> Self {
        Self {
            name: name.into(),
            control_type: ControlType::Field,
            meta: None,
            controls: Vec::new(),
        }
    }

    /// Shorthand for a relation control pointing at `content_type_id`.
    pub fn relation(name: &str, content_type_id: &str) -> Self {
        Self {
            name: name.into(),
            control_type: ControlType::Relation,
            meta: Some(ControlMeta {
                content_type_id: Some(content_type_id.into()),
            }),
            controls: Vec::new(),
        }
    }

    /// Shorthand for a grid control with nested child controls.
    pub fn grid(name: &str, controls: Vec<Control>) -> Self {
        Self {
            name: name.into(),
            control_type: ControlType::Grid,
            meta: None,
            controls,
        }
    }

    /// Returns true if this is a relation control targeting `content_type`.
    pub fn relates_to(&self, content_type: &str) -> bool {
        self.control_type == ControlType::Relation
            && self
                .meta
                .as_ref()
                .and_then(|m| m.content_type_id.as_deref())
                == Some(content_type)
    }
}

/// The kind of a control. Anything the engine does not treat specially is a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlType {
    Relation,
    Grid,
    #[default]
    #[serde(other)]
    Field,
}

/// Extra control configuration. Relation controls name their target here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlMeta {
    #[serde(rename = "contentTypeId", default, skip_serializing_if = "Option::is_none")]
    pub content_type_id: Option<String>,
}
