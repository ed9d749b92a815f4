//! Relationship tokens and reverse-index keys.

use crate::{validate_content_type, Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Separator between the content type and key of a [`RelationToken`].
pub const TOKEN_SEPARATOR: char = ' ';

/// Identifies one related record: `"{content_type} {key}"`.
///
/// For a one-off content type the key is the content type name itself,
/// e.g. `"settings settings"`.
///
/// The content type never contains the separator, so parsing splits on the
/// first space and the key may contain spaces of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationToken {
    content_type: String,
    key: String,
}

impl RelationToken {
    /// Creates a token pointing at `key` within a collection content type.
    pub fn new(content_type: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        let content_type = content_type.into();
        let key = key.into();
        validate_content_type(&content_type)?;
        if key.is_empty() {
            return Err(Error::InvalidToken(format!("{content_type}{TOKEN_SEPARATOR}")));
        }
        Ok(Self { content_type, key })
    }

    /// Creates a token pointing at a one-off content type.
    pub fn one_off(content_type: impl Into<String>) -> Result<Self> {
        let content_type = content_type.into();
        Self::new(content_type.clone(), content_type)
    }

    /// Parses `"{content_type} {key}"`.
    pub fn parse(s: &str) -> Result<Self> {
        let (content_type, key) = s
            .split_once(TOKEN_SEPARATOR)
            .ok_or_else(|| Error::InvalidToken(s.to_string()))?;
        Self::new(content_type, key).map_err(|_| Error::InvalidToken(s.to_string()))
    }

    /// Returns the content type of the related record.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Returns the store key of the related record.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns true if this token points at a one-off content type.
    pub fn is_one_off(&self) -> bool {
        self.content_type == self.key
    }
}

impl fmt::Display for RelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.content_type, TOKEN_SEPARATOR, self.key)
    }
}

impl FromStr for RelationToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for RelationToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RelationToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Name of the field on a related record that holds its back-references:
/// `"{source_content_type}_{relationship_key}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReverseKey {
    source_content_type: String,
    relationship_key: String,
}

impl ReverseKey {
    /// Creates the reverse key for `relationship_key` on records of `source_content_type`.
    pub fn new(
        source_content_type: impl Into<String>,
        relationship_key: impl Into<String>,
    ) -> Result<Self> {
        let source_content_type = source_content_type.into();
        validate_content_type(&source_content_type)?;
        Ok(Self {
            source_content_type,
            relationship_key: relationship_key.into(),
        })
    }

    /// Returns the content type whose records hold the forward relationship.
    pub fn source_content_type(&self) -> &str {
        &self.source_content_type
    }

    /// Returns the forward relationship field name.
    pub fn relationship_key(&self) -> &str {
        &self.relationship_key
    }
}

impl fmt::Display for ReverseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.source_content_type, self.relationship_key)
    }
}
