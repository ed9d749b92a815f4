//! Key-path algebra over content type schemas.
//!
//! A key path addresses one control's value inside the data namespace:
//!
//! ```text
//! [type, control]                        one-off
//! [type, {}, control]                    collection, any item
//! [type, {}, grid, [], child]            control inside a grid row
//! [type, item-key, control]              collection, resolved item
//! ```
//!
//! `{}` is [`KeyPathSegment::Item`], `[]` is [`KeyPathSegment::Grid`]. Paths
//! are produced for every control; callers filter for relation controls.

use crate::schema::{ContentType, Control, ControlType};
use std::fmt;

/// One segment of a [`ContentTypeKeyPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPathSegment {
    /// A literal key: the content type name or a control name.
    Key(String),
    /// Placeholder for "every item" of a collection content type.
    Item,
    /// A resolved collection item key.
    ItemKey(String),
    /// Placeholder for "every row" of a grid control.
    Grid,
}

/// The control name and, for grid children, the innermost child name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlKeys<'a> {
    pub control: &'a str,
    pub grid: Option<&'a str>,
}

impl ControlKeys<'_> {
    /// The key the control's value is stored under within its row or record.
    pub fn leaf(&self) -> &str {
        self.grid.unwrap_or(self.control)
    }

    /// Whether the control lives inside a grid row.
    pub fn in_grid(&self) -> bool {
        self.grid.is_some()
    }
}

/// A key path from the data root to a control value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentTypeKeyPath {
    segments: Vec<KeyPathSegment>,
}

impl ContentTypeKeyPath {
    /// Creates the root path of a content type (`[type]` or `[type, {}]`).
    pub fn for_content_type(content_type: &ContentType) -> Self {
        let mut segments = vec![KeyPathSegment::Key(content_type.name.clone())];
        if content_type.is_collection {
            segments.push(KeyPathSegment::Item);
        }
        Self { segments }
    }

    /// Returns the segments of the path.
    pub fn segments(&self) -> &[KeyPathSegment] {
        &self.segments
    }

    /// Returns the content type this path starts at.
    pub fn content_type(&self) -> &str {
        match self.segments.first() {
            Some(KeyPathSegment::Key(name)) => name,
            _ => "",
        }
    }

    /// Whether the path addresses items of a collection content type.
    pub fn is_collection(&self) -> bool {
        matches!(
            self.segments.get(1),
            Some(KeyPathSegment::Item | KeyPathSegment::ItemKey(_))
        )
    }

    /// Whether the path still holds an unresolved `{}` item placeholder.
    pub fn is_relative(&self) -> bool {
        self.segments.contains(&KeyPathSegment::Item)
    }

    /// Returns the item key if the path addresses a resolved collection item.
    pub fn item_key(&self) -> Option<&str> {
        match self.segments.get(1) {
            Some(KeyPathSegment::ItemKey(key)) => Some(key),
            _ => None,
        }
    }

    /// Splits out the top-level control name and the innermost grid child.
    pub fn control_keys(&self) -> Option<ControlKeys<'_>> {
        let start = if self.is_collection() { 2 } else { 1 };
        let control = match self.segments.get(start) {
            Some(KeyPathSegment::Key(name)) => name.as_str(),
            _ => return None,
        };
        let grid = if self.segments.contains(&KeyPathSegment::Grid) {
            match self.segments.last() {
                Some(KeyPathSegment::Key(name)) => Some(name.as_str()),
                _ => None,
            }
        } else {
            None
        };
        Some(ControlKeys { control, grid })
    }

    /// Replaces the `{}` placeholder with a concrete item key.
    #[must_use]
    pub fn with_item_key(&self, key: &str) -> Self {
        let segments = self
            .segments
            .iter()
            .map(|segment| match segment {
                KeyPathSegment::Item => KeyPathSegment::ItemKey(key.to_string()),
                other => other.clone(),
            })
            .collect();
        Self { segments }
    }

    /// Returns the store path a mapped control value is written back to:
    /// everything before the first grid segment. `None` while the path is
    /// still relative.
    pub fn save_path(&self) -> Option<Vec<String>> {
        let mut path = Vec::new();
        for segment in &self.segments {
            match segment {
                KeyPathSegment::Key(key) | KeyPathSegment::ItemKey(key) => path.push(key.clone()),
                KeyPathSegment::Grid => break,
                KeyPathSegment::Item => return None,
            }
        }
        Some(path)
    }

    fn child(&self, segments: impl IntoIterator<Item = KeyPathSegment>) -> Self {
        let mut next = self.clone();
        next.segments.extend(segments);
        next
    }
}

impl fmt::Display for ContentTypeKeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match segment {
                KeyPathSegment::Key(key) | KeyPathSegment::ItemKey(key) => f.write_str(key)?,
                KeyPathSegment::Item => f.write_str("{}")?,
                KeyPathSegment::Grid => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

/// A key path paired with the control it addresses.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPathControl {
    pub key_path: ContentTypeKeyPath,
    pub control: Control,
}

/// Expands every control of every content type into key paths.
///
/// Grid controls are not emitted themselves; their children are, recursively,
/// each under a `[grid, []]` prefix.
pub fn content_type_key_paths(content_types: &[ContentType]) -> Vec<KeyPathControl> {
    let mut pairs = Vec::new();
    for content_type in content_types {
        let root = ContentTypeKeyPath::for_content_type(content_type);
        for control in &content_type.controls {
            expand(&root, control, &mut pairs);
        }
    }
    pairs
}

fn expand(prefix: &ContentTypeKeyPath, control: &Control, pairs: &mut Vec<KeyPathControl>) {
    if control.control_type == ControlType::Grid {
        let grid_prefix = prefix.child([
            KeyPathSegment::Key(control.name.clone()),
            KeyPathSegment::Grid,
        ]);
        for child in &control.controls {
            expand(&grid_prefix, child, pairs);
        }
    } else {
        pairs.push(KeyPathControl {
            key_path: prefix.child([KeyPathSegment::Key(control.name.clone())]),
            control: control.clone(),
        });
    }
}

/// Key paths of every relation control, in any content type, that points
/// at `target_content_type`.
pub fn related_key_paths(
    content_types: &[ContentType],
    target_content_type: &str,
) -> Vec<KeyPathControl> {
    content_type_key_paths(content_types)
        .into_iter()
        .filter(|pair| pair.control.relates_to(target_content_type))
        .collect()
}
