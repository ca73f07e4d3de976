use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::node::{FieldNode, FormTree};
use super::path::FieldPath;
use super::value::coerce_to_text;

/// Outcome of a failed validation, stored in a leaf's error slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldError {
    Message(String),
    /// Invalid without a message to show.
    Invalid,
}

impl FieldError {
    pub fn message(&self) -> Option<&str> {
        match self {
            FieldError::Message(message) => Some(message),
            FieldError::Invalid => None,
        }
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldError::Message(message) => f.write_str(message),
            FieldError::Invalid => f.write_str("invalid"),
        }
    }
}

impl From<&str> for FieldError {
    fn from(value: &str) -> Self {
        FieldError::Message(value.to_string())
    }
}

impl From<String> for FieldError {
    fn from(value: String) -> Self {
        FieldError::Message(value)
    }
}

pub type Validator = Arc<dyn Fn(&Value) -> Result<(), FieldError> + Send + Sync>;

impl FormTree {
    /// Runs every validator against the current values, stopping at the first
    /// failure in declaration order. Stored errors are neither read nor written.
    pub fn is_valid(&self) -> bool {
        self.fields.values().all(|node| match node {
            FieldNode::Leaf(leaf) => leaf.check().is_ok(),
            FieldNode::Branch(branch) => branch.children.is_valid(),
            FieldNode::Unbound => true,
        })
    }

    /// Recomputes the stored error of every validated leaf, once.
    pub fn refresh_errors(&mut self) -> usize {
        self.fields
            .values_mut()
            .map(|node| match node {
                FieldNode::Leaf(leaf) => usize::from(leaf.revalidate()),
                FieldNode::Branch(branch) => branch.children.refresh_errors(),
                FieldNode::Unbound => 0,
            })
            .sum()
    }

    /// Overlays an external `{ field: [message, ...] }` map onto the stored
    /// errors. Keys may be dotted paths; the first message of each list wins.
    pub fn apply_errors(&mut self, errors: &Value) -> usize {
        let Some(entries) = errors.as_object() else {
            warn!(received = %errors, "error map is not an object; ignoring it");
            return 0;
        };

        let mut applied = 0;
        for (key, messages) in entries {
            let message = match messages {
                Value::Array(items) => items.first(),
                Value::Null => None,
                other => Some(other),
            };
            let Some(message) = message else {
                continue;
            };

            let path = FieldPath::parse(key);
            match self.leaf_mut(&path) {
                Some(leaf) => {
                    leaf.error = Some(FieldError::Message(coerce_to_text(message)));
                    applied += 1;
                }
                None => warn!(field = %path, "error map names a field without a value slot"),
            }
        }
        applied
    }

    /// Stored errors in declaration order.
    pub fn errors(&self) -> Vec<(FieldPath, FieldError)> {
        let mut errors = Vec::new();
        self.collect_errors(&FieldPath::root(), &mut errors);
        errors
    }

    fn collect_errors(&self, parent: &FieldPath, errors: &mut Vec<(FieldPath, FieldError)>) {
        for (name, node) in &self.fields {
            match node {
                FieldNode::Leaf(leaf) => {
                    if let Some(error) = &leaf.error {
                        errors.push((parent.join(name), error.clone()));
                    }
                }
                FieldNode::Branch(branch) => {
                    branch.children.collect_errors(&parent.join(name), errors)
                }
                FieldNode::Unbound => {}
            }
        }
    }

    pub fn clear_errors(&mut self) {
        for node in self.fields.values_mut() {
            match node {
                FieldNode::Leaf(leaf) => leaf.error = None,
                FieldNode::Branch(branch) => branch.children.clear_errors(),
                FieldNode::Unbound => {}
            }
        }
    }
}
