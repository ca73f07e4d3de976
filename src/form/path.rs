use std::fmt::{Display, Formatter};

use serde_json::{Map, Value};

/// Dot-joined address of a field, e.g. `parent.child`.
///
/// The same path addresses a node in a [`FormTree`](super::FormTree) and a
/// nested entry in an input or output document.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Empty segments are dropped, so `"a..b"` and `"a.b"` are the same path.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn join(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Descends `document` one object key per segment.
    pub fn lookup<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(document, |current, segment| current.as_object()?.get(segment))
    }

    /// Writes `value` at this path, creating intermediate objects on the way.
    /// A non-object found on the way is replaced by an object.
    pub fn insert(&self, document: &mut Value, value: Value) {
        let Some((last, parents)) = self.0.split_last() else {
            *document = value;
            return;
        };

        let mut current = document;
        for segment in parents {
            current = ensure_object(current)
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        ensure_object(current).insert(last.clone(), value);
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was replaced by an object above"),
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for FieldPath {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<&FieldPath> for FieldPath {
    fn from(value: &FieldPath) -> Self {
        value.clone()
    }
}
