use serde_json::{Map, Value};
use tracing::warn;

use super::node::{FieldNode, FormTree};
use super::path::FieldPath;
use super::value::is_truthy;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ValuesOptions {
    /// Top-level field names whose plain values are left out of the output.
    /// Nested children are never filtered by this list.
    pub exclude: Vec<String>,
}

impl ValuesOptions {
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    fn excludes(&self, name: &str) -> bool {
        self.exclude.iter().any(|excluded| excluded == name)
    }
}

impl FormTree {
    /// Builds the output document mirroring the tree's shape.
    ///
    /// Per field: a `get` transform wins, then branches nest their children,
    /// then truthy plain values are copied. Anything else is omitted.
    pub fn values(&self, options: &ValuesOptions) -> Value {
        Value::Object(self.collect_values(&FieldPath::root(), Some(options)))
    }

    fn collect_values(
        &self,
        parent: &FieldPath,
        options: Option<&ValuesOptions>,
    ) -> Map<String, Value> {
        let mut data = Map::new();
        for (name, node) in &self.fields {
            let path = parent.join(name);
            let excluded = options.is_some_and(|options| options.excludes(name));
            match node {
                FieldNode::Leaf(leaf) => {
                    if let Some(get) = &leaf.get {
                        data.insert(name.clone(), get(&leaf.value));
                    } else if excluded {
                        continue;
                    } else if is_truthy(&leaf.value) {
                        data.insert(name.clone(), leaf.value.clone());
                    } else {
                        warn!(field = %path, "no child or value to extract");
                    }
                }
                FieldNode::Branch(branch) => {
                    let nested = branch.children.collect_values(&path, None);
                    if !nested.is_empty() {
                        data.insert(name.clone(), Value::Object(nested));
                    }
                }
                FieldNode::Unbound => {
                    if !excluded {
                        warn!(field = %path, "no child or value to extract");
                    }
                }
            }
        }
        data
    }

    /// Fills leaf values from `data`, returning the paths whose value changed.
    ///
    /// A `set` transform always runs, receiving the incoming value (or `null`)
    /// and the whole of `data`. Plain leaves only take truthy incoming values,
    /// so `0`, `""`, `false` and `null` never overwrite what is already there.
    pub fn apply_values(&mut self, data: &Value) -> Vec<FieldPath> {
        let mut changed = Vec::new();
        self.apply_values_at(&FieldPath::root(), data, &mut changed);
        changed
    }

    fn apply_values_at(&mut self, parent: &FieldPath, data: &Value, changed: &mut Vec<FieldPath>) {
        for (name, node) in self.fields.iter_mut() {
            let path = parent.join(name);
            match node {
                FieldNode::Leaf(leaf) => {
                    let incoming = path.lookup(data);
                    let next = match &leaf.set {
                        Some(set) => Some(set(incoming.unwrap_or(&Value::Null), data)),
                        None => incoming.filter(|value| is_truthy(value)).cloned(),
                    };
                    if next.is_some_and(|next| leaf.assign(next)) {
                        changed.push(path);
                    }
                }
                FieldNode::Branch(branch) => branch.children.apply_values_at(&path, data, changed),
                FieldNode::Unbound => {
                    warn!(field = %path, "has neither a value nor children; nothing to set")
                }
            }
        }
    }
}
