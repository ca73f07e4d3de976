use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use super::path::FieldPath;
use super::validation::{FieldError, Validator};
use super::watch::Watcher;

pub type GetTransform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
/// Receives the incoming value and the whole input document.
pub type SetTransform = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// A field holding a value, with optional validator and transforms.
pub struct Leaf {
    pub(super) value: Value,
    pub(super) error: Option<FieldError>,
    pub(super) validate: Option<Validator>,
    pub(super) get: Option<GetTransform>,
    pub(super) set: Option<SetTransform>,
    pub(super) watchers: Vec<Watcher>,
}

impl Leaf {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn error(&self) -> Option<&FieldError> {
        self.error.as_ref()
    }

    pub fn has_validator(&self) -> bool {
        self.validate.is_some()
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    /// Runs the validator against the current value without storing the
    /// outcome. A leaf without a validator is always valid.
    pub fn check(&self) -> Result<(), FieldError> {
        match &self.validate {
            Some(validate) => validate(&self.value),
            None => Ok(()),
        }
    }

    /// Stores the validator outcome in the error slot. No-op without a validator.
    pub(super) fn revalidate(&mut self) -> bool {
        if self.validate.is_none() {
            return false;
        }
        self.error = self.check().err();
        true
    }

    /// Returns whether the stored value changed.
    pub(super) fn assign(&mut self, value: Value) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }
}

impl Debug for Leaf {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Leaf")
            .field("value", &self.value)
            .field("error", &self.error)
            .field("validate", &self.validate.is_some())
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .field("watchers", &self.watchers.len())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct Branch {
    pub(super) children: FormTree,
    /// Leaf attributes dropped when the declaration also had children.
    pub(super) discarded: Vec<&'static str>,
}

impl Branch {
    pub fn children(&self) -> &FormTree {
        &self.children
    }
}

#[derive(Debug)]
pub enum FieldNode {
    Leaf(Leaf),
    Branch(Branch),
    /// Declared with nothing to hold or compute. Reported and skipped.
    Unbound,
}

impl FieldNode {
    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            FieldNode::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_leaf_mut(&mut self) -> Option<&mut Leaf> {
        match self {
            FieldNode::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    pub fn as_branch(&self) -> Option<&Branch> {
        match self {
            FieldNode::Branch(branch) => Some(branch),
            _ => None,
        }
    }
}

/// Declaration of a single field, resolved into a [`FieldNode`] by [`Field::build`].
#[derive(Default)]
pub struct Field {
    value: Option<Value>,
    validate: Option<Validator>,
    get: Option<GetTransform>,
    set: Option<SetTransform>,
    children: Option<FormTree>,
}

impl Field {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Runs while the controller holds its state lock, so it must not call
    /// back into the controller.
    pub fn validate(
        mut self,
        validate: impl Fn(&Value) -> Result<(), FieldError> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Output transform used by value extraction. Like `validate`, it runs
    /// under the controller's state lock and must not call back into it.
    pub fn get(mut self, get: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.get = Some(Arc::new(get));
        self
    }

    /// Input transform receiving the incoming value (`null` when absent) and
    /// the whole input document. It runs under the controller's state lock and
    /// must not call back into the controller.
    pub fn set(mut self, set: impl Fn(&Value, &Value) -> Value + Send + Sync + 'static) -> Self {
        self.set = Some(Arc::new(set));
        self
    }

    pub fn child(mut self, name: impl Into<String>, field: impl Into<FieldNode>) -> Self {
        self.children
            .get_or_insert_with(FormTree::new)
            .insert(name, field);
        self
    }

    pub fn children(mut self, children: FormTree) -> Self {
        self.children = Some(children);
        self
    }

    pub fn build(self) -> FieldNode {
        let mut declared = Vec::new();
        if self.value.is_some() {
            declared.push("value");
        }
        if self.validate.is_some() {
            declared.push("validate");
        }
        if self.get.is_some() {
            declared.push("get");
        }
        if self.set.is_some() {
            declared.push("set");
        }

        if let Some(children) = self.children {
            return FieldNode::Branch(Branch {
                children,
                discarded: declared,
            });
        }
        if declared.is_empty() {
            return FieldNode::Unbound;
        }

        FieldNode::Leaf(Leaf {
            value: self.value.unwrap_or(Value::Null),
            error: None,
            validate: self.validate,
            get: self.get,
            set: self.set,
            watchers: Vec::new(),
        })
    }
}

impl From<Field> for FieldNode {
    fn from(value: Field) -> Self {
        value.build()
    }
}

/// Insertion-ordered mapping from field name to [`FieldNode`].
#[derive(Debug, Default)]
pub struct FormTree {
    pub(super) fields: IndexMap<String, FieldNode>,
}

impl FormTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`FormTree::insert`].
    pub fn with(mut self, name: impl Into<String>, field: impl Into<FieldNode>) -> Self {
        self.insert(name, field);
        self
    }

    /// Replaces any field already declared under `name`, keeping its position.
    pub fn insert(&mut self, name: impl Into<String>, field: impl Into<FieldNode>) {
        self.fields.insert(name.into(), field.into());
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldNode)> {
        self.fields.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn node(&self, path: &FieldPath) -> Option<&FieldNode> {
        let mut segments = path.segments();
        let mut node = self.fields.get(segments.next()?)?;
        for segment in segments {
            let FieldNode::Branch(branch) = node else {
                return None;
            };
            node = branch.children.fields.get(segment)?;
        }
        Some(node)
    }

    pub fn node_mut(&mut self, path: &FieldPath) -> Option<&mut FieldNode> {
        let mut segments = path.segments();
        let mut node = self.fields.get_mut(segments.next()?)?;
        for segment in segments {
            let FieldNode::Branch(branch) = node else {
                return None;
            };
            node = branch.children.fields.get_mut(segment)?;
        }
        Some(node)
    }

    pub fn leaf(&self, path: &FieldPath) -> Option<&Leaf> {
        self.node(path).and_then(FieldNode::as_leaf)
    }

    pub fn leaf_mut(&mut self, path: &FieldPath) -> Option<&mut Leaf> {
        self.node_mut(path).and_then(FieldNode::as_leaf_mut)
    }

    /// Lists malformed declarations. Never fails; callers decide how loud to be.
    pub fn audit(&self) -> Vec<StructuralIssue> {
        let mut issues = Vec::new();
        self.audit_into(&FieldPath::root(), &mut issues);
        issues
    }

    fn audit_into(&self, parent: &FieldPath, issues: &mut Vec<StructuralIssue>) {
        for (name, node) in &self.fields {
            let path = parent.join(name);
            match node {
                FieldNode::Leaf(_) => {}
                FieldNode::Unbound => issues.push(StructuralIssue {
                    path,
                    kind: IssueKind::Unbound,
                }),
                FieldNode::Branch(branch) => {
                    if !branch.discarded.is_empty() {
                        issues.push(StructuralIssue {
                            path: path.clone(),
                            kind: IssueKind::MixedDeclaration {
                                discarded: branch.discarded.clone(),
                            },
                        });
                    }
                    if branch.children.is_empty() {
                        issues.push(StructuralIssue {
                            path: path.clone(),
                            kind: IssueKind::EmptyBranch,
                        });
                    }
                    branch.children.audit_into(&path, issues);
                }
            }
        }
    }
}

impl<K, N> FromIterator<(K, N)> for FormTree
where
    K: Into<String>,
    N: Into<FieldNode>,
{
    fn from_iter<I: IntoIterator<Item = (K, N)>>(iter: I) -> Self {
        let mut tree = FormTree::new();
        for (name, node) in iter {
            tree.insert(name, node);
        }
        tree
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IssueKind {
    /// None of value, validate, get, set or children.
    Unbound,
    /// Children together with leaf attributes; the attributes were dropped.
    MixedDeclaration { discarded: Vec<&'static str> },
    EmptyBranch,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StructuralIssue {
    pub path: FieldPath,
    pub kind: IssueKind,
}

impl Display for StructuralIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            IssueKind::Unbound => write!(f, "{} has neither a value nor children", self.path),
            IssueKind::MixedDeclaration { discarded } => {
                let discarded = discarded.join(", ");
                write!(
                    f,
                    "{} declares children alongside {discarded}; {discarded} ignored, children extracted instead",
                    self.path
                )
            }
            IssueKind::EmptyBranch => write!(f, "{} declares an empty set of children", self.path),
        }
    }
}
