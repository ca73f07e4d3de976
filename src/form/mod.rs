mod controller;
mod model;
mod node;
mod path;
mod payload;
mod validation;
mod value;
mod values;
mod watch;


pub use calmform_derive::FormModel;
pub use controller::{FormController, FormError, FormOptions, FormResult};
pub use model::FormModel;
pub use node::{
    Branch, Field, FieldNode, FormTree, GetTransform, IssueKind, Leaf, SetTransform,
    StructuralIssue,
};
pub use path::FieldPath;
pub use payload::{FormPart, FormPayload};
pub use validation::{FieldError, Validator};
pub use value::is_truthy;
pub use values::ValuesOptions;
pub use watch::{ChangeQueue, FlushMode, WatchCallback, WatchId, Watcher};
