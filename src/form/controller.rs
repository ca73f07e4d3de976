use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::node::{FieldNode, FormTree, Leaf, StructuralIssue};
use super::path::FieldPath;
use super::payload::FormPayload;
use super::validation::FieldError;
use super::values::ValuesOptions;
use super::watch::{ChangeQueue, FlushMode, PendingCallback, WatchCallback, WatchId};

/// Upper bound on flush rounds triggered by callbacks that keep assigning values.
const MAX_FLUSH_ROUNDS: usize = 100;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FormOptions {
    pub flush_mode: FlushMode,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FormError {
    StatePoisoned(&'static str),
    Unbound,
    UnknownField(FieldPath),
    NotALeaf(FieldPath),
    FlushLimitExceeded(usize),
    InvalidBoundary(String),
    Decode(String),
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::StatePoisoned(context) => {
                write!(f, "form state lock poisoned while {context}")
            }
            FormError::Unbound => f.write_str("no form tree is bound"),
            FormError::UnknownField(path) => write!(f, "form declares no field at {path}"),
            FormError::NotALeaf(path) => write!(f, "{path} does not hold a value"),
            FormError::FlushLimitExceeded(rounds) => {
                write!(f, "watchers kept changing values after {rounds} flush rounds")
            }
            FormError::InvalidBoundary(boundary) => {
                write!(f, "invalid multipart boundary: {boundary:?}")
            }
            FormError::Decode(error) => write!(f, "failed to decode form values: {error}"),
        }
    }
}

impl std::error::Error for FormError {}

pub type FormResult<T> = Result<T, FormError>;

#[derive(Default)]
pub(super) struct FormState {
    pub(super) tree: Option<FormTree>,
    pub(super) queue: ChangeQueue,
    flushing: bool,
}

impl FormState {
    fn tree(&self) -> FormResult<&FormTree> {
        self.tree.as_ref().ok_or(FormError::Unbound)
    }

    fn tree_mut(&mut self) -> FormResult<&mut FormTree> {
        self.tree.as_mut().ok_or(FormError::Unbound)
    }
}

/// Shared handle over a bound [`FormTree`]. Clones operate on the same tree.
#[derive(Clone, Default)]
pub struct FormController {
    pub(super) options: FormOptions,
    pub(super) state: Arc<RwLock<FormState>>,
}

impl FormController {
    pub fn new(options: FormOptions) -> Self {
        Self {
            options,
            state: Arc::new(RwLock::new(FormState::default())),
        }
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    /// Binds `tree`, replacing any previous one and dropping its pending changes.
    /// Malformed declarations are logged and returned; they never prevent binding.
    pub fn set_form(&self, tree: FormTree) -> FormResult<Vec<StructuralIssue>> {
        let issues = tree.audit();
        for issue in &issues {
            warn!(field = %issue.path, "{issue}");
        }

        let mut state = write_lock(&self.state, "binding form tree")?;
        debug!(fields = tree.len(), issues = issues.len(), "form tree bound");
        state.tree = Some(tree);
        state.queue.clear();
        Ok(issues)
    }

    pub fn is_bound(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking form binding")?.tree.is_some())
    }

    pub fn form_values(&self, options: &ValuesOptions) -> FormResult<Value> {
        let state = read_lock(&self.state, "extracting form values")?;
        Ok(state.tree()?.values(options))
    }

    pub fn set_form_values(&self, data: &Value) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "applying form values")?;
            let changed = state.tree_mut()?.apply_values(data);
            trace!(changed = changed.len(), "form values applied");
            for path in changed {
                state.queue.push(path);
            }
        }
        self.flush_if_immediate()
    }

    pub fn is_valid_form(&self) -> FormResult<bool> {
        let state = read_lock(&self.state, "validating form")?;
        Ok(state.tree()?.is_valid())
    }

    /// Revalidates every validated leaf whenever its value changes from now on.
    pub fn add_input_watchers(&self) -> FormResult<usize> {
        let mut state = write_lock(&self.state, "registering input watchers")?;
        let added = state.tree_mut()?.attach_revalidators();
        debug!(added, "input watchers registered");
        Ok(added)
    }

    pub fn watch(
        &self,
        path: impl Into<FieldPath>,
        callback: impl Fn(&FieldPath, &Value) + Send + Sync + 'static,
    ) -> FormResult<WatchId> {
        let path = path.into();
        let callback: WatchCallback = Arc::new(callback);
        let mut state = write_lock(&self.state, "registering watcher")?;
        let id = leaf_mut(state.tree_mut()?, &path)?.add_callback(callback);
        debug!(field = %path, id = id.0, "watcher registered");
        Ok(id)
    }

    pub fn unwatch(&self, path: impl Into<FieldPath>, id: WatchId) -> FormResult<bool> {
        let path = path.into();
        let mut state = write_lock(&self.state, "removing watcher")?;
        Ok(leaf_mut(state.tree_mut()?, &path)?.remove_callback(id))
    }

    /// Stores the current validation outcome of every validated leaf without
    /// waiting for a value change. Later changes are not tracked by this call.
    pub fn show_errors(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "showing errors")?;
        let refreshed = state.tree_mut()?.refresh_errors();
        trace!(refreshed, "errors recomputed");
        Ok(())
    }

    /// Overlays a `{ field: [message, ...] }` map, e.g. from a rejected submit.
    pub fn set_form_errors(&self, errors: &Value) -> FormResult<usize> {
        let mut state = write_lock(&self.state, "applying external errors")?;
        Ok(state.tree_mut()?.apply_errors(errors))
    }

    pub fn clear_errors(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "clearing all field errors")?;
        state.tree_mut()?.clear_errors();
        Ok(())
    }

    pub fn form_data(&self, options: &ValuesOptions) -> FormResult<FormPayload> {
        Ok(FormPayload::from_values(&self.form_values(options)?))
    }

    /// Assigns a single leaf, the way user input would.
    pub fn set_value(&self, path: impl Into<FieldPath>, value: Value) -> FormResult<()> {
        let path = path.into();
        {
            let mut state = write_lock(&self.state, "writing field value")?;
            let changed = leaf_mut(state.tree_mut()?, &path)?.assign(value);
            if changed {
                state.queue.push(path);
            }
        }
        self.flush_if_immediate()
    }

    pub fn value(&self, path: impl Into<FieldPath>) -> FormResult<Value> {
        let path = path.into();
        let state = read_lock(&self.state, "reading field value")?;
        Ok(leaf(state.tree()?, &path)?.value().clone())
    }

    pub fn error(&self, path: impl Into<FieldPath>) -> FormResult<Option<FieldError>> {
        let path = path.into();
        let state = read_lock(&self.state, "reading field error")?;
        Ok(leaf(state.tree()?, &path)?.error().cloned())
    }

    pub fn errors(&self) -> FormResult<Vec<(FieldPath, FieldError)>> {
        let state = read_lock(&self.state, "reading field errors")?;
        Ok(state.tree()?.errors())
    }

    pub fn pending_changes(&self) -> FormResult<usize> {
        Ok(read_lock(&self.state, "reading pending changes")?.queue.len())
    }

    /// Delivers queued changes to their watchers and returns how many watchers ran.
    ///
    /// Callbacks run after the state lock is released, so they may assign
    /// values themselves; those changes are delivered in a further round.
    /// A flush requested while another one is running only leaves its changes
    /// queued for the running flush and returns `0`.
    pub fn flush(&self) -> FormResult<usize> {
        {
            let mut state = write_lock(&self.state, "starting flush")?;
            if state.flushing {
                trace!(pending = state.queue.len(), "flush already running");
                return Ok(0);
            }
            state.flushing = true;
        }

        let outcome = self.flush_rounds();
        write_lock(&self.state, "finishing flush")?.flushing = false;
        outcome
    }

    fn flush_rounds(&self) -> FormResult<usize> {
        let mut invocations = 0;
        for _ in 0..MAX_FLUSH_ROUNDS {
            let callbacks = {
                let mut state = write_lock(&self.state, "flushing watcher queue")?;
                let batch = state.queue.drain();
                if batch.is_empty() {
                    return Ok(invocations);
                }

                let mut callbacks = Vec::new();
                let tree = state.tree_mut()?;
                for path in &batch {
                    let Some(leaf) = tree.leaf_mut(path) else {
                        continue;
                    };
                    let (revalidations, mut scheduled) = leaf.notify(path);
                    trace!(field = %path, revalidations, callbacks = scheduled.len(), "change delivered");
                    invocations += revalidations;
                    callbacks.append(&mut scheduled);
                }
                callbacks
            };

            invocations += callbacks.len();
            callbacks.into_iter().for_each(PendingCallback::run);
        }

        if read_lock(&self.state, "checking watcher queue")?.queue.is_empty() {
            return Ok(invocations);
        }
        warn!(rounds = MAX_FLUSH_ROUNDS, "watchers did not settle");
        Err(FormError::FlushLimitExceeded(MAX_FLUSH_ROUNDS))
    }

    fn flush_if_immediate(&self) -> FormResult<()> {
        if self.options.flush_mode == FlushMode::Immediate {
            let _ = self.flush()?;
        }
        Ok(())
    }
}

fn leaf<'a>(tree: &'a FormTree, path: &FieldPath) -> FormResult<&'a Leaf> {
    match tree.node(path) {
        Some(FieldNode::Leaf(leaf)) => Ok(leaf),
        Some(_) => Err(FormError::NotALeaf(path.clone())),
        None => Err(FormError::UnknownField(path.clone())),
    }
}

fn leaf_mut<'a>(tree: &'a mut FormTree, path: &FieldPath) -> FormResult<&'a mut Leaf> {
    match tree.node_mut(path) {
        Some(FieldNode::Leaf(leaf)) => Ok(leaf),
        Some(_) => Err(FormError::NotALeaf(path.clone())),
        None => Err(FormError::UnknownField(path.clone())),
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
