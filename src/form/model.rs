use serde::de::DeserializeOwned;
use tracing::warn;

use super::controller::{FormController, FormError, FormResult, read_lock};
use super::values::ValuesOptions;

/// A typed model whose top-level fields a form tree is expected to declare.
///
/// Usually derived with `#[derive(FormModel)]`.
pub trait FormModel {
    const FIELDS: &'static [&'static str];
}

impl FormController {
    /// Model fields the bound tree does not declare at the top level.
    pub fn missing_fields<T: FormModel>(&self) -> FormResult<Vec<&'static str>> {
        let state = read_lock(&self.state, "comparing form tree with model")?;
        let tree = state.tree.as_ref().ok_or(FormError::Unbound)?;
        let missing = T::FIELDS
            .iter()
            .copied()
            .filter(|field| !tree.names().any(|name| name == *field))
            .collect::<Vec<_>>();
        for field in &missing {
            warn!(
                field = %field,
                model = std::any::type_name::<T>(),
                "model field missing from form tree"
            );
        }
        Ok(missing)
    }

    /// Decodes the extracted form values into a typed model.
    pub fn extract<T: DeserializeOwned>(&self, options: &ValuesOptions) -> FormResult<T> {
        let values = self.form_values(options)?;
        serde_json::from_value(values).map_err(|error| FormError::Decode(error.to_string()))
    }
}
