pub use crate::form::{
    Field, FieldError, FieldPath, FlushMode, FormController, FormError, FormModel, FormOptions,
    FormPayload, FormResult, FormTree, ValuesOptions,
};
