pub mod form;
pub mod prelude;

#[cfg(test)]
pub(crate) mod testing;

pub use form::{FormController, FormOptions, FormTree};
