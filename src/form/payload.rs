use serde_json::Value;

use super::controller::{FormError, FormResult};
use super::value::coerce_to_text;

const MAX_BOUNDARY_LEN: usize = 70;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FormPart {
    /// Scalar passed through as its text form.
    Text(String),
    /// Object or array, JSON-stringified.
    Json(String),
}

impl FormPart {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(_) | Value::Object(_) => FormPart::Json(value.to_string()),
            scalar => FormPart::Text(coerce_to_text(scalar)),
        }
    }

    pub fn as_text(&self) -> &str {
        match self {
            FormPart::Text(text) | FormPart::Json(text) => text,
        }
    }
}

/// Flat key/value container ready to be sent as a request body.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FormPayload {
    parts: Vec<(String, FormPart)>,
}

impl FormPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// One part per top-level key of `values`. Anything but an object yields
    /// an empty payload.
    pub fn from_values(values: &Value) -> Self {
        let parts = values
            .as_object()
            .map(|entries| {
                entries
                    .iter()
                    .map(|(name, value)| (name.clone(), FormPart::from_value(value)))
                    .collect()
            })
            .unwrap_or_default();
        Self { parts }
    }

    pub fn append(&mut self, name: impl Into<String>, part: FormPart) {
        self.parts.push((name.into(), part));
    }

    pub fn get(&self, name: &str) -> Option<&FormPart> {
        self.parts
            .iter()
            .find_map(|(part_name, part)| (part_name == name).then_some(part))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormPart)> {
        self.parts.iter().map(|(name, part)| (name.as_str(), part))
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn content_type(boundary: &str) -> FormResult<String> {
        validate_boundary(boundary)?;
        Ok(format!("multipart/form-data; boundary={boundary}"))
    }

    /// Renders a `multipart/form-data` body with CRLF line endings.
    pub fn to_multipart(&self, boundary: &str) -> FormResult<String> {
        validate_boundary(boundary)?;
        let mut body = String::new();
        for (name, part) in &self.parts {
            body.push_str("--");
            body.push_str(boundary);
            body.push_str("\r\n");
            body.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                escape_name(name)
            ));
            body.push_str(part.as_text());
            body.push_str("\r\n");
        }
        body.push_str("--");
        body.push_str(boundary);
        body.push_str("--\r\n");
        Ok(body)
    }
}

fn validate_boundary(boundary: &str) -> FormResult<()> {
    if boundary.is_empty()
        || boundary.len() > MAX_BOUNDARY_LEN
        || boundary.contains(['\r', '\n'])
    {
        return Err(FormError::InvalidBoundary(boundary.to_string()));
    }
    Ok(())
}

fn escape_name(name: &str) -> String {
    name.replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
