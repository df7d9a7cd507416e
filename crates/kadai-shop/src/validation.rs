use kadai_config::ImagesConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every problem with a submitted form, collected before any I/O happens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Appends `other`'s fields, skipping any field already reported.
    pub fn merge(&mut self, other: ValidationErrors) {
        for fe in other.fields {
            if !self.has(&fe.field) {
                self.fields.push(fe);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed: ")?;
        for (i, fe) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", fe.field, fe.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// An uploaded image as received from a form.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

pub(crate) fn check_image(
    errors: &mut ValidationErrors,
    field: &str,
    image: &ImageUpload,
    rules: &ImagesConfig,
) {
    if image.bytes.is_empty() {
        errors.push(field, "The uploaded file is empty.");
        return;
    }
    if !rules.accepts(&image.content_type) {
        errors.push(
            field,
            format!("Unsupported image type: {}.", image.content_type),
        );
    }
    if image.bytes.len() > rules.max_bytes {
        errors.push(
            field,
            format!("Image must be at most {} bytes.", rules.max_bytes),
        );
    }
}

pub(crate) fn require_text(errors: &mut ValidationErrors, field: &str, value: &str, message: &str) {
    if value.trim().is_empty() {
        errors.push(field, message);
    }
}
