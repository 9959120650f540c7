//! Multipart request bodies. File parts are streamed from disk.

use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;

use crate::error::ClientError;

/// Text fields and file parts, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct FormSpec {
    fields: Vec<(String, String)>,
    files: Vec<(String, PathBuf)>,
}

impl FormSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field; a repeated key replaces the earlier value.
    pub fn field(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Add a file part under `form_field`.
    pub fn file(&mut self, form_field: impl Into<String>, path: impl Into<PathBuf>) {
        self.files.push((form_field.into(), path.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }

    /// Build a fresh body. Called once per request since a form is consumed
    /// by sending it.
    pub async fn build(&self) -> Result<Form, ClientError> {
        let mut form = Form::new();
        for (key, value) in &self.fields {
            form = form.text(key.clone(), value.clone());
        }
        for (field, path) in &self.files {
            form = form.part(field.clone(), file_part(path).await?);
        }
        Ok(form)
    }
}

/// A streamed `application/octet-stream` part named after the file's basename.
pub async fn file_part(path: &Path) -> Result<Part, ClientError> {
    let file = tokio::fs::File::open(path).await?;
    let len = file.metadata().await?.len();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
    Ok(Part::stream_with_length(body, len)
        .file_name(file_name)
        .mime_str("application/octet-stream")?)
}
