//! Form bodies and file uploads.
//!
//! # Responsibilities
//! - Parse `multipart/form-data` and urlencoded bodies once per request
//! - Enforce per-parameter size and MIME constraints
//! - Track chunked uploads and assemble them in strict order
//!
//! # Design Decisions
//! - Chunk `n` is accepted only right after chunk `n - 1`; anything else is a
//!   client error and the upload keeps its state
//! - Completed uploads leave the registry; stale partial uploads are swept
//! - Storage of finished files is the application's concern

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart};
use axum::http::{header, Request};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::dispatch::DispatchError;
use crate::http::RequestContext;

pub const UPLOAD_ID_FIELD: &str = "uploadId";
pub const CHUNK_INDEX_FIELD: &str = "chunkIndex";
pub const TOTAL_CHUNKS_FIELD: &str = "totalChunks";

/// Constraints on one file parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileUploadSpec {
    /// Largest accepted file (whole upload, for chunked transfers).
    pub max_size: Option<usize>,
    /// Accepted content types. Empty accepts any.
    pub allowed_mime_types: Vec<String>,
    /// Accept the chunked protocol for this parameter.
    pub chunked: bool,
}

impl FileUploadSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_size(mut self, bytes: usize) -> Self {
        self.max_size = Some(bytes);
        self
    }

    pub fn allow(mut self, mime: impl Into<String>) -> Self {
        self.allowed_mime_types.push(mime.into());
        self
    }

    pub fn chunked(mut self) -> Self {
        self.chunked = true;
        self
    }
}

/// One file part of a multipart body.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Text fields and file parts of a form body.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: Vec<(String, String)>,
    files: Vec<FilePart>,
}

impl FormData {
    /// Parse the request body when it is a form. Other content types yield `None`.
    pub async fn parse(request: &RequestContext) -> Result<Option<Self>, DispatchError> {
        let Some(content_type) = request.content_type() else {
            return Ok(None);
        };
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "application/x-www-form-urlencoded" => {
                let fields = url::form_urlencoded::parse(&request.body)
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect();
                Ok(Some(Self {
                    fields,
                    files: Vec::new(),
                }))
            }
            "multipart/form-data" => Self::parse_multipart(content_type, request.body.clone())
                .await
                .map(Some),
            _ => Ok(None),
        }
    }

    async fn parse_multipart(content_type: &str, body: Bytes) -> Result<Self, DispatchError> {
        let request = Request::builder()
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .map_err(DispatchError::internal)?;
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| DispatchError::bad_request(e.body_text()))?;

        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| DispatchError::bad_request(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| DispatchError::bad_request(e.body_text()))?;

            if file_name.is_some() {
                form.files.push(FilePart {
                    field: name,
                    file_name,
                    content_type,
                    data,
                });
            } else {
                form.fields
                    .push((name, String::from_utf8_lossy(&data).into_owned()));
            }
        }
        Ok(form)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.files.iter().find(|f| f.field == name)
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn with_file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }
}

/// A fully received file.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
    /// Set when the file arrived in chunks.
    pub upload_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Complete(UploadedFile),
    /// More chunks expected.
    Partial {
        upload_id: String,
        received: u32,
        total: u32,
    },
}

#[derive(Debug)]
struct PendingUpload {
    file_name: Option<String>,
    content_type: Option<String>,
    total: u32,
    received: u32,
    data: Vec<u8>,
    started: DateTime<Utc>,
    /// Subject that opened the upload; `None` for anonymous uploads.
    owner: Option<String>,
}

/// Chunk framing fields read from the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    pub upload_id: Option<String>,
    pub index: u32,
    pub total: u32,
}

impl ChunkInfo {
    /// `Ok(None)` when the form carries no chunk fields (single-shot upload).
    pub fn from_form(form: &FormData) -> Result<Option<Self>, DispatchError> {
        let (Some(index), Some(total)) = (form.field(CHUNK_INDEX_FIELD), form.field(TOTAL_CHUNKS_FIELD)) else {
            return Ok(None);
        };
        let index: u32 = index
            .trim()
            .parse()
            .map_err(|_| DispatchError::bad_request("Invalid chunkIndex"))?;
        let total: u32 = total
            .trim()
            .parse()
            .map_err(|_| DispatchError::bad_request("Invalid totalChunks"))?;
        if total == 0 || index >= total {
            return Err(DispatchError::bad_request("chunkIndex must be below totalChunks"));
        }
        Ok(Some(Self {
            upload_id: form
                .field(UPLOAD_ID_FIELD)
                .map(str::to_string)
                .filter(|s| !s.is_empty()),
            index,
            total,
        }))
    }
}

/// Check size and type of a part against `spec`.
pub fn check_part(part: &FilePart, spec: &FileUploadSpec, size: usize) -> Result<(), DispatchError> {
    if let Some(max) = spec.max_size {
        if size > max {
            return Err(DispatchError::PayloadTooLarge);
        }
    }
    if !spec.allowed_mime_types.is_empty() {
        let mime = part.content_type.as_deref().unwrap_or("application/octet-stream");
        if !spec.allowed_mime_types.iter().any(|m| m.eq_ignore_ascii_case(mime)) {
            return Err(DispatchError::bad_request(format!("Unsupported file type: {}", mime)));
        }
    }
    Ok(())
}

/// In-progress chunked uploads.
#[derive(Debug)]
pub struct UploadRegistry {
    uploads: DashMap<String, PendingUpload>,
    clock: Arc<dyn Clock>,
}

impl UploadRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            uploads: DashMap::new(),
            clock,
        }
    }

    /// Accept one chunk. The first chunk (index 0) opens an upload when no id is given.
    pub fn accept_chunk(
        &self,
        chunk: &ChunkInfo,
        part: &FilePart,
        spec: &FileUploadSpec,
        owner: Option<&str>,
    ) -> Result<UploadOutcome, DispatchError> {
        let upload_id = match &chunk.upload_id {
            Some(id) => id.clone(),
            None if chunk.index == 0 => uuid::Uuid::new_v4().to_string(),
            None => return Err(DispatchError::bad_request("uploadId is required after the first chunk")),
        };

        let mut entry = match self.uploads.entry(upload_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => entry.into_ref(),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                if chunk.index != 0 {
                    return Err(DispatchError::bad_request(format!("Unknown upload: {}", upload_id)));
                }
                entry.insert(PendingUpload {
                    file_name: part.file_name.clone(),
                    content_type: part.content_type.clone(),
                    total: chunk.total,
                    received: 0,
                    data: Vec::new(),
                    started: self.clock.now(),
                    owner: owner.map(str::to_string),
                })
            }
        };

        let pending = entry.value_mut();
        if pending.owner.as_deref() != owner {
            tracing::warn!(upload_id = %upload_id, caller = ?owner, "Chunk from a caller that did not open the upload");
            return Err(DispatchError::Forbidden("Upload belongs to another caller".into()));
        }
        if pending.total != chunk.total {
            return Err(DispatchError::bad_request("totalChunks changed during upload"));
        }
        if chunk.index != pending.received {
            return Err(DispatchError::bad_request(format!(
                "Chunk out of order: expected {}, got {}",
                pending.received, chunk.index
            )));
        }

        let size = pending.data.len() + part.data.len();
        if let Err(err) = check_part(part, spec, size) {
            drop(entry);
            self.uploads.remove(&upload_id);
            return Err(err);
        }

        pending.data.extend_from_slice(&part.data);
        pending.received += 1;
        let (received, total) = (pending.received, pending.total);
        drop(entry);

        if received < total {
            tracing::debug!(upload_id = %upload_id, received, total, "Chunk accepted");
            return Ok(UploadOutcome::Partial {
                upload_id,
                received,
                total,
            });
        }

        let Some((_, done)) = self.uploads.remove(&upload_id) else {
            return Err(DispatchError::bad_request(format!("Unknown upload: {}", upload_id)));
        };
        tracing::info!(upload_id = %upload_id, bytes = done.data.len(), "Chunked upload complete");
        Ok(UploadOutcome::Complete(UploadedFile {
            file_name: done.file_name,
            content_type: done.content_type,
            data: Bytes::from(done.data),
            upload_id: Some(upload_id),
        }))
    }

    /// Drop partial uploads older than `max_age`. Returns how many were dropped.
    pub fn purge_stale(&self, max_age: Duration) -> usize {
        let cutoff = self.clock.now() - max_age;
        let before = self.uploads.len();
        self.uploads.retain(|_, upload| upload.started > cutoff);
        before.saturating_sub(self.uploads.len())
    }

    pub fn len(&self) -> usize {
        self.uploads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
    }
}
