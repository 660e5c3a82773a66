//! Image upload around an async uploader.
//!
//! The insertion point is held by a [`RangeRef`] while files are in flight, so
//! edits made in the meantime move it along. When the point disappears the
//! completion does nothing.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::editor::{Editor, RangeRef};
use crate::elements::{image_run, insert_inlines};
use crate::error::{EditorError, UploadError};
use crate::node::Node;

/// Inserted in place of an image whose upload failed.
pub const FAILED_IMAGE_URL: &str = "data:image/svg+xml,%3Csvg xmlns='http://www.w3.org/2000/svg' width='24' height='24'%3E%3Cpath d='M3 3h18v18H3z' fill='none' stroke='%23d33' stroke-width='2'/%3E%3Cpath d='M3 3l18 18M21 3L3 21' stroke='%23d33' stroke-width='2'/%3E%3C/svg%3E";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFile {
    pub name: String,
    pub mime: String,
    #[serde(default)]
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

/// Stores a file somewhere and returns the URL it is served from.
#[allow(async_fn_in_trait)]
pub trait ImageUploader {
    async fn upload(&self, file: UploadFile) -> Result<String, UploadError>;
}

/// Files waiting for their upload results.
#[derive(Debug)]
pub struct PendingUpload {
    at: RangeRef,
    files: Vec<UploadFile>,
}

impl PendingUpload {
    pub fn files(&self) -> &[UploadFile] {
        &self.files
    }

    /// Uploads every file in order. Failures are kept, not propagated.
    pub async fn upload<U: ImageUploader>(&self, uploader: &U) -> Vec<Result<String, UploadError>> {
        let mut results = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let result = uploader.upload(file.clone()).await;
            if let Err(err) = &result {
                warn!(file = %file.name, %err, "image upload failed");
            }
            results.push(result);
        }
        results
    }
}

impl Editor {
    /// Reserves the selection for `files`. `None` without a selection or files.
    pub fn begin_image_upload(&mut self, files: Vec<UploadFile>) -> Option<PendingUpload> {
        if files.is_empty() {
            return None;
        }
        let range = self.selection()?;
        let at = self.range_ref(&range)?;
        debug!(files = files.len(), "image upload started");
        Some(PendingUpload { at, files })
    }

    /// Inserts one image per file at the reserved range. Failed files get
    /// [`FAILED_IMAGE_URL`] and one alert sums them up.
    pub fn complete_image_upload(
        &mut self,
        pending: PendingUpload,
        results: Vec<Result<String, UploadError>>,
    ) -> Result<bool, EditorError> {
        let PendingUpload { at, files } = pending;
        let Some(range) = at.unref(self) else {
            debug!("upload target was removed, dropping images");
            return Ok(false);
        };
        let mut failed = 0;
        let mut nodes: Vec<Node> = Vec::new();
        for (ix, file) in files.iter().enumerate() {
            let url = match results.get(ix) {
                Some(Ok(url)) => url.as_str(),
                _ => {
                    failed += 1;
                    FAILED_IMAGE_URL
                }
            };
            nodes.extend(image_run(url, &file.name));
        }
        let inserted = insert_inlines(self, &range, nodes)?;
        if failed > 0 {
            self.alert("Upload failed", &format!("{failed} images failed to upload"));
        }
        Ok(inserted)
    }
}

/// Uploads `files` and inserts the resulting images at the selection.
pub async fn upload_images<U: ImageUploader>(
    editor: &mut Editor,
    uploader: &U,
    files: Vec<UploadFile>,
) -> Result<bool, EditorError> {
    let Some(pending) = editor.begin_image_upload(files) else {
        return Ok(false);
    };
    let results = pending.upload(uploader).await;
    editor.complete_image_upload(pending, results)
}
