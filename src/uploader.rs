//! Chunked binary upload
//!
//! The store API caps request bodies, so binaries are sent in fixed-size
//! chunks:
//!
//! 1. `POST /upload/initiate` announces the file and returns an upload id
//! 2. `POST /upload/{id}/chunk` once per chunk, strictly in index order
//! 3. `POST /upload/{id}/finalize` assembles the chunks into a final path
//! 4. `POST /apps/{app}/versions/{version}/binary` links that path to the version
//!
//! Chunks are never retried and an aborted upload is not resumable: the next
//! attempt starts again from chunk 0 with a new upload id.

use crate::client::{BinaryAttachment, InitiateUpload, StoreClient};
use crate::downloader::ProgressCallback;
use crate::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default chunk size (50 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 50 * 1024 * 1024;

/// How a file of `total_size` bytes is split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    pub total_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u64,
}

impl ChunkPlan {
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig(
                "chunk size must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            total_size,
            chunk_size,
            total_chunks: total_size.div_ceil(chunk_size),
        })
    }

    /// Byte length of chunk `index`; only the last chunk may be shorter
    pub fn chunk_len(&self, index: u64) -> u64 {
        let start = index.saturating_mul(self.chunk_size);
        self.total_size.saturating_sub(start).min(self.chunk_size)
    }
}

pub struct ChunkedUploader<'a> {
    client: &'a StoreClient,
    chunk_size: u64,
    progress: Option<ProgressCallback>,
}

impl<'a> ChunkedUploader<'a> {
    pub fn new(client: &'a StoreClient, chunk_size: u64) -> Self {
        Self {
            client,
            chunk_size,
            progress: None,
        }
    }

    /// Report `(label, chunks_sent, total_chunks)` after every chunk
    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Upload `path` and attach it to the given version
    pub fn upload(&self, path: &Path, app_id: u64, version_id: u64) -> Result<BinaryAttachment> {
        let file_size = std::fs::metadata(path)?.len();
        let plan = ChunkPlan::new(file_size, self.chunk_size)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::Other(format!("Not a file: {}", path.display())))?;

        println!(
            "  File size: {:.1} MB, uploading in {} chunk{}",
            file_size as f64 / (1024.0 * 1024.0),
            plan.total_chunks,
            if plan.total_chunks == 1 { "" } else { "s" }
        );

        let upload_id = self.client.initiate_upload(&InitiateUpload {
            filename: filename.clone(),
            total_size: plan.total_size,
            total_chunks: plan.total_chunks,
            chunk_size: plan.chunk_size,
        })?;
        println!("  Initiated chunked upload with ID: {}", upload_id);

        self.send_chunks(path, &filename, &upload_id, &plan)?;
        println!("  ✓ All chunks uploaded");

        let final_path = self.client.finalize_upload(&upload_id)?;
        println!("  ✓ Upload finalized: {}", final_path);

        let attachment = self.client.attach_binary(app_id, version_id, &final_path)?;
        println!(
            "  ✓ Binary applied to version {} - Status: {} - Method: {}",
            version_id, attachment.version_status, attachment.upload_method
        );
        if attachment.is_approved() {
            println!("  🎉 Version auto-approved!");
        }

        Ok(attachment)
    }

    fn send_chunks(&self, path: &Path, label: &str, upload_id: &str, plan: &ChunkPlan) -> Result<()> {
        let mut file = File::open(path)?;

        for index in 0..plan.total_chunks {
            let expected = plan.chunk_len(index);

            // Scoped to this iteration: released as soon as the send returns
            let mut buffer = Vec::with_capacity(expected as usize);
            (&mut file).take(expected).read_to_end(&mut buffer)?;
            if buffer.len() as u64 != expected {
                return Err(Error::Other(format!(
                    "{} changed while uploading: chunk {} has {} of {} bytes",
                    path.display(),
                    index,
                    buffer.len(),
                    expected
                )));
            }

            match &self.progress {
                Some(cb) => cb(label, index, plan.total_chunks),
                None => println!(
                    "  Uploading chunk {}/{} ({:.1} MB)",
                    index + 1,
                    plan.total_chunks,
                    expected as f64 / (1024.0 * 1024.0)
                ),
            }

            self.client.upload_chunk(upload_id, index, buffer)?;
        }

        if let Some(cb) = &self.progress {
            cb(label, plan.total_chunks, plan.total_chunks);
        }

        Ok(())
    }
}
