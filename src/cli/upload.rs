//! Upload arguments and failure reporting for `maps add` and `files add`

use std::path::PathBuf;

use anyhow::anyhow;
use clap::Args;

use super::output::Output;
use crate::service::{Cleanup, StageError, UploadRequest};

#[derive(Args)]
pub struct UploadArgs {
    /// Project ID
    pub project_id: String,

    /// Group to file the upload under
    pub group_id: String,

    /// Local file to upload
    pub file: PathBuf,

    /// Display name (defaults to the file name)
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Tag to add (repeatable)
    #[arg(long = "tag", short = 't')]
    pub tags: Vec<String>,
}

impl UploadArgs {
    pub fn to_request(&self) -> UploadRequest {
        let mut request = UploadRequest::new(&self.project_id, &self.file, &self.group_id);
        request.display_name = self.name.clone().filter(|n| !n.is_empty());
        request.tags = self.tags.clone();
        request
    }
}

/// Prints what a failed upload left behind and converts it for `main`
pub fn report_failure(output: &Output, err: StageError) -> anyhow::Error {
    if let Some(blob) = &err.orphaned_blob {
        output.warn(&format!("uploaded data was left without a file record: {}", blob.url));
    }
    match &err.cleanup {
        Cleanup::Removed => output.warn("the created file record was removed again"),
        Cleanup::Failed(reason) => {
            output.warn(&format!("the created file record could not be removed: {}", reason))
        }
        Cleanup::NotAttempted => {}
    }
    output.verbose_ctx("upload", &format!("failed at stage {}", err.stage.number()));
    anyhow!(err)
}

