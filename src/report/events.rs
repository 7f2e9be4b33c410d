use serde::Serialize;

use crate::model::CompressionResult;

/// Event emitted to a streaming client while a job runs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobEvent {
    Progress {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Done {
        success: bool,
        original_size: u64,
        final_size: u64,
        target_reached: bool,
        step_used: String,
        download_url: Option<String>,
        error: Option<String>,
    },
}

impl JobEvent {
    pub fn progress(message: impl Into<String>) -> Self {
        JobEvent::Progress {
            message: message.into(),
        }
    }

    pub fn done(result: &CompressionResult, download_url: Option<String>) -> Self {
        JobEvent::Done {
            success: result.success,
            original_size: result.original_size_bytes,
            final_size: result.final_size_bytes,
            target_reached: result.target_reached,
            step_used: result.step_used.clone(),
            download_url,
            error: result.error_message.clone(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, JobEvent::Done { .. })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Server-sent-events frame: `data: <json>\n\n`
    pub fn to_sse(&self) -> serde_json::Result<String> {
        Ok(format!("data: {}\n\n", self.to_json()?))
    }
}
