//! Pipeline lifecycle events and the observer hook that receives them.

use std::fmt;

/// Something a pipeline did that operators may want to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    FrameAccepted {
        key: i64,
        width: u32,
        height: u32,
        row_stride: u32,
    },
    Resized {
        key: i64,
        from: (u32, u32),
        to: (u32, u32),
    },
    FrameDegraded {
        key: i64,
        truncated_rows: u32,
    },
    SurfaceLost {
        key: i64,
        reason: &'static str,
    },
    RecoveryAttempted {
        key: i64,
        error: Option<String>,
    },
    Disposed {
        key: i64,
    },
}

impl PipelineEvent {
    pub fn key(&self) -> i64 {
        match self {
            PipelineEvent::FrameAccepted { key, .. }
            | PipelineEvent::Resized { key, .. }
            | PipelineEvent::FrameDegraded { key, .. }
            | PipelineEvent::SurfaceLost { key, .. }
            | PipelineEvent::RecoveryAttempted { key, .. }
            | PipelineEvent::Disposed { key } => *key,
        }
    }
}

/// Receives [`PipelineEvent`]s synchronously on the submitting thread.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::FrameAccepted {
                key,
                width,
                height,
                row_stride,
            } => tracing::trace!(key, width, height, row_stride, "frame presented"),
            PipelineEvent::Resized { key, from, to } => {
                tracing::debug!(key, ?from, ?to, "frame texture reallocated")
            }
            PipelineEvent::FrameDegraded {
                key,
                truncated_rows,
            } => tracing::warn!(key, truncated_rows, "frame presented with truncated rows"),
            PipelineEvent::SurfaceLost { key, reason } => {
                tracing::warn!(key, reason, "presentation surface invalidated")
            }
            PipelineEvent::RecoveryAttempted { key, error: None } => {
                tracing::info!(key, "presentation surface recovered")
            }
            PipelineEvent::RecoveryAttempted {
                key,
                error: Some(error),
            } => tracing::warn!(key, %error, "presentation surface recovery failed"),
            PipelineEvent::Disposed { key } => tracing::debug!(key, "renderer disposed"),
        }
    }
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::FrameAccepted {
                key, width, height, ..
            } => write!(f, "[{key}] frame {width}x{height}"),
            PipelineEvent::Resized { key, from, to } => {
                write!(f, "[{key}] resize {}x{} -> {}x{}", from.0, from.1, to.0, to.1)
            }
            PipelineEvent::FrameDegraded {
                key,
                truncated_rows,
            } => write!(f, "[{key}] degraded ({truncated_rows} rows)"),
            PipelineEvent::SurfaceLost { key, reason } => write!(f, "[{key}] surface lost: {reason}"),
            PipelineEvent::RecoveryAttempted { key, error: None } => write!(f, "[{key}] recovered"),
            PipelineEvent::RecoveryAttempted {
                key,
                error: Some(error),
            } => write!(f, "[{key}] recovery failed: {error}"),
            PipelineEvent::Disposed { key } => write!(f, "[{key}] disposed"),
        }
    }
}
