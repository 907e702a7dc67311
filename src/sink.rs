//! Preview sinks handed out to the windowing layer.
//!
//! A sink starts out pending: the surface behind it does not exist yet.
//! Only [`PendingSink::into_ready`] produces a [`SinkHandle`], and only a
//! `SinkHandle` can be given to the session controller or the surface router.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Create a new surface-backed sink for the windowing collaborator.
pub fn create_sink(label: impl Into<String>) -> PendingSink {
    PendingSink {
        id: NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed),
        label: label.into(),
    }
}

/// A sink whose drawing surface has not been created yet
#[derive(Debug)]
pub struct PendingSink {
    id: u64,
    label: String,
}

impl PendingSink {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Called once the surface behind the sink exists.
    pub fn into_ready(self) -> SinkHandle {
        SinkHandle {
            id: self.id,
            label: self.label,
        }
    }
}

/// Opaque handle to a ready, surface-backed sink
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SinkHandle {
    id: u64,
    label: String,
}

impl SinkHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}
