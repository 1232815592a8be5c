use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::route_recorder::RecorderState;
use crate::route_store::SessionId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackingError {
    #[error("cannot {action} a session that is {state:?}")]
    InvalidStateTransition {
        state: RecorderState,
        action: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum RouteStoreError {
    #[error("failed to write route to {path:?}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed route document {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no route stored for session {0}")]
    NotFound(SessionId),
}

impl RouteStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RouteStoreError::NotFound(_))
    }
}
