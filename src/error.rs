use crate::membership::types::NodeId;
use thiserror::Error;

/// Lifecycle failures that end a node. Nothing here is retried.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node {0} was already started")]
    AlreadyStarted(NodeId),

    #[error("node {0} has not been started")]
    NotStarted(NodeId),

    #[error("no node at {0}")]
    UnknownNode(NodeId),

    #[error("node {0} has failed")]
    Failed(NodeId),

    #[error("failed to encode message: {0}")]
    Encode(#[from] bincode::Error),
}
