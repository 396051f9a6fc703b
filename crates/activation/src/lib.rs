//! Single-active-of-N switching of scene layers.
//!
//! [`ActivationController::activate`] resolves every managed layer against one
//! scene snapshot, reads all filter stacks in one batch, and writes every
//! controllable chroma-key filter back in one batch so that only the target
//! layer ends up visible.

use scene_client::SceneClientError;
use shared::{domain::SceneItem, error::ProtocolError};
use thiserror::Error;

mod controller;
pub mod resolver;
pub mod scene;
pub mod state_reader;

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

pub use controller::{ActivationController, ActivationReport, WriteFailure};
pub use resolver::{resolve, ResolveError};
pub use scene::{spawn_scene_watcher, SceneTracker};
pub use state_reader::{read_state, ActivationState, ChromaKeyFilter};

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("'{target}' is not a managed object")]
    UnknownTarget { target: String },
    #[error("current program scene is not known yet")]
    NoCurrentScene,
    #[error("scene '{scene}': {source}")]
    Resolve {
        scene: String,
        #[source]
        source: ResolveError,
    },
    #[error("failed to read filters of '{name}': {reason}")]
    FilterRead { name: String, reason: String },
    #[error(transparent)]
    Transport(#[from] SceneClientError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// One managed layer as seen during a single activation.
///
/// Built fresh for every call and dropped afterwards; the scene can change
/// between calls, so nothing here is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedObject {
    pub name: String,
    pub scene_item: SceneItem,
    pub filter: Option<ChromaKeyFilter>,
    pub is_active: bool,
}
