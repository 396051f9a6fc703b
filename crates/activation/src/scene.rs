use std::sync::Arc;

use scene_client::SceneTransport;
use shared::{
    domain::SceneRef,
    protocol::{CurrentProgramScene, SceneEvent, SceneRequest},
};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};
use tracing::{debug, info, warn};

use crate::ActivationError;

/// Current program scene, swapped atomically as change events arrive.
#[derive(Clone)]
pub struct SceneTracker {
    current: Arc<watch::Sender<Option<SceneRef>>>,
}

impl Default for SceneTracker {
    fn default() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current: Arc::new(current),
        }
    }
}

impl SceneTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<SceneRef> {
        self.current.borrow().clone()
    }

    pub fn set(&self, scene: SceneRef) {
        self.current.send_replace(Some(scene));
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SceneRef>> {
        self.current.subscribe()
    }

    /// Ask the production tool for its program scene and remember it.
    pub async fn refresh(&self, transport: &dyn SceneTransport) -> Result<SceneRef, ActivationError> {
        let response = transport.call(SceneRequest::GetCurrentProgramScene).await?;
        let scene = response
            .data::<CurrentProgramScene>()?
            .into_scene_ref()
            .ok_or(ActivationError::NoCurrentScene)?;
        info!(scene = %scene.scene_name, uuid = %scene.scene_uuid, "scene: current program scene");
        self.set(scene.clone());
        Ok(scene)
    }
}

/// Follow `CurrentProgramSceneChanged` events until the event stream closes.
///
/// Subscribe to `events` before the initial [`SceneTracker::refresh`] so a
/// switch made during that round trip is still applied. When events are
/// dropped the program scene is read again from `transport`.
pub fn spawn_scene_watcher(
    tracker: SceneTracker,
    transport: Arc<dyn SceneTransport>,
    events: broadcast::Receiver<SceneEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut events = BroadcastStream::new(events);
        while let Some(event) = events.next().await {
            match event {
                Ok(SceneEvent::CurrentProgramSceneChanged(scene)) => {
                    debug!(
                        scene = %scene.scene_name,
                        uuid = %scene.scene_uuid,
                        "scene: program scene changed"
                    );
                    tracker.set(scene);
                }
                Ok(SceneEvent::Other { .. }) => {}
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "scene: missed events; reading program scene again");
                    if let Err(err) = tracker.refresh(transport.as_ref()).await {
                        warn!(error = %err, "scene: program scene re-read failed");
                    }
                }
            }
        }
        debug!("scene: event stream closed");
    })
}

#[cfg(test)]
#[path = "tests/scene_tests.rs"]
mod tests;
