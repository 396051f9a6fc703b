use std::sync::Arc;

use scene_client::{SceneClientError, SceneTransport};
use shared::{
    domain::SceneRef,
    protocol::{SceneItemList, SceneRequest, SourceFilterList},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{read_state, resolve, ActivationError, ManagedObject, SceneTracker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFailure {
    pub name: String,
    pub code: u32,
    pub comment: String,
}

/// Outcome of one activation after the write batch came back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    pub target: String,
    pub scene: String,
    /// Objects whose filter write succeeded, in managed order.
    pub written: Vec<String>,
    /// Objects without a chroma-key filter.
    pub skipped: Vec<String>,
    pub failed: Vec<WriteFailure>,
}

impl ActivationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ActivationController {
    transport: Arc<dyn SceneTransport>,
    scene: SceneTracker,
    managed: Vec<String>,
    // Overlapping triggers run one after another instead of racing.
    serial: Mutex<()>,
}

impl ActivationController {
    pub fn new(
        transport: Arc<dyn SceneTransport>,
        scene: SceneTracker,
        managed: Vec<String>,
    ) -> Self {
        Self {
            transport,
            scene,
            managed,
            serial: Mutex::new(()),
        }
    }

    pub fn is_managed(&self, name: &str) -> bool {
        self.managed.iter().any(|managed| managed == name)
    }

    /// Make `target` the only visible managed object.
    ///
    /// Every read happens before any write. A resolution or read failure
    /// aborts with nothing written; write failures are per object and are
    /// reported without stopping the rest of the batch.
    pub async fn activate(&self, target: &str) -> Result<ActivationReport, ActivationError> {
        if !self.is_managed(target) {
            return Err(ActivationError::UnknownTarget {
                target: target.to_string(),
            });
        }

        let _serial = self.serial.lock().await;
        let scene = self.scene.current().ok_or(ActivationError::NoCurrentScene)?;
        let mut objects = self.load_managed_objects(&scene).await?;

        let mut report = ActivationReport {
            target: target.to_string(),
            scene: scene.scene_name.clone(),
            ..ActivationReport::default()
        };
        let mut writes = Vec::new();
        let mut written_names = Vec::new();
        for object in &mut objects {
            let desired = object.name == target;
            let Some(filter) = object.filter.as_mut() else {
                debug!(object = %object.name, "activation: no chroma key filter; skipping");
                report.skipped.push(object.name.clone());
                continue;
            };
            debug!(
                object = %object.name,
                was_active = object.is_active,
                active = desired,
                "activation: planned filter write"
            );
            filter.set_active(desired);
            object.is_active = desired;
            writes.push(SceneRequest::SetSourceFilterSettings {
                source_uuid: object.scene_item.source_uuid.clone(),
                filter_name: filter.filter_name.clone(),
                filter_settings: filter.settings_value(),
                overlay: true,
            });
            written_names.push(object.name.clone());
        }

        if writes.is_empty() {
            warn!(requested = %target, "activation: no managed object has a chroma key filter");
            return Ok(report);
        }

        let results = self.transport.call_batch(writes).await?;
        if results.len() != written_names.len() {
            return Err(SceneClientError::BatchLengthMismatch {
                expected: written_names.len(),
                actual: results.len(),
            }
            .into());
        }
        for (name, result) in written_names.into_iter().zip(results) {
            if result.is_success() {
                report.written.push(name);
                continue;
            }
            let comment = result
                .request_status
                .comment
                .unwrap_or_else(|| "no comment".to_string());
            warn!(
                object = %name,
                code = result.request_status.code,
                %comment,
                "activation: filter write failed"
            );
            report.failed.push(WriteFailure {
                name,
                code: result.request_status.code,
                comment,
            });
        }

        info!(
            requested = %target,
            scene = %report.scene,
            written = report.written.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "activation: applied"
        );
        Ok(report)
    }

    async fn load_managed_objects(
        &self,
        scene: &SceneRef,
    ) -> Result<Vec<ManagedObject>, ActivationError> {
        let items = self
            .transport
            .call(SceneRequest::GetSceneItemList {
                scene_uuid: scene.scene_uuid.clone(),
            })
            .await?
            .data::<SceneItemList>()?
            .scene_items;

        let resolved = self
            .managed
            .iter()
            .map(|name| {
                resolve(&items, name)
                    .map(|item| (name.clone(), item.clone()))
                    .map_err(|source| ActivationError::Resolve {
                        scene: scene.scene_name.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let reads = resolved
            .iter()
            .map(|(_, item)| SceneRequest::GetSourceFilterList {
                source_uuid: item.source_uuid.clone(),
            })
            .collect();
        let responses = self.transport.call_batch(reads).await?;
        if responses.len() != resolved.len() {
            return Err(SceneClientError::BatchLengthMismatch {
                expected: resolved.len(),
                actual: responses.len(),
            }
            .into());
        }

        resolved
            .into_iter()
            .zip(responses)
            .map(|((name, scene_item), response)| {
                if !response.is_success() {
                    return Err(ActivationError::FilterRead {
                        reason: response
                            .request_status
                            .comment
                            .unwrap_or_else(|| format!("status {}", response.request_status.code)),
                        name,
                    });
                }
                let filters = response.data::<SourceFilterList>()?.filters;
                let state = read_state(&filters);
                Ok(ManagedObject {
                    name,
                    scene_item,
                    is_active: state.is_active,
                    filter: state.filter,
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
