use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use async_trait::async_trait;
use scene_client::{ensure_success, SceneClientError, SceneTransport};
use serde_json::{json, Value};
use shared::{
    domain::{FilterSettings, SceneItem, SceneRef, SceneUuid, SourceFilter, SourceUuid},
    protocol::{RequestResponse, RequestStatus, SceneEvent, SceneRequest},
};
use tokio::sync::{broadcast, Mutex};

pub(crate) fn scene(name: &str, uuid: &str) -> SceneRef {
    SceneRef {
        scene_name: name.into(),
        scene_uuid: SceneUuid(uuid.into()),
    }
}

pub(crate) fn source_uuid(id: i64) -> SourceUuid {
    SourceUuid(format!("src-{id}"))
}

pub(crate) fn scene_item(id: i64, name: &str) -> SceneItem {
    serde_json::from_value(json!({
        "sceneItemId": id,
        "sourceName": name,
        "sourceUuid": source_uuid(id),
        "inputKind": "dshow_input",
        "sceneItemEnabled": true
    }))
    .expect("scene item")
}

pub(crate) fn chroma_key(name: &str, opacity: f64) -> SourceFilter {
    serde_json::from_value(json!({
        "filterName": name,
        "filterKind": "chroma_key_filter_v2",
        "filterEnabled": true,
        "filterIndex": 0,
        "filterSettings": { "opacity": opacity, "similarity": 400 }
    }))
    .expect("chroma key filter")
}

pub(crate) fn opaque_filter(name: &str, kind: &str) -> SourceFilter {
    serde_json::from_value(json!({
        "filterName": name,
        "filterKind": kind,
        "filterEnabled": true,
        "filterIndex": 0,
        "filterSettings": { "opacity": 1.0 }
    }))
    .expect("filter")
}

/// In-memory scene graph that records every call made against it.
pub(crate) struct FakeScene {
    pub current: SceneRef,
    pub items: Vec<SceneItem>,
    pub filters: Mutex<HashMap<SourceUuid, Vec<SourceFilter>>>,
    pub failing_writes: HashSet<usize>,
    pub failing_reads: HashSet<SourceUuid>,
    pub batch_delay: Option<Duration>,
    pub dropped_write_results: usize,
    pub calls: Mutex<Vec<SceneRequest>>,
    pub batches: Mutex<Vec<Vec<SceneRequest>>>,
    events: broadcast::Sender<SceneEvent>,
}

impl FakeScene {
    pub(crate) fn new(current: SceneRef) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            current,
            items: Vec::new(),
            filters: Mutex::new(HashMap::new()),
            failing_writes: HashSet::new(),
            failing_reads: HashSet::new(),
            batch_delay: None,
            dropped_write_results: 0,
            calls: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            events,
        }
    }

    pub(crate) fn with_object(mut self, id: i64, name: &str, filters: Vec<SourceFilter>) -> Self {
        self.items.push(scene_item(id, name));
        self.filters.get_mut().insert(source_uuid(id), filters);
        self
    }

    pub(crate) fn failing_write_at(mut self, index: usize) -> Self {
        self.failing_writes.insert(index);
        self
    }

    pub(crate) fn failing_read_for(mut self, id: i64) -> Self {
        self.failing_reads.insert(source_uuid(id));
        self
    }

    pub(crate) fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = Some(delay);
        self
    }

    /// Answer write batches with `count` fewer results than requests.
    pub(crate) fn dropping_write_results(mut self, count: usize) -> Self {
        self.dropped_write_results = count;
        self
    }

    pub(crate) fn emit(&self, event: SceneEvent) {
        let _ = self.events.send(event);
    }

    /// Opacity of the first chroma-key filter on the item called `name`.
    pub(crate) async fn opacity_of(&self, name: &str) -> Option<f64> {
        let item = self.items.iter().find(|item| item.source_name == name)?;
        let filters = self.filters.lock().await;
        filters
            .get(&item.source_uuid)?
            .iter()
            .find_map(|filter| match &filter.settings {
                FilterSettings::ChromaKey(settings) => Some(settings.opacity),
                FilterSettings::Opaque(_) => None,
            })
    }

    pub(crate) async fn write_batches(&self) -> Vec<Vec<SceneRequest>> {
        self.batches
            .lock()
            .await
            .iter()
            .filter(|batch| {
                batch
                    .iter()
                    .all(|request| matches!(request, SceneRequest::SetSourceFilterSettings { .. }))
            })
            .cloned()
            .collect()
    }

    async fn respond_in_batch(&self, index: usize, request: &SceneRequest) -> (RequestStatus, Value) {
        match request {
            SceneRequest::GetSourceFilterList { source_uuid } => {
                if self.failing_reads.contains(source_uuid) {
                    return (
                        RequestStatus::failure(600, "No source was found"),
                        Value::Null,
                    );
                }
                let filters = self.filters.lock().await;
                let list = filters.get(source_uuid).cloned().unwrap_or_default();
                (RequestStatus::success(), json!({ "filters": list }))
            }
            SceneRequest::SetSourceFilterSettings {
                source_uuid,
                filter_name,
                filter_settings,
                ..
            } => {
                if self.failing_writes.contains(&index) {
                    return (RequestStatus::failure(600, "write rejected"), Value::Null);
                }
                let mut filters = self.filters.lock().await;
                let target = filters
                    .get_mut(source_uuid)
                    .and_then(|list| list.iter_mut().find(|f| &f.name == filter_name));
                match target {
                    Some(SourceFilter {
                        settings: FilterSettings::ChromaKey(settings),
                        ..
                    }) => {
                        if let Some(opacity) = filter_settings["opacity"].as_f64() {
                            settings.opacity = opacity;
                        }
                        (RequestStatus::success(), Value::Null)
                    }
                    _ => (RequestStatus::failure(600, "No filter was found"), Value::Null),
                }
            }
            _ => (RequestStatus::failure(204, "unsupported in batch"), Value::Null),
        }
    }
}

#[async_trait]
impl SceneTransport for FakeScene {
    async fn call(&self, request: SceneRequest) -> Result<RequestResponse, SceneClientError> {
        self.calls.lock().await.push(request.clone());
        let (status, data) = match &request {
            SceneRequest::GetCurrentProgramScene => (
                RequestStatus::success(),
                json!({
                    "sceneName": self.current.scene_name,
                    "sceneUuid": self.current.scene_uuid,
                }),
            ),
            SceneRequest::GetSceneItemList { scene_uuid } => {
                let items: &[SceneItem] = if *scene_uuid == self.current.scene_uuid {
                    &self.items
                } else {
                    &[]
                };
                (RequestStatus::success(), json!({ "sceneItems": items }))
            }
            _ => (RequestStatus::failure(204, "unsupported"), Value::Null),
        };
        ensure_success(RequestResponse {
            request_type: request.request_type().to_string(),
            request_id: "call".into(),
            request_status: status,
            response_data: data,
        })
    }

    async fn call_batch(
        &self,
        requests: Vec<SceneRequest>,
    ) -> Result<Vec<RequestResponse>, SceneClientError> {
        self.batches.lock().await.push(requests.clone());
        if let Some(delay) = self.batch_delay {
            tokio::time::sleep(delay).await;
        }
        let mut results = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            let (status, data) = self.respond_in_batch(index, request).await;
            results.push(RequestResponse {
                request_type: request.request_type().to_string(),
                request_id: index.to_string(),
                request_status: status,
                response_data: data,
            });
        }
        let is_write = requests
            .iter()
            .all(|request| matches!(request, SceneRequest::SetSourceFilterSettings { .. }));
        if is_write {
            results.truncate(results.len().saturating_sub(self.dropped_write_results));
        }
        Ok(results)
    }

    fn subscribe_events(&self) -> broadcast::Receiver<SceneEvent> {
        self.events.subscribe()
    }
}
