use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    domain::{SceneItem, SceneRef, SceneUuid, SourceFilter, SourceUuid},
    error::ProtocolError,
};

pub const RPC_VERSION: u32 = 1;
pub const REQUEST_STATUS_SUCCESS: u32 = 100;

/// Bitmask values for `Identify.eventSubscriptions`.
pub mod event_subscription {
    pub const SCENES: u32 = 1 << 2;
}

/// `executionType` for a batch whose requests run one after another.
pub const BATCH_SERIAL_REALTIME: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Hello = 0,
    Identify = 1,
    Identified = 2,
    Reidentify = 3,
    Event = 5,
    Request = 6,
    RequestResponse = 7,
    RequestBatch = 8,
    RequestBatchResponse = 9,
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => OpCode::Hello,
            1 => OpCode::Identify,
            2 => OpCode::Identified,
            3 => OpCode::Reidentify,
            5 => OpCode::Event,
            6 => OpCode::Request,
            7 => OpCode::RequestResponse,
            8 => OpCode::RequestBatch,
            9 => OpCode::RequestBatchResponse,
            other => return Err(ProtocolError::UnknownOpCode(other)),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub obs_web_socket_version: String,
    pub rpc_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    pub event_subscriptions: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_type: String,
    #[serde(default)]
    pub event_intent: u32,
    #[serde(default)]
    pub event_data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub request_type: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub request_data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl RequestStatus {
    pub fn success() -> Self {
        Self {
            result: true,
            code: REQUEST_STATUS_SUCCESS,
            comment: None,
        }
    }

    pub fn failure(code: u32, comment: impl Into<String>) -> Self {
        Self {
            result: false,
            code,
            comment: Some(comment.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    #[serde(default)]
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default)]
    pub response_data: Value,
}

impl RequestResponse {
    pub fn is_success(&self) -> bool {
        self.request_status.result
    }

    /// Decode `responseData` into the typed payload of this request.
    pub fn data<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let value = match &self.response_data {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(value).map_err(|source| ProtocolError::InvalidPayload {
            what: "response data",
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBatch {
    pub request_id: String,
    pub halt_on_failure: bool,
    pub execution_type: i32,
    pub requests: Vec<Request>,
}

impl RequestBatch {
    /// Serial batch that keeps going past failed requests.
    pub fn new(request_id: String, requests: Vec<Request>) -> Self {
        Self {
            request_id,
            halt_on_failure: false,
            execution_type: BATCH_SERIAL_REALTIME,
            requests,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBatchResponse {
    pub request_id: String,
    pub results: Vec<RequestResponse>,
}

/// One obs-websocket frame, `{"op": <code>, "d": <payload>}`.
#[derive(Debug, Clone)]
pub enum ObsMessage {
    Hello(Hello),
    Identify(Identify),
    Identified(Identified),
    Event(Event),
    Request(Request),
    RequestResponse(RequestResponse),
    RequestBatch(RequestBatch),
    RequestBatchResponse(RequestBatchResponse),
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    op: u8,
    #[serde(default)]
    d: Value,
}

impl ObsMessage {
    pub fn op_code(&self) -> OpCode {
        match self {
            ObsMessage::Hello(_) => OpCode::Hello,
            ObsMessage::Identify(_) => OpCode::Identify,
            ObsMessage::Identified(_) => OpCode::Identified,
            ObsMessage::Event(_) => OpCode::Event,
            ObsMessage::Request(_) => OpCode::Request,
            ObsMessage::RequestResponse(_) => OpCode::RequestResponse,
            ObsMessage::RequestBatch(_) => OpCode::RequestBatch,
            ObsMessage::RequestBatchResponse(_) => OpCode::RequestBatchResponse,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text)?;
        let d = envelope.d;
        Ok(match OpCode::try_from(envelope.op)? {
            OpCode::Hello => ObsMessage::Hello(serde_json::from_value(d)?),
            OpCode::Identify => ObsMessage::Identify(serde_json::from_value(d)?),
            OpCode::Identified => ObsMessage::Identified(serde_json::from_value(d)?),
            OpCode::Event => ObsMessage::Event(serde_json::from_value(d)?),
            OpCode::Request => ObsMessage::Request(serde_json::from_value(d)?),
            OpCode::RequestResponse => ObsMessage::RequestResponse(serde_json::from_value(d)?),
            OpCode::RequestBatch => ObsMessage::RequestBatch(serde_json::from_value(d)?),
            OpCode::RequestBatchResponse => {
                ObsMessage::RequestBatchResponse(serde_json::from_value(d)?)
            }
            OpCode::Reidentify => return Err(ProtocolError::NotSendable(OpCode::Reidentify as u8)),
        })
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        let d = match self {
            ObsMessage::Hello(v) => serde_json::to_value(v)?,
            ObsMessage::Identify(v) => serde_json::to_value(v)?,
            ObsMessage::Identified(v) => serde_json::to_value(v)?,
            ObsMessage::Event(v) => serde_json::to_value(v)?,
            ObsMessage::Request(v) => serde_json::to_value(v)?,
            ObsMessage::RequestResponse(v) => serde_json::to_value(v)?,
            ObsMessage::RequestBatch(v) => serde_json::to_value(v)?,
            ObsMessage::RequestBatchResponse(v) => serde_json::to_value(v)?,
        };
        Ok(serde_json::to_string(&Envelope {
            op: self.op_code() as u8,
            d,
        })?)
    }
}

/// Typed form of the requests this bridge issues.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneRequest {
    GetCurrentProgramScene,
    GetSceneItemList {
        scene_uuid: SceneUuid,
    },
    GetSourceFilterList {
        source_uuid: SourceUuid,
    },
    SetSourceFilterSettings {
        source_uuid: SourceUuid,
        filter_name: String,
        filter_settings: Value,
        overlay: bool,
    },
}

impl SceneRequest {
    pub fn request_type(&self) -> &'static str {
        match self {
            SceneRequest::GetCurrentProgramScene => "GetCurrentProgramScene",
            SceneRequest::GetSceneItemList { .. } => "GetSceneItemList",
            SceneRequest::GetSourceFilterList { .. } => "GetSourceFilterList",
            SceneRequest::SetSourceFilterSettings { .. } => "SetSourceFilterSettings",
        }
    }

    pub fn request_data(&self) -> Value {
        match self {
            SceneRequest::GetCurrentProgramScene => Value::Null,
            SceneRequest::GetSceneItemList { scene_uuid } => json!({ "sceneUuid": scene_uuid }),
            SceneRequest::GetSourceFilterList { source_uuid } => {
                json!({ "sourceUuid": source_uuid })
            }
            SceneRequest::SetSourceFilterSettings {
                source_uuid,
                filter_name,
                filter_settings,
                overlay,
            } => json!({
                "sourceUuid": source_uuid,
                "filterName": filter_name,
                "filterSettings": filter_settings,
                "overlay": overlay,
            }),
        }
    }

    pub fn into_request(self, request_id: String) -> Request {
        Request {
            request_type: self.request_type().to_string(),
            request_id,
            request_data: self.request_data(),
        }
    }
}

/// `GetCurrentProgramScene` response data.
///
/// Servers before 5.3 only send the deprecated `currentProgramScene*` keys.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentProgramScene {
    #[serde(default)]
    pub scene_name: Option<String>,
    #[serde(default)]
    pub scene_uuid: Option<SceneUuid>,
    #[serde(default)]
    pub current_program_scene_name: Option<String>,
    #[serde(default)]
    pub current_program_scene_uuid: Option<SceneUuid>,
}

impl CurrentProgramScene {
    pub fn into_scene_ref(self) -> Option<SceneRef> {
        let scene_uuid = self.scene_uuid.or(self.current_program_scene_uuid)?;
        let scene_name = self
            .scene_name
            .or(self.current_program_scene_name)
            .unwrap_or_default();
        Some(SceneRef {
            scene_name,
            scene_uuid,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItemList {
    pub scene_items: Vec<SceneItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceFilterList {
    pub filters: Vec<SourceFilter>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    CurrentProgramSceneChanged(SceneRef),
    Other { event_type: String, event_data: Value },
}

impl TryFrom<Event> for SceneEvent {
    type Error = ProtocolError;

    fn try_from(event: Event) -> Result<Self, Self::Error> {
        match event.event_type.as_str() {
            "CurrentProgramSceneChanged" => {
                let scene = serde_json::from_value::<SceneRef>(event.event_data).map_err(
                    |source| ProtocolError::InvalidPayload {
                        what: "CurrentProgramSceneChanged",
                        source,
                    },
                )?;
                Ok(SceneEvent::CurrentProgramSceneChanged(scene))
            }
            _ => Ok(SceneEvent::Other {
                event_type: event.event_type,
                event_data: event.event_data,
            }),
        }
    }
}
