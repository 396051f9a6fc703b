use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

macro_rules! uuid_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

uuid_newtype!(SceneUuid);
uuid_newtype!(SourceUuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneItemId(pub i64);

/// Filter kind whose `opacity` control doubles as a visibility toggle.
pub const CHROMA_KEY_FILTER_KIND: &str = "chroma_key_filter_v2";
/// Opacity strictly above this value counts as "active".
pub const ACTIVE_OPACITY_THRESHOLD: f64 = 0.9;
/// OBS leaves default-valued settings out of `filterSettings`.
pub const DEFAULT_CHROMA_KEY_OPACITY: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRef {
    pub scene_name: String,
    pub scene_uuid: SceneUuid,
}

/// One layer in a scene as reported by `GetSceneItemList`.
///
/// Only the fields used for resolution are typed; everything else OBS sends
/// is kept verbatim in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItem {
    pub scene_item_id: SceneItemId,
    pub source_name: String,
    pub source_uuid: SourceUuid,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromaKeySettings {
    #[serde(default = "default_chroma_key_opacity")]
    pub opacity: f64,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

fn default_chroma_key_opacity() -> f64 {
    DEFAULT_CHROMA_KEY_OPACITY
}

impl ChromaKeySettings {
    pub fn is_active(&self) -> bool {
        self.opacity > ACTIVE_OPACITY_THRESHOLD
    }
}

/// Settings payload of a source filter.
///
/// Only the chroma-key shape is interpreted; other kinds pass through as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSettings {
    ChromaKey(ChromaKeySettings),
    Opaque(Value),
}

impl FilterSettings {
    pub fn to_value(&self) -> Value {
        match self {
            FilterSettings::ChromaKey(settings) => {
                let mut map = settings.other.clone();
                map.insert("opacity".to_string(), Value::from(settings.opacity));
                Value::Object(map)
            }
            FilterSettings::Opaque(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSourceFilter", into = "RawSourceFilter")]
pub struct SourceFilter {
    pub name: String,
    pub kind: String,
    pub enabled: bool,
    pub index: u32,
    pub settings: FilterSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceFilter {
    filter_name: String,
    filter_kind: String,
    #[serde(default = "default_enabled")]
    filter_enabled: bool,
    #[serde(default)]
    filter_index: u32,
    #[serde(default)]
    filter_settings: Value,
}

fn default_enabled() -> bool {
    true
}

impl TryFrom<RawSourceFilter> for SourceFilter {
    type Error = ProtocolError;

    fn try_from(raw: RawSourceFilter) -> Result<Self, Self::Error> {
        let settings = if raw.filter_kind == CHROMA_KEY_FILTER_KIND {
            let value = match raw.filter_settings {
                Value::Null => Value::Object(Map::new()),
                other => other,
            };
            let parsed = serde_json::from_value::<ChromaKeySettings>(value).map_err(|source| {
                ProtocolError::InvalidPayload {
                    what: "chroma key filter settings",
                    source,
                }
            })?;
            FilterSettings::ChromaKey(parsed)
        } else {
            FilterSettings::Opaque(raw.filter_settings)
        };

        Ok(Self {
            name: raw.filter_name,
            kind: raw.filter_kind,
            enabled: raw.filter_enabled,
            index: raw.filter_index,
            settings,
        })
    }
}

impl From<SourceFilter> for RawSourceFilter {
    fn from(filter: SourceFilter) -> Self {
        Self {
            filter_settings: filter.settings.to_value(),
            filter_name: filter.name,
            filter_kind: filter.kind,
            filter_enabled: filter.enabled,
            filter_index: filter.index,
        }
    }
}
