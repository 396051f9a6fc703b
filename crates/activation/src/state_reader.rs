use shared::domain::{ChromaKeySettings, FilterSettings, SourceFilter};

pub const ACTIVE_OPACITY: f64 = 1.0;
pub const INACTIVE_OPACITY: f64 = 0.0;

/// The chroma-key filter whose opacity encodes an object's visibility.
#[derive(Debug, Clone, PartialEq)]
pub struct ChromaKeyFilter {
    pub filter_name: String,
    pub settings: ChromaKeySettings,
}

impl ChromaKeyFilter {
    pub fn opacity(&self) -> f64 {
        self.settings.opacity
    }

    pub fn is_active(&self) -> bool {
        self.settings.is_active()
    }

    pub fn set_active(&mut self, active: bool) {
        self.settings.opacity = if active {
            ACTIVE_OPACITY
        } else {
            INACTIVE_OPACITY
        };
    }

    pub fn settings_value(&self) -> serde_json::Value {
        FilterSettings::ChromaKey(self.settings.clone()).to_value()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivationState {
    pub is_active: bool,
    pub filter: Option<ChromaKeyFilter>,
}

/// Derive activation from the first chroma-key filter in the stack.
///
/// Without one the object is reported inactive and cannot be toggled.
pub fn read_state(filters: &[SourceFilter]) -> ActivationState {
    let filter = filters.iter().find_map(|filter| match &filter.settings {
        FilterSettings::ChromaKey(settings) => Some(ChromaKeyFilter {
            filter_name: filter.name.clone(),
            settings: settings.clone(),
        }),
        FilterSettings::Opaque(_) => None,
    });

    ActivationState {
        is_active: filter.as_ref().is_some_and(ChromaKeyFilter::is_active),
        filter,
    }
}

#[cfg(test)]
#[path = "tests/state_reader_tests.rs"]
mod tests;
