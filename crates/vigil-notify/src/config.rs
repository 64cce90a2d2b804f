use serde::{Deserialize, Serialize};

/// Configuration for one notification component instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Instance name used in logs and in the status document.
    #[serde(default = "default_component_name")]
    pub component_name: String,
    /// Capacity of the check-event bus the host builds for this component.
    /// Ingestion that falls this far behind starts dropping (and logging)
    /// the oldest events.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            component_name: default_component_name(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_component_name() -> String {
    "notification".to_string()
}

fn default_event_buffer() -> usize {
    256
}

impl NotifierConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}
