//! Presence and manual-override input read from a JSON control file

use crate::controller::Controller;
use relay_rules::{Override, RelayTarget};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

/// How often the control file is re-read
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Contents of the control file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ControlInput {
    /// Presence flag from the presence detector
    #[serde(default)]
    pub home: Option<bool>,
    /// Manual overrides keyed by coil
    #[serde(default)]
    pub overrides: HashMap<RelayTarget, Override>,
}

impl ControlInput {
    /// Apply whatever differs from `previous`.
    ///
    /// Unchanged overrides are not re-applied, so an override the engine
    /// cleared stays cleared until the file asks for it again.
    pub fn apply(&self, previous: &ControlInput, controller: &Controller) {
        if let Some(home) = self.home {
            if previous.home != Some(home) {
                controller.set_home(home);
            }
        }
        for (relay, value) in &self.overrides {
            if previous.overrides.get(relay) != Some(value) {
                controller.set_override(*relay, *value);
            }
        }
    }
}

/// Poll `path` and feed changes into the controller
pub fn spawn_watcher(controller: Arc<Controller>, path: PathBuf) {
    tokio::spawn(async move {
        let mut applied = ControlInput::default();
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        loop {
            interval.tick().await;
            let contents = match fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    tracing::warn!("Failed to read control file {:?}: {}", path, e);
                    continue;
                }
            };
            match serde_json::from_str::<ControlInput>(&contents) {
                Ok(input) if input != applied => {
                    input.apply(&applied, &controller);
                    applied = input;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Failed to parse control file {:?}: {}", path, e),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_rules::config::ControllerConfig;

    #[test]
    fn test_parse_control_input() {
        let input: ControlInput =
            serde_json::from_str(r#"{ "home": true, "overrides": { "coil_b": "off" } }"#).unwrap();
        assert_eq!(input.home, Some(true));
        assert_eq!(input.overrides.get(&RelayTarget::CoilB), Some(&Override::Off));
    }

    #[test]
    fn test_apply_only_changes() {
        let controller = Controller::from_config(&ControllerConfig::default()).unwrap();
        let previous = ControlInput {
            home: Some(false),
            overrides: HashMap::from([(RelayTarget::CoilA, Override::On)]),
        };
        let input = ControlInput {
            home: Some(false),
            overrides: HashMap::from([(RelayTarget::CoilA, Override::On)]),
        };

        // An engine-cleared override is not resurrected by an unchanged file
        input.apply(&previous, &controller);
        let states = controller.tick(0).unwrap();
        assert!(states.iter().all(|(_, state)| *state == relay_rules::State::Off));

        input.apply(&ControlInput::default(), &controller);
        let states = controller.tick(0).unwrap();
        assert!(states.contains(&(RelayTarget::CoilA, relay_rules::State::On)));
    }
}
