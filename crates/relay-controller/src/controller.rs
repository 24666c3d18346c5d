//! Per-coil rule evaluation driven by the tick loop

use dashmap::DashMap;
use relay_rules::config::ControllerConfig;
use relay_rules::{
    run_rules, BroadcastSink, Context, Override, PowerMeter, RelayTarget, RuleError, RuleEvent,
    RuleHandle, RuleRegistry, State,
};
use tokio::sync::broadcast;

/// Coils driven by this controller
pub const COILS: [RelayTarget; 2] = [RelayTarget::CoilA, RelayTarget::CoilB];

/// Meter reporting the same load on every coil
#[derive(Debug, Clone, Copy)]
pub struct FixedMeter {
    pub watts: f32,
}

impl PowerMeter for FixedMeter {
    fn active_power(&self, _relay: RelayTarget) -> f32 {
        self.watts
    }
}

/// Owns the configured rules and one context per coil
pub struct Controller {
    registry: RuleRegistry,
    handles: Vec<RuleHandle>,
    contexts: DashMap<RelayTarget, Context>,
    meter: FixedMeter,
    sink: BroadcastSink,
}

impl Controller {
    /// Register the configured rules and create fresh coil contexts
    pub fn from_config(config: &ControllerConfig) -> Result<Self, RuleError> {
        let mut registry = RuleRegistry::new();
        let handles = config.register(&mut registry)?;

        let contexts = DashMap::new();
        for relay in COILS {
            let mut ctx = Context::new(relay).with_tick_unit(config.tick_seconds);
            ctx.set_home(config.home);
            contexts.insert(relay, ctx);
        }

        Ok(Self {
            registry,
            handles,
            contexts,
            meter: FixedMeter {
                watts: config.load_watts,
            },
            sink: BroadcastSink::default(),
        })
    }

    /// Subscribe to engine events from every coil
    pub fn subscribe(&self) -> broadcast::Receiver<RuleEvent> {
        self.sink.subscribe()
    }

    /// Update the presence flag on every coil
    pub fn set_home(&self, home: bool) {
        for mut entry in self.contexts.iter_mut() {
            entry.value_mut().set_home(home);
        }
        tracing::info!("Presence set to {}", if home { "home" } else { "away" });
    }

    /// Manually force one coil
    pub fn set_override(&self, relay: RelayTarget, value: Override) {
        if let Some(mut ctx) = self.contexts.get_mut(&relay) {
            ctx.value_mut().set_override(value);
            tracing::info!("Manual override on {:?}: {:?}", relay, value);
        } else {
            tracing::warn!("No coil {:?} to override", relay);
        }
    }

    pub fn state(&self, relay: RelayTarget) -> Option<State> {
        self.contexts.get(&relay).map(|ctx| ctx.state())
    }

    /// Run one tick at engine time `now` on every coil
    pub fn tick(&self, now: u32) -> Result<Vec<(RelayTarget, State)>, RuleError> {
        let rules = self.registry.rule_list(&self.handles)?;
        let mut states = Vec::with_capacity(COILS.len());
        for relay in COILS {
            let Some(mut ctx) = self.contexts.get_mut(&relay) else {
                continue;
            };
            let ctx = ctx.value_mut();
            ctx.set_now(now);
            let state = run_rules(ctx, &rules, &self.meter, &self.sink);
            states.push((relay, state));
        }
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_rules::timeline::{DAY, HOUR};
    use relay_rules::{RuleEventKind, THRASH_GUARD_SECONDS};

    const MONDAY: u32 = DAY;

    fn config() -> ControllerConfig {
        ControllerConfig::from_json(
            r#"{
                "home": false,
                "load_watts": 40.0,
                "rules": [
                    {
                        "type": "schedule",
                        "id": 1,
                        "target": "coil_a",
                        "state": "on",
                        "windows": [{ "start": "18:00", "end": "23:00" }]
                    },
                    {
                        "type": "auto_home",
                        "id": 2,
                        "target": "coil_b",
                        "state": "on",
                        "windows": [{ "start": "00:00", "end": "00:00" }]
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    fn state_of(states: &[(RelayTarget, State)], relay: RelayTarget) -> State {
        states
            .iter()
            .find(|(r, _)| *r == relay)
            .map(|(_, s)| *s)
            .unwrap()
    }

    #[test]
    fn test_coils_follow_their_rules() {
        let controller = Controller::from_config(&config()).unwrap();

        let states = controller.tick(MONDAY + 19 * HOUR).unwrap();
        assert_eq!(state_of(&states, RelayTarget::CoilA), State::On);
        assert_eq!(state_of(&states, RelayTarget::CoilB), State::Off);

        controller.set_home(true);
        let states = controller.tick(MONDAY + 19 * HOUR + THRASH_GUARD_SECONDS).unwrap();
        assert_eq!(state_of(&states, RelayTarget::CoilB), State::On);
        assert_eq!(controller.state(RelayTarget::CoilA), Some(State::On));
    }

    #[test]
    fn test_override_reaches_engine() {
        let controller = Controller::from_config(&config()).unwrap();
        let mut rx = controller.subscribe();

        controller.tick(MONDAY + 12 * HOUR).unwrap();
        controller.set_override(RelayTarget::CoilA, Override::On);
        let states = controller.tick(MONDAY + 12 * HOUR + 120).unwrap();
        assert_eq!(state_of(&states, RelayTarget::CoilA), State::On);

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind(), RuleEventKind::ManualOverride);
    }
}
