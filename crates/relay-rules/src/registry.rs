//! Fixed-capacity storage for configured rules

use crate::context::MAX_RULES;
use crate::error::RuleError;
use crate::model::{RuleType, State};
use crate::rules::Rule;
use crate::timeline::Timeline;
use std::fmt;

pub const MAX_SCHEDULE_RULES: usize = 6;
pub const MAX_PROXIMITY_RULES: usize = 3;
pub const MAX_USAGE_RULES: usize = 3;

/// Ordered rule list for one tick
pub type RuleList<'a> = heapless::Vec<&'a Rule, MAX_RULES>;

/// Reference to a rule slot in a [`RuleRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleHandle {
    kind: RuleType,
    slot: u8,
}

impl RuleHandle {
    #[must_use]
    pub fn kind(&self) -> RuleType {
        self.kind
    }
}

impl fmt::Display for RuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.kind, self.slot)
    }
}

/// Arena of rules with a fixed number of slots per rule type.
///
/// Populated at configuration time; the engine only ever borrows from it.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    schedules: heapless::Vec<Rule, MAX_SCHEDULE_RULES>,
    proximity: heapless::Vec<Rule, MAX_PROXIMITY_RULES>,
    usage: heapless::Vec<Rule, MAX_USAGE_RULES>,
}

impl RuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_schedule(
        &mut self,
        id: u64,
        state: State,
        timeline: Timeline,
    ) -> Result<RuleHandle, RuleError> {
        self.register(Rule::new_schedule(id, state, timeline))
    }

    pub fn auto_home(
        &mut self,
        id: u64,
        state: State,
        timeline: Timeline,
    ) -> Result<RuleHandle, RuleError> {
        self.register(Rule::auto_home(id, state, timeline))
    }

    pub fn auto_away(
        &mut self,
        id: u64,
        state: State,
        timeline: Timeline,
    ) -> Result<RuleHandle, RuleError> {
        self.register(Rule::auto_away(id, state, timeline))
    }

    pub fn usage_limit(
        &mut self,
        id: u64,
        timeline: Timeline,
        max_seconds: u32,
        floor_watts: f32,
    ) -> Result<RuleHandle, RuleError> {
        self.register(Rule::usage_limit(id, timeline, max_seconds, floor_watts))
    }

    /// Store `rule` in a free slot of its type
    pub fn register(&mut self, rule: Rule) -> Result<RuleHandle, RuleError> {
        if rule.id() == 0 {
            tracing::error!("Rejected {:?} rule with identity 0", rule.kind());
            return Err(RuleError::ZeroIdentity);
        }

        let kind = rule.kind();
        let (pool_len, pushed, capacity) = match kind {
            RuleType::Schedule => (
                self.schedules.len(),
                self.schedules.push(rule).is_ok(),
                MAX_SCHEDULE_RULES,
            ),
            RuleType::Proximity => (
                self.proximity.len(),
                self.proximity.push(rule).is_ok(),
                MAX_PROXIMITY_RULES,
            ),
            RuleType::Usage => (
                self.usage.len(),
                self.usage.push(rule).is_ok(),
                MAX_USAGE_RULES,
            ),
        };

        if !pushed {
            tracing::error!("{:?} rule capacity ({}) exhausted", kind, capacity);
            return Err(RuleError::CapacityExhausted { kind, capacity });
        }

        let handle = RuleHandle {
            kind,
            slot: pool_len as u8,
        };
        tracing::debug!("Registered rule {}", handle);
        Ok(handle)
    }

    /// Rule stored under `handle`
    #[must_use]
    pub fn get(&self, handle: RuleHandle) -> Option<&Rule> {
        let slot = usize::from(handle.slot);
        match handle.kind {
            RuleType::Schedule => self.schedules.get(slot),
            RuleType::Proximity => self.proximity.get(slot),
            RuleType::Usage => self.usage.get(slot),
        }
    }

    /// Resolve handles into an ordered rule list for a tick
    pub fn rule_list(&self, handles: &[RuleHandle]) -> Result<RuleList<'_>, RuleError> {
        let mut list = RuleList::new();
        for handle in handles {
            let rule = self
                .get(*handle)
                .ok_or_else(|| RuleError::UnknownHandle(handle.to_string()))?;
            list.push(rule)
                .map_err(|_| RuleError::TooManyRules(MAX_RULES))?;
        }
        Ok(list)
    }

    /// Number of registered rules across all types
    #[must_use]
    pub fn len(&self) -> usize {
        self.schedules.len() + self.proximity.len() + self.usage.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every rule; existing handles become invalid
    pub fn clear(&mut self) {
        self.schedules.clear();
        self.proximity.clear();
        self.usage.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{Days, HOUR};

    fn timeline() -> Timeline {
        Timeline::single(Days::WEEKDAYS, 7 * HOUR, 8 * HOUR)
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = RuleRegistry::new();
        let a = registry.new_schedule(1, State::On, timeline()).unwrap();
        let b = registry.auto_away(2, State::Off, timeline()).unwrap();
        let c = registry.usage_limit(3, timeline(), 600, 2.5).unwrap();

        let list = registry.rule_list(&[c, a, b]).unwrap();
        let ids: Vec<u64> = list.iter().map(|rule| rule.id()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_capacity_exhausted() {
        let mut registry = RuleRegistry::new();
        for id in 1..=MAX_PROXIMITY_RULES as u64 {
            registry.auto_home(id, State::On, timeline()).unwrap();
        }
        let err = registry.auto_home(99, State::On, timeline()).unwrap_err();
        assert!(matches!(
            err,
            RuleError::CapacityExhausted {
                kind: RuleType::Proximity,
                capacity: MAX_PROXIMITY_RULES
            }
        ));
        // Other pools are unaffected
        assert!(registry.new_schedule(100, State::On, timeline()).is_ok());
    }

    #[test]
    fn test_zero_identity_rejected() {
        let mut registry = RuleRegistry::new();
        assert!(matches!(
            registry.new_schedule(0, State::On, timeline()),
            Err(RuleError::ZeroIdentity)
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_handle() {
        let mut registry = RuleRegistry::new();
        let handle = registry.new_schedule(1, State::On, timeline()).unwrap();
        registry.clear();
        assert!(registry.get(handle).is_none());
        assert!(matches!(
            registry.rule_list(&[handle]),
            Err(RuleError::UnknownHandle(_))
        ));
    }
}
