//! Data models shared by the rule variants and the arbitration engine

use serde::{Deserialize, Serialize};

/// A rule's opinion for one tick.
///
/// Ordered by strength rather than by discriminant: `None` is weaker than
/// both weak preferences, which are weaker than both strong ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preference {
    /// No opinion this tick
    #[default]
    None,
    StrongOff,
    StrongOn,
    WeakOff,
    WeakOn,
}

impl Preference {
    #[must_use]
    pub fn is_strong(self) -> bool {
        matches!(self, Self::StrongOn | Self::StrongOff)
    }

    #[must_use]
    pub fn is_weak(self) -> bool {
        matches!(self, Self::WeakOn | Self::WeakOff)
    }

    /// Output this preference asks for, if any
    #[must_use]
    pub fn desired_state(self) -> Option<State> {
        match self {
            Self::StrongOn | Self::WeakOn => Some(State::On),
            Self::StrongOff | Self::WeakOff => Some(State::Off),
            Self::None => None,
        }
    }
}

/// Relay output state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Off,
    On,
}

/// Manual override of the relay output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Override {
    #[default]
    None,
    Off,
    On,
}

/// Which relay coil a context controls, or which coils a rule applies to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayTarget {
    CoilA,
    CoilB,
    #[default]
    Both,
}

impl RelayTarget {
    /// Whether a rule with this target applies to the given relay
    #[must_use]
    pub fn applies_to(self, relay: RelayTarget) -> bool {
        self == Self::Both || self == relay
    }
}

/// Rule variant tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Schedule,
    Proximity,
    Usage,
}

/// Presence direction a proximity rule reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityDirection {
    /// Active preference applies while someone is home
    Home,
    /// Active preference applies while nobody is home
    Away,
}

/// Output of one rule evaluation for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    /// Current desired output strength/direction
    pub preference: Preference,
    /// Fallback adopted if the rule is removed while operative
    pub deleted_preference: Preference,
    /// Index of the active window, -1 if none
    pub period_index: i8,
    /// Active window matched across the Saturday to Sunday rollover
    pub week_barrier: bool,
    /// Strong opinion must suppress a manual override
    pub disable_override: bool,
    /// Any active manual override should be cleared
    pub clear_override: bool,
    /// This tick counts toward accumulated usage
    pub log_usage: bool,
}

impl Default for RuleResult {
    fn default() -> Self {
        Self {
            preference: Preference::None,
            deleted_preference: Preference::None,
            period_index: -1,
            week_barrier: false,
            disable_override: false,
            clear_override: false,
            log_usage: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_classes() {
        assert!(Preference::StrongOn.is_strong());
        assert!(Preference::StrongOff.is_strong());
        assert!(Preference::WeakOn.is_weak());
        assert!(Preference::WeakOff.is_weak());
        assert!(!Preference::None.is_strong());
        assert!(!Preference::None.is_weak());
    }

    #[test]
    fn test_target_applies() {
        assert!(RelayTarget::Both.applies_to(RelayTarget::CoilA));
        assert!(RelayTarget::CoilB.applies_to(RelayTarget::CoilB));
        assert!(!RelayTarget::CoilA.applies_to(RelayTarget::CoilB));
    }

    #[test]
    fn test_default_result_has_no_period() {
        let result = RuleResult::default();
        assert_eq!(result.preference, Preference::None);
        assert_eq!(result.period_index, -1);
    }
}
