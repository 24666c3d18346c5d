//! Rule variants and their per-tick decision functions

use crate::context::Context;
use crate::model::{Preference, ProximityDirection, RelayTarget, RuleResult, RuleType, State};
use crate::timeline::{match_window, Timeline};

/// Source of instantaneous load readings for a relay
pub trait PowerMeter {
    /// Active power through the relay, in watts
    fn active_power(&self, relay: RelayTarget) -> f32;
}

impl<F> PowerMeter for F
where
    F: Fn(RelayTarget) -> f32,
{
    fn active_power(&self, relay: RelayTarget) -> f32 {
        self(relay)
    }
}

/// Active/inactive preferences for a rule that drives the relay to `state`
fn preferences_for(state: State) -> (Preference, Preference) {
    match state {
        State::On => (Preference::StrongOn, Preference::WeakOff),
        State::Off => (Preference::StrongOff, Preference::WeakOn),
    }
}

/// Fields every rule carries
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCore {
    /// Caller-assigned stable identity, never 0
    pub id: u64,
    /// Coil(s) the rule applies to
    pub target: RelayTarget,
    pub timeline: Timeline,
}

/// Drives the relay to a fixed state while one of its windows is active
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRule {
    pub core: RuleCore,
    pub state: State,
    pub active_pref: Preference,
    pub inactive_pref: Preference,
}

impl ScheduleRule {
    #[must_use]
    pub fn new(id: u64, state: State, timeline: Timeline) -> Self {
        let (active_pref, inactive_pref) = preferences_for(state);
        Self {
            core: RuleCore {
                id,
                target: RelayTarget::Both,
                timeline,
            },
            state,
            active_pref,
            inactive_pref,
        }
    }

    fn run(&self, now: u32, previous: RuleResult) -> RuleResult {
        let window = match_window(&self.core.timeline, now);
        let preference = if window.is_active() {
            self.active_pref
        } else {
            self.inactive_pref
        };

        RuleResult {
            preference,
            deleted_preference: self.inactive_pref,
            period_index: window.period_index,
            week_barrier: window.week_barrier,
            disable_override: false,
            // A real window transition (not a week rollover artifact) ends a manual override
            clear_override: window.period_index != previous.period_index
                && !previous.week_barrier,
            log_usage: false,
        }
    }
}

/// Drives the relay depending on presence while one of its windows is active
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityRule {
    pub core: RuleCore,
    pub direction: ProximityDirection,
    pub state: State,
    pub active_pref: Preference,
    pub inactive_pref: Preference,
}

impl ProximityRule {
    #[must_use]
    pub fn new(id: u64, direction: ProximityDirection, state: State, timeline: Timeline) -> Self {
        let (active_pref, inactive_pref) = preferences_for(state);
        Self {
            core: RuleCore {
                id,
                target: RelayTarget::Both,
                timeline,
            },
            direction,
            state,
            active_pref,
            inactive_pref,
        }
    }

    fn run(&self, ctx: &Context, now: u32, previous: RuleResult) -> RuleResult {
        let window = match_window(&self.core.timeline, now);
        let mut result = RuleResult {
            preference: self.inactive_pref,
            deleted_preference: self.inactive_pref,
            period_index: window.period_index,
            week_barrier: window.week_barrier,
            ..RuleResult::default()
        };

        if !window.is_active() {
            return result;
        }

        let engaged = match self.direction {
            ProximityDirection::Home => ctx.is_home(),
            ProximityDirection::Away => !ctx.is_home(),
        };
        if engaged {
            result.preference = self.active_pref;
        }
        result.clear_override = result.preference != previous.preference;
        result
    }
}

/// Cuts the relay off once accumulated usage inside a window reaches a limit
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRule {
    pub core: RuleCore,
    /// Usage budget per window occurrence, seconds
    pub maximum_time: u32,
    /// Load at or above which the device counts as in use, watts
    pub usage_floor: f32,
}

impl UsageRule {
    #[must_use]
    pub fn new(id: u64, timeline: Timeline, maximum_time: u32, usage_floor: f32) -> Self {
        Self {
            core: RuleCore {
                id,
                target: RelayTarget::Both,
                timeline,
            },
            maximum_time,
            usage_floor,
        }
    }

    fn run(
        &self,
        ctx: &mut Context,
        now: u32,
        previous: RuleResult,
        meter: &dyn PowerMeter,
    ) -> RuleResult {
        let window = match_window(&self.core.timeline, now);
        let mut result = RuleResult {
            preference: Preference::WeakOn,
            // Fail open if the rule goes away
            deleted_preference: Preference::WeakOn,
            period_index: window.period_index,
            week_barrier: window.week_barrier,
            ..RuleResult::default()
        };

        if previous.period_index != window.period_index && !previous.week_barrier {
            ctx.clear_time_used();
        }

        if !window.is_active() {
            // Outside the measured period: no restriction, fresh budget next time
            ctx.clear_time_used();
            return result;
        }

        if ctx.total_time_used() >= self.maximum_time {
            result.preference = Preference::StrongOff;
            result.disable_override = true;
        }

        let watts = meter.active_power(ctx.relay());
        if watts >= self.usage_floor {
            result.log_usage = true;
        }
        result
    }
}

/// A configured rule. The variant set is closed.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Schedule(ScheduleRule),
    Proximity(ProximityRule),
    Usage(UsageRule),
}

impl Rule {
    /// Schedule rule driving the relay to `state` inside its windows
    #[must_use]
    pub fn new_schedule(id: u64, state: State, timeline: Timeline) -> Self {
        Self::Schedule(ScheduleRule::new(id, state, timeline))
    }

    /// Proximity rule that engages while someone is home
    #[must_use]
    pub fn auto_home(id: u64, state: State, timeline: Timeline) -> Self {
        Self::Proximity(ProximityRule::new(
            id,
            ProximityDirection::Home,
            state,
            timeline,
        ))
    }

    /// Proximity rule that engages while nobody is home
    #[must_use]
    pub fn auto_away(id: u64, state: State, timeline: Timeline) -> Self {
        Self::Proximity(ProximityRule::new(
            id,
            ProximityDirection::Away,
            state,
            timeline,
        ))
    }

    /// Usage limit of `max_seconds` per window, counting while load >= `floor_watts`
    #[must_use]
    pub fn usage_limit(id: u64, timeline: Timeline, max_seconds: u32, floor_watts: f32) -> Self {
        Self::Usage(UsageRule::new(id, timeline, max_seconds, floor_watts))
    }

    /// Restrict the rule to one coil
    #[must_use]
    pub fn with_target(mut self, target: RelayTarget) -> Self {
        self.core_mut().target = target;
        self
    }

    fn core(&self) -> &RuleCore {
        match self {
            Self::Schedule(rule) => &rule.core,
            Self::Proximity(rule) => &rule.core,
            Self::Usage(rule) => &rule.core,
        }
    }

    fn core_mut(&mut self) -> &mut RuleCore {
        match self {
            Self::Schedule(rule) => &mut rule.core,
            Self::Proximity(rule) => &mut rule.core,
            Self::Usage(rule) => &mut rule.core,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.core().id
    }

    #[must_use]
    pub fn kind(&self) -> RuleType {
        match self {
            Self::Schedule(_) => RuleType::Schedule,
            Self::Proximity(_) => RuleType::Proximity,
            Self::Usage(_) => RuleType::Usage,
        }
    }

    #[must_use]
    pub fn target(&self) -> RelayTarget {
        self.core().target
    }

    #[must_use]
    pub fn timeline(&self) -> &Timeline {
        &self.core().timeline
    }

    /// Evaluate the rule for `now`. `previous` is this rule's own last result.
    pub fn run(
        &self,
        ctx: &mut Context,
        now: u32,
        previous: RuleResult,
        meter: &dyn PowerMeter,
    ) -> RuleResult {
        match self {
            Self::Schedule(rule) => rule.run(now, previous),
            Self::Proximity(rule) => rule.run(ctx, now, previous),
            Self::Usage(rule) => rule.run(ctx, now, previous, meter),
        }
    }
}
