//! Events emitted by the arbitration engine

use crate::context::Context;
use crate::model::{Preference, RelayTarget, RuleResult, State};
use tokio::sync::broadcast;

/// Why the relay changed state, or why a rule was reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEventKind {
    /// A rule turned the output on
    Activated,
    /// A rule turned the output off
    Deactivated,
    /// The fallback of a rule removed while operative drove the change
    Deleted,
    /// A manual override drove the change
    ManualOverride,
    /// A rule's strong opinion lost to the operative rule
    RuleOverride,
}

/// Payload of a relay state change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateChange {
    /// New output state
    pub state: State,
    /// Operative rule, 0 for none
    pub rule_id: u64,
    pub result: RuleResult,
    pub rule_deleted: bool,
    /// A manual override decided the output
    pub overridden: bool,
}

impl StateChange {
    #[must_use]
    pub fn kind(&self) -> RuleEventKind {
        if self.overridden {
            RuleEventKind::ManualOverride
        } else if self.rule_deleted {
            RuleEventKind::Deleted
        } else if self.state == State::On {
            RuleEventKind::Activated
        } else {
            RuleEventKind::Deactivated
        }
    }
}

/// Payload of a blocked-rule report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedRule {
    pub rule_id: u64,
    pub preference: Preference,
    /// Operative rule that pre-empted it, 0 for none
    pub blocking_rule_id: u64,
}

/// Receiver of engine notifications. Calls are fire-and-forget.
pub trait EventSink {
    fn on_state_change(&self, ctx: &Context, change: &StateChange);

    fn on_rule_blocked(&self, ctx: &Context, blocked: &BlockedRule);
}

/// Engine notification tagged with the relay and tick it came from
#[derive(Debug, Clone, PartialEq)]
pub enum RuleEvent {
    StateChanged {
        relay: RelayTarget,
        now: u32,
        change: StateChange,
    },
    RuleBlocked {
        relay: RelayTarget,
        now: u32,
        blocked: BlockedRule,
    },
}

impl RuleEvent {
    #[must_use]
    pub fn kind(&self) -> RuleEventKind {
        match self {
            Self::StateChanged { change, .. } => change.kind(),
            Self::RuleBlocked { .. } => RuleEventKind::RuleOverride,
        }
    }
}

/// Sink that logs every notification through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_state_change(&self, ctx: &Context, change: &StateChange) {
        tracing::info!(
            "Relay {:?} -> {:?} ({:?}, rule {}, preference {:?})",
            ctx.relay(),
            change.state,
            change.kind(),
            change.rule_id,
            change.result.preference
        );
    }

    fn on_rule_blocked(&self, ctx: &Context, blocked: &BlockedRule) {
        tracing::info!(
            "Relay {:?}: rule {} ({:?}) blocked by rule {}",
            ctx.relay(),
            blocked.rule_id,
            blocked.preference,
            blocked.blocking_rule_id
        );
    }
}

/// Sink that publishes notifications on a broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    event_tx: broadcast::Sender<RuleEvent>,
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(64)
    }
}

impl BroadcastSink {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self { event_tx }
    }

    /// Subscribe to engine events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RuleEvent> {
        self.event_tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn on_state_change(&self, ctx: &Context, change: &StateChange) {
        let _ = self.event_tx.send(RuleEvent::StateChanged {
            relay: ctx.relay(),
            now: ctx.now(),
            change: *change,
        });
    }

    fn on_rule_blocked(&self, ctx: &Context, blocked: &BlockedRule) {
        let _ = self.event_tx.send(RuleEvent::RuleBlocked {
            relay: ctx.relay(),
            now: ctx.now(),
            blocked: *blocked,
        });
    }
}
