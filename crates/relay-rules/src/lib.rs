//! Rule arbitration engine for relay controllers
//!
//! Reconciles schedule, proximity and usage-limit rules plus an optional
//! manual override into one ON/OFF decision per relay, once per tick.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod registry;
pub mod rules;
pub mod timeline;

pub use context::{Context, ResultCache, MAX_RULES};
pub use engine::{run_rules, THRASH_GUARD_SECONDS};
pub use error::RuleError;
pub use events::{BroadcastSink, EventSink, RuleEvent, RuleEventKind, TracingSink};
pub use model::*;
pub use registry::{RuleHandle, RuleList, RuleRegistry};
pub use rules::{PowerMeter, Rule};
pub use timeline::{match_window, Days, Timeline, Window, WindowMatch};
