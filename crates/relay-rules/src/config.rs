//! Rule-set configuration stored as JSON

use crate::context::MAX_RULES;
use crate::error::RuleError;
use crate::model::{RelayTarget, State};
use crate::registry::{RuleHandle, RuleRegistry};
use crate::rules::Rule;
use crate::timeline::{Days, Timeline, Window};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tokio::fs;

/// Controller configuration: tick settings plus the ordered rule list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Seconds between ticks
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u32,
    /// Initial presence flag
    #[serde(default = "default_home")]
    pub home: bool,
    /// Constant load reported by the simulated meter, watts
    #[serde(default)]
    pub load_watts: f32,
    /// Rules in precedence order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

fn default_tick_seconds() -> u32 {
    1
}

fn default_home() -> bool {
    true
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_seconds: default_tick_seconds(),
            home: default_home(),
            load_watts: 0.0,
            rules: Vec::new(),
        }
    }
}

/// One configured rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Stable identity, must be non-zero
    pub id: u64,
    /// Human-readable name
    #[serde(default)]
    pub name: Option<String>,
    /// Coil(s) the rule applies to
    #[serde(default)]
    pub target: RelayTarget,
    /// Weekly windows, first match wins
    #[serde(default)]
    pub windows: Vec<WindowConfig>,
    #[serde(flatten)]
    pub kind: RuleKindConfig,
}

/// Rule variant and its parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKindConfig {
    /// Fixed state inside the windows
    Schedule { state: State },
    /// `state` while someone is home, inside the windows
    AutoHome { state: State },
    /// `state` while nobody is home, inside the windows
    AutoAway { state: State },
    /// Usage budget per window occurrence
    UsageLimit { max_seconds: u32, floor_watts: f32 },
}

/// A day/time window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Days of week (0=Sunday, 1=Monday, ..., 6=Saturday)
    /// Empty means every day
    #[serde(default)]
    pub days: Vec<u8>,
    /// Start time in HH:MM format (24-hour)
    pub start: String,
    /// End time in HH:MM format, may be earlier than start to run past midnight
    pub end: String,
}

impl WindowConfig {
    pub fn to_window(&self) -> Result<Window, RuleError> {
        let days = Days::from_day_numbers(&self.days)?;
        Ok(Window::new(
            days,
            parse_time(&self.start)?,
            parse_time(&self.end)?,
        ))
    }
}

impl RuleConfig {
    pub fn timeline(&self) -> Result<Timeline, RuleError> {
        let mut timeline = Timeline::new();
        for window in &self.windows {
            timeline.push(window.to_window()?)?;
        }
        Ok(timeline)
    }

    pub fn to_rule(&self) -> Result<Rule, RuleError> {
        let timeline = self.timeline()?;
        let rule = match self.kind {
            RuleKindConfig::Schedule { state } => Rule::new_schedule(self.id, state, timeline),
            RuleKindConfig::AutoHome { state } => Rule::auto_home(self.id, state, timeline),
            RuleKindConfig::AutoAway { state } => Rule::auto_away(self.id, state, timeline),
            RuleKindConfig::UsageLimit {
                max_seconds,
                floor_watts,
            } => Rule::usage_limit(self.id, timeline, max_seconds, floor_watts),
        };
        Ok(rule.with_target(self.target))
    }

    /// Name for log lines
    #[must_use]
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("rule {}", self.id))
    }
}

impl ControllerConfig {
    pub fn from_json(contents: &str) -> Result<Self, RuleError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Register every configured rule, returning handles in precedence order
    pub fn register(&self, registry: &mut RuleRegistry) -> Result<Vec<RuleHandle>, RuleError> {
        if self.rules.len() > MAX_RULES {
            return Err(RuleError::TooManyRules(MAX_RULES));
        }
        let mut seen = HashSet::with_capacity(self.rules.len());
        if let Some(rule) = self.rules.iter().find(|rule| !seen.insert(rule.id)) {
            tracing::warn!("Rule id {} is configured more than once", rule.id);
            return Err(RuleError::DuplicateIdentity(rule.id));
        }

        let mut handles = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            let handle = registry.register(rule.to_rule()?)?;
            tracing::info!("Registered {} ({})", rule.label(), handle);
            handles.push(handle);
        }
        Ok(handles)
    }
}

/// Parse a time string in HH:MM format into seconds since midnight
fn parse_time(s: &str) -> Result<u32, RuleError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map(|time| time.num_seconds_from_midnight())
        .map_err(|_| RuleError::InvalidTimeFormat(s.to_string()))
}

/// Load the controller configuration from a JSON file
pub async fn load_config(path: &Path) -> ControllerConfig {
    match fs::read_to_string(path).await {
        Ok(contents) => match ControllerConfig::from_json(&contents) {
            Ok(config) => {
                tracing::info!("Loaded {} rules from {:?}", config.rules.len(), path);
                config
            }
            Err(e) => {
                tracing::warn!("Failed to parse rules file {:?}: {}", path, e);
                ControllerConfig::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No rules file found at {:?}, starting with no rules", path);
            ControllerConfig::default()
        }
        Err(e) => {
            tracing::warn!("Failed to read rules file {:?}: {}", path, e);
            ControllerConfig::default()
        }
    }
}
