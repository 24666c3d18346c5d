//! Per-relay controller state and the identity-keyed result cache

use crate::model::{Override, RelayTarget, RuleResult, State};
use crate::rules::Rule;

/// Maximum number of rules evaluated per tick
pub const MAX_RULES: usize = 8;

/// One slot of the result cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CacheEntry {
    /// Identity of the rule that produced `result`, 0 for an empty slot
    rule_id: u64,
    result: RuleResult,
}

/// Last tick's per-rule results, indexed by rule-list position and tagged
/// with the identity of the rule that occupied each position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCache {
    entries: [CacheEntry; MAX_RULES],
}

impl ResultCache {
    /// Result stored for list position `index`
    #[must_use]
    pub fn previous_result(&self, index: usize) -> RuleResult {
        self.entries
            .get(index)
            .map(|entry| entry.result)
            .unwrap_or_default()
    }

    /// Slot holding `rule_id`, if any
    #[must_use]
    pub fn find_index_by_identity(&self, rule_id: u64) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.rule_id == rule_id)
    }

    /// Whether slot `i` already belongs to the rule at list position `i`
    fn is_aligned_with(&self, rules: &[&Rule]) -> bool {
        self.entries.iter().enumerate().all(|(i, entry)| {
            let expected = rules.get(i).map_or(0, |rule| rule.id());
            entry.rule_id == expected
        })
    }

    /// Map this cache onto a new rule list by identity.
    ///
    /// An unchanged list keeps its results as they are. Otherwise every rule
    /// found by identity carries over its preferences and override flags with
    /// `period_index` reset to -1, and rules with no match start from a zero
    /// result.
    #[must_use]
    pub fn realign(&self, rules: &[&Rule]) -> ResultCache {
        if self.is_aligned_with(rules) {
            return *self;
        }

        let mut realigned = ResultCache::default();
        for (slot, rule) in realigned.entries.iter_mut().zip(rules) {
            slot.rule_id = rule.id();
            if let Some(previous) = self.find_index_by_identity(rule.id()) {
                let last = self.entries[previous].result;
                slot.result = RuleResult {
                    preference: last.preference,
                    deleted_preference: last.deleted_preference,
                    disable_override: last.disable_override,
                    clear_override: last.clear_override,
                    ..RuleResult::default()
                };
            }
        }
        tracing::debug!("Result cache realigned to {} rules", rules.len().min(MAX_RULES));
        realigned
    }

    /// Cache recording `results` for the rules at the same positions
    pub(crate) fn record(rules: &[&Rule], results: &[RuleResult; MAX_RULES]) -> ResultCache {
        let mut cache = ResultCache::default();
        for ((slot, rule), result) in cache.entries.iter_mut().zip(rules).zip(results) {
            slot.rule_id = rule.id();
            slot.result = *result;
        }
        cache
    }
}

/// State of one relay, carried from tick to tick
#[derive(Debug, Clone)]
pub struct Context {
    pub(crate) now: u32,
    pub(crate) state: State,
    pub(crate) override_state: Override,
    pub(crate) relay: RelayTarget,

    /// Identity of last tick's operative rule, 0 for none
    pub(crate) rule_id: u64,
    pub(crate) rule_result: RuleResult,

    pub(crate) home: bool,

    pub(crate) last_pref_change: Option<u32>,
    pub(crate) total_used: u32,
    pub(crate) tick_unit: u32,

    pub(crate) cache: ResultCache,

    /// An oversized rule list was already reported
    pub(crate) rule_list_truncated: bool,
}

impl Context {
    /// Fresh context for `relay`: output off, no override, nobody home
    #[must_use]
    pub fn new(relay: RelayTarget) -> Self {
        Self {
            now: 0,
            state: State::Off,
            override_state: Override::None,
            relay,
            rule_id: 0,
            rule_result: RuleResult::default(),
            home: false,
            last_pref_change: None,
            total_used: 0,
            tick_unit: 1,
            cache: ResultCache::default(),
            rule_list_truncated: false,
        }
    }

    /// Seconds added to the usage counter on each tick that logs usage
    #[must_use]
    pub fn with_tick_unit(mut self, seconds: u32) -> Self {
        self.tick_unit = seconds.max(1);
        self
    }

    #[must_use]
    pub fn now(&self) -> u32 {
        self.now
    }

    /// Set the time the next tick evaluates at
    pub fn set_now(&mut self, now: u32) {
        self.now = now;
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn relay(&self) -> RelayTarget {
        self.relay
    }

    #[must_use]
    pub fn override_state(&self) -> Override {
        self.override_state
    }

    /// Force the output manually until a rule transition clears it
    pub fn set_override(&mut self, value: Override) {
        self.override_state = value;
    }

    #[must_use]
    pub fn is_home(&self) -> bool {
        self.home
    }

    pub fn set_home(&mut self, home: bool) {
        self.home = home;
    }

    /// Accumulated usage, seconds
    #[must_use]
    pub fn total_time_used(&self) -> u32 {
        self.total_used
    }

    pub fn clear_time_used(&mut self) {
        self.total_used = 0;
    }

    pub fn add_time_used(&mut self, seconds: u32) {
        self.total_used = self.total_used.saturating_add(seconds);
    }

    /// Identity of the operative rule after the last tick, 0 for none
    #[must_use]
    pub fn operative_rule_id(&self) -> u64 {
        self.rule_id
    }

    #[must_use]
    pub fn operative_result(&self) -> RuleResult {
        self.rule_result
    }

    #[must_use]
    pub fn last_pref_change(&self) -> Option<u32> {
        self.last_pref_change
    }

    /// Last tick's result for rule-list position `index`
    #[must_use]
    pub fn previous_result(&self, index: usize) -> RuleResult {
        self.cache.previous_result(index)
    }

    /// Position last tick's rule list gave to `rule_id`
    #[must_use]
    pub fn find_index_by_identity(&self, rule_id: u64) -> Option<usize> {
        self.cache.find_index_by_identity(rule_id)
    }

    #[must_use]
    pub fn result_cache(&self) -> &ResultCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Preference;
    use crate::timeline::{Days, Timeline, HOUR};

    fn schedule(id: u64) -> Rule {
        Rule::new_schedule(id, State::On, Timeline::single(Days::EVERYDAY, 8 * HOUR, 9 * HOUR))
    }

    fn strong_in_period() -> RuleResult {
        RuleResult {
            preference: Preference::StrongOn,
            deleted_preference: Preference::WeakOff,
            period_index: 0,
            week_barrier: true,
            clear_override: true,
            ..RuleResult::default()
        }
    }

    #[test]
    fn test_unchanged_list_keeps_results() {
        let a = schedule(10);
        let b = schedule(20);
        let rules = [&a, &b];
        let mut results = [RuleResult::default(); MAX_RULES];
        results[0] = strong_in_period();
        let cache = ResultCache::record(&rules, &results);

        let realigned = cache.realign(&rules);
        assert_eq!(realigned, cache);
        assert_eq!(realigned.previous_result(0).period_index, 0);
    }

    #[test]
    fn test_moved_rule_follows_identity() {
        let a = schedule(10);
        let b = schedule(20);
        let mut results = [RuleResult::default(); MAX_RULES];
        results[0] = strong_in_period();
        let cache = ResultCache::record(&[&a, &b], &results);

        let realigned = cache.realign(&[&b, &a]);
        let moved = realigned.previous_result(1);
        assert_eq!(moved.preference, Preference::StrongOn);
        assert_eq!(moved.deleted_preference, Preference::WeakOff);
        assert!(moved.clear_override);
        assert_eq!(moved.period_index, -1);
        assert!(!moved.week_barrier);
        assert_eq!(realigned.previous_result(0).preference, Preference::None);
        assert_eq!(realigned.find_index_by_identity(10), Some(1));
    }

    #[test]
    fn test_replacement_does_not_inherit() {
        let a = schedule(10);
        let b = schedule(30);
        let mut results = [RuleResult::default(); MAX_RULES];
        results[0] = strong_in_period();
        let cache = ResultCache::record(&[&a], &results);

        let realigned = cache.realign(&[&b]);
        assert_eq!(realigned.previous_result(0), RuleResult::default());
        assert_eq!(realigned.find_index_by_identity(10), None);
        assert_eq!(realigned.find_index_by_identity(30), Some(0));
    }

    #[test]
    fn test_previous_result_out_of_range() {
        let cache = ResultCache::default();
        assert_eq!(cache.previous_result(MAX_RULES + 3), RuleResult::default());
    }

    #[test]
    fn test_usage_counter() {
        let mut ctx = Context::new(RelayTarget::CoilA);
        ctx.add_time_used(30);
        ctx.add_time_used(u32::MAX);
        assert_eq!(ctx.total_time_used(), u32::MAX);
        ctx.clear_time_used();
        assert_eq!(ctx.total_time_used(), 0);
    }
}
