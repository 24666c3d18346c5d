//! Rule arbitration
//!
//! [`run_rules`] is the single per-tick entry point. It evaluates every rule
//! that applies to the context's relay, picks the operative rule, applies
//! manual-override semantics and the thrash guard, and commits the outcome
//! to the context.
//!
//! Operative rule selection:
//! 1. the first rule (in list order) with a strong preference;
//! 2. otherwise the last rule with a weak preference, stopping early at the
//!    previously operative rule if its strong preference was demoted to weak;
//! 3. otherwise, if the previously operative rule was strong and has been
//!    removed from the list, its deleted-preference fallback.

use crate::context::{Context, ResultCache, MAX_RULES};
use crate::events::{BlockedRule, EventSink, StateChange};
use crate::model::{Override, RuleResult, State};
use crate::rules::{PowerMeter, Rule};

/// Minimum spacing between accepted preference changes, seconds
pub const THRASH_GUARD_SECONDS: u32 = 60;

/// Evaluate `rules` at `ctx.now()` and update the relay state.
///
/// Returns the output state after the tick. A tick suppressed by the thrash
/// guard leaves the context untouched and returns the current state.
pub fn run_rules(
    ctx: &mut Context,
    rules: &[&Rule],
    meter: &dyn PowerMeter,
    sink: &dyn EventSink,
) -> State {
    let rules = if rules.len() > MAX_RULES {
        if !ctx.rule_list_truncated {
            tracing::warn!(
                "Rule list has {} rules, only the first {} are evaluated",
                rules.len(),
                MAX_RULES
            );
            ctx.rule_list_truncated = true;
        }
        &rules[..MAX_RULES]
    } else {
        ctx.rule_list_truncated = false;
        rules
    };

    let now = ctx.now;
    let cache = ctx.cache.realign(rules);
    let usage_before = ctx.total_used;

    // Run all applicable rules, keeping results in list order
    let mut results = [RuleResult::default(); MAX_RULES];
    let mut operative_index = None;
    let mut log_usage = false;
    for (i, rule) in rules.iter().enumerate() {
        if !rule.target().applies_to(ctx.relay) {
            continue;
        }
        let result = rule.run(ctx, now, cache.previous_result(i), meter);
        if result.preference.is_strong() && operative_index.is_none() {
            operative_index = Some(i);
        }
        results[i] = result;
        log_usage |= result.log_usage;
    }

    if operative_index.is_none() {
        operative_index = select_weak(ctx, rules, &results);
    }

    let mut operative_id = 0;
    let mut operative = RuleResult::default();
    let mut rule_deleted = false;
    if let Some(i) = operative_index {
        operative_id = rules[i].id();
        operative = results[i];
    } else if let Some(fallback) = deleted_fallback(ctx, &cache) {
        tracing::debug!(
            "Operative rule {} was removed while strong, falling back to {:?}",
            ctx.rule_id,
            fallback.preference
        );
        operative_id = ctx.rule_id;
        operative = fallback;
        rule_deleted = true;
    }

    // Don't flip preferences more than once per guard period
    if operative.preference != ctx.rule_result.preference {
        if let Some(last) = ctx.last_pref_change {
            if now.abs_diff(last) < THRASH_GUARD_SECONDS {
                tracing::debug!(
                    "Preference change {:?} -> {:?} on {:?} suppressed ({}s since last change)",
                    ctx.rule_result.preference,
                    operative.preference,
                    ctx.relay,
                    now.abs_diff(last)
                );
                ctx.total_used = usage_before;
                return ctx.state;
            }
        }
    }

    clear_override_if_needed(ctx, operative_id, &operative);

    let (new_state, overridden) = decide_output(ctx, operative_id, &operative);
    if new_state != ctx.state {
        ctx.state = new_state;
        sink.on_state_change(
            ctx,
            &StateChange {
                state: new_state,
                rule_id: operative_id,
                result: operative,
                rule_deleted,
                overridden,
            },
        );
    }

    if operative.preference != ctx.rule_result.preference {
        ctx.last_pref_change = Some(now);
    }
    ctx.rule_id = operative_id;
    ctx.rule_result = operative;

    report_blocked_rules(ctx, rules, &results, &cache, operative_id, &operative, sink);

    ctx.cache = ResultCache::record(rules, &results);
    if log_usage {
        ctx.add_time_used(ctx.tick_unit);
    }
    ctx.state
}

/// Last rule with a weak preference, or a demoted operative rule
fn select_weak(
    ctx: &Context,
    rules: &[&Rule],
    results: &[RuleResult; MAX_RULES],
) -> Option<usize> {
    let mut selected = None;
    for (i, (rule, result)) in rules.iter().zip(results).enumerate() {
        if !result.preference.is_weak() {
            continue;
        }
        selected = Some(i);
        if ctx.rule_result.preference.is_strong() && ctx.rule_id == rule.id() {
            // Last tick's strong rule went weak; keep reporting it
            break;
        }
    }
    selected
}

/// Fallback result of an operative rule deleted while it was strong
fn deleted_fallback(ctx: &Context, cache: &ResultCache) -> Option<RuleResult> {
    if ctx.rule_id == 0
        || !ctx.rule_result.preference.is_strong()
        || cache.find_index_by_identity(ctx.rule_id).is_some()
    {
        return None;
    }
    Some(RuleResult {
        preference: ctx.rule_result.deleted_preference,
        ..ctx.rule_result
    })
}

fn clear_override_if_needed(ctx: &mut Context, operative_id: u64, operative: &RuleResult) {
    if ctx.override_state == Override::None {
        return;
    }
    if ctx.rule_id == 0 && !operative.preference.is_strong() {
        return;
    }

    let clear = ctx.rule_id == 0
        || ctx.rule_id != operative_id
        || operative.preference != ctx.rule_result.preference
        || operative.clear_override;
    if clear {
        tracing::debug!(
            "Clearing manual override {:?} on {:?} (rule {} -> {})",
            ctx.override_state,
            ctx.relay,
            ctx.rule_id,
            operative_id
        );
        ctx.override_state = Override::None;
    }
}

/// New output state, and whether the manual override decided it
fn decide_output(ctx: &Context, operative_id: u64, operative: &RuleResult) -> (State, bool) {
    let override_wins = operative_id == 0
        || !operative.disable_override
        || operative.preference.is_weak();

    match ctx.override_state {
        Override::On if override_wins => (State::On, true),
        Override::Off if override_wins => (State::Off, true),
        _ => (
            operative.preference.desired_state().unwrap_or(ctx.state),
            false,
        ),
    }
}

/// Report rules that just went strong but lost to the operative rule
fn report_blocked_rules(
    ctx: &Context,
    rules: &[&Rule],
    results: &[RuleResult; MAX_RULES],
    previous: &ResultCache,
    operative_id: u64,
    operative: &RuleResult,
    sink: &dyn EventSink,
) {
    for (i, (rule, result)) in rules.iter().zip(results).enumerate() {
        let prev = previous.previous_result(i).preference;
        if result.preference != prev
            && result.preference != operative.preference
            && result.preference.is_strong()
            && prev.is_weak()
        {
            sink.on_rule_blocked(
                ctx,
                &BlockedRule {
                    rule_id: rule.id(),
                    preference: result.preference,
                    blocking_rule_id: operative_id,
                },
            );
        }
    }
}
