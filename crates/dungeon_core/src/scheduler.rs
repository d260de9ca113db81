//! The tick scheduler.
//!
//! A priority queue of cancellable actions driving one simulation step.
//! The queue holds plain data (an action value, a priority, a cancel id)
//! rather than callables; the game dispatches each action as it is
//! drained, so the scheduler never needs to reach back into game state.
//!
//! # Re-entrancy
//!
//! Everything here is written to survive actions that mutate the schedule
//! mid-tick:
//!
//! - Two queues exist, "this tick" and "next tick". Draining pops from
//!   the first; repeating actions migrate into the second after running,
//!   and registration during a tick always targets the second. An action
//!   registered mid-tick therefore never runs in the same tick.
//! - Cancellation is lazy. [`Scheduler::unsubscribe`] marks every queued
//!   record carrying the id as invalid; invalid records are discarded
//!   when dequeued, in O(1), rather than removed from the heap eagerly.
//! - The record currently being executed is tracked separately from the
//!   queues, so an action unsubscribing its own id (or the id of a record
//!   executing right now) takes effect immediately: the record is not
//!   re-enqueued.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Priority band for one-shot player actions.
pub const PLAYER_ACTION_PRIORITY: i32 = 0;
/// Priority band for potion-queue and bribe bookkeeping.
pub const POTION_BRIBE_PRIORITY: i32 = 1;
/// Priority band for AI movement, spawning, and logic settling.
pub const AI_PRIORITY: i32 = 2;

/// Identifier used to cancel scheduled actions.
///
/// Multiple records may share an id; cancelling an id invalidates all of
/// them. Entity-owned actions use the entity id so that destroying the
/// entity cancels everything it scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionId {
    /// Action owned by an entity (cancelled on its destruction).
    Entity(EntityId),
    /// The player's one-shot action for this tick.
    PlayerAction,
    /// The per-tick potion queue update.
    PotionQueue,
    /// The global spider spawn task.
    SpiderSpawner,
    /// The per-tick global logic settle.
    LogicUpdates,
}

/// A scheduled record: plain data plus ordering bookkeeping.
#[derive(Debug, Clone)]
struct Record<A> {
    priority: i32,
    /// Monotonic sequence for stable tie-breaking between equal priorities.
    seq: u64,
    /// Identity of this record for lazy invalidation.
    serial: u64,
    id: ActionId,
    once: bool,
    action: A,
}

impl<A> PartialEq for Record<A> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<A> Eq for Record<A> {}

impl<A> Ord for Record<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl<A> PartialOrd for Record<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The currently-executing record's bookkeeping, kept outside the queues
/// so `unsubscribe` can reach it.
#[derive(Debug)]
struct Executing {
    id: ActionId,
    cancelled: bool,
}

/// Priority scheduler of cancellable, re-entrant-safe actions.
///
/// Generic over the action payload so the queue machinery stays testable
/// in isolation; the game instantiates it with its action enum.
#[derive(Debug)]
pub struct Scheduler<A> {
    this_tick: BinaryHeap<Reverse<Record<A>>>,
    next_tick: BinaryHeap<Reverse<Record<A>>>,
    invalidated: HashSet<u64>,
    executing: Option<Executing>,
    pending: Option<Record<A>>,
    in_tick: bool,
    next_seq: u64,
    next_serial: u64,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Scheduler<A> {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            this_tick: BinaryHeap::new(),
            next_tick: BinaryHeap::new(),
            invalidated: HashSet::new(),
            executing: None,
            pending: None,
            in_tick: false,
            next_seq: 0,
            next_serial: 0,
        }
    }

    /// Register a repeating action (e.g. enemy movement).
    ///
    /// If a tick is currently in progress the action only joins the next
    /// tick; otherwise it runs starting from the next `tick()` call.
    pub fn register(&mut self, action: A, priority: i32, id: ActionId) {
        self.push(action, priority, id, false);
    }

    /// Register an action that runs at most once (e.g. player movement).
    pub fn register_once(&mut self, action: A, priority: i32, id: ActionId) {
        self.push(action, priority, id, true);
    }

    fn push(&mut self, action: A, priority: i32, id: ActionId, once: bool) {
        let record = Record {
            priority,
            seq: self.next_seq,
            serial: self.next_serial,
            id,
            once,
            action,
        };
        self.next_seq += 1;
        self.next_serial += 1;
        if self.in_tick {
            self.next_tick.push(Reverse(record));
        } else {
            self.this_tick.push(Reverse(record));
        }
    }

    /// Invalidate every current and future record carrying `id`,
    /// including the one executing right now.
    ///
    /// Records registered *after* this call are unaffected, even with the
    /// same id.
    pub fn unsubscribe(&mut self, id: ActionId) {
        if let Some(executing) = self.executing.as_mut() {
            if executing.id == id {
                executing.cancelled = true;
            }
        }
        for Reverse(record) in self.this_tick.iter().chain(self.next_tick.iter()) {
            if record.id == id {
                let _ = self.invalidated.insert(record.serial);
            }
        }
    }

    /// Mark the start of a tick. Registrations from here on target the
    /// next tick.
    pub(crate) fn begin_tick(&mut self) {
        self.in_tick = true;
    }

    /// Pop the next valid record for this tick and mark it executing.
    ///
    /// Invalid records are discarded on the way. Returns `None` once this
    /// tick's queue is drained. The action is returned by value so the
    /// caller is free to mutate the scheduler while dispatching it.
    pub(crate) fn next_action(&mut self) -> Option<A>
    where
        A: Clone,
    {
        debug_assert!(
            self.pending.is_none(),
            "next_action called with an unfinished action"
        );
        while let Some(Reverse(record)) = self.this_tick.pop() {
            if self.invalidated.remove(&record.serial) {
                continue;
            }
            self.executing = Some(Executing {
                id: record.id,
                cancelled: false,
            });
            let action = record.action.clone();
            self.pending = Some(record);
            return Some(action);
        }
        None
    }

    /// Finish the record returned by the last `next_action` call,
    /// migrating it into the next tick unless it was one-shot or was
    /// cancelled during its own execution.
    pub(crate) fn finish_action(&mut self) {
        let executing = self.executing.take();
        if let Some(record) = self.pending.take() {
            let cancelled = executing.is_some_and(|e| e.cancelled);
            if !cancelled && !record.once {
                self.next_tick.push(Reverse(record));
            }
        }
    }

    /// Mark the end of a tick: the next-tick queue becomes this tick's.
    pub(crate) fn end_tick(&mut self) {
        self.in_tick = false;
        std::mem::swap(&mut self.this_tick, &mut self.next_tick);
        self.next_tick.clear();
    }

    /// Whether a tick is currently being drained.
    #[must_use]
    pub fn is_in_tick(&self) -> bool {
        self.in_tick
    }

    /// Number of records queued for the upcoming tick (valid or not).
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.this_tick.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Drain one tick, collecting executed actions in order. `on_run` may
    /// mutate the scheduler mid-tick, mimicking re-entrant game actions.
    fn run_tick<A: Clone>(
        scheduler: &mut Scheduler<A>,
        mut on_run: impl FnMut(&mut Scheduler<A>, &A),
    ) -> Vec<A> {
        let mut executed = Vec::new();
        scheduler.begin_tick();
        while let Some(action) = scheduler.next_action() {
            on_run(scheduler, &action);
            executed.push(action);
            scheduler.finish_action();
        }
        scheduler.end_tick();
        executed
    }

    #[test]
    fn test_actions_run_in_priority_order() {
        let mut scheduler = Scheduler::new();
        scheduler.register("ai", AI_PRIORITY, ActionId::Entity(1));
        scheduler.register_once("player", PLAYER_ACTION_PRIORITY, ActionId::PlayerAction);
        scheduler.register("potion", POTION_BRIBE_PRIORITY, ActionId::PotionQueue);

        let executed = run_tick(&mut scheduler, |_, _| {});
        assert_eq!(executed, vec!["player", "potion", "ai"]);
    }

    #[test]
    fn test_equal_priority_ties_break_stably() {
        let mut scheduler = Scheduler::new();
        scheduler.register("first", AI_PRIORITY, ActionId::Entity(1));
        scheduler.register("second", AI_PRIORITY, ActionId::Entity(2));

        let executed = run_tick(&mut scheduler, |_, _| {});
        assert_eq!(executed, vec!["first", "second"]);
    }

    #[test]
    fn test_repeating_actions_survive_across_ticks() {
        let mut scheduler = Scheduler::new();
        scheduler.register("move", AI_PRIORITY, ActionId::Entity(1));
        scheduler.register_once("once", PLAYER_ACTION_PRIORITY, ActionId::PlayerAction);

        assert_eq!(run_tick(&mut scheduler, |_, _| {}), vec!["once", "move"]);
        assert_eq!(run_tick(&mut scheduler, |_, _| {}), vec!["move"]);
    }

    #[test]
    fn test_mid_tick_registration_defers_to_next_tick() {
        let mut scheduler = Scheduler::new();
        scheduler.register("outer", AI_PRIORITY, ActionId::Entity(1));

        let executed = run_tick(&mut scheduler, |s, action| {
            if *action == "outer" {
                // Registered at the highest priority, yet it must wait.
                s.register_once("inner", PLAYER_ACTION_PRIORITY, ActionId::Entity(2));
            }
        });
        assert_eq!(executed, vec!["outer"]);

        let executed = run_tick(&mut scheduler, |_, _| {});
        assert_eq!(executed, vec!["inner", "outer"]);
    }

    #[test]
    fn test_unsubscribe_invalidates_all_records_with_id() {
        let mut scheduler = Scheduler::new();
        scheduler.register("a", AI_PRIORITY, ActionId::Entity(7));
        scheduler.register("b", AI_PRIORITY, ActionId::Entity(7));
        scheduler.register("keep", AI_PRIORITY, ActionId::Entity(8));

        scheduler.unsubscribe(ActionId::Entity(7));

        let executed = run_tick(&mut scheduler, |_, _| {});
        assert_eq!(executed, vec!["keep"]);
    }

    #[test]
    fn test_self_cancellation_takes_effect_immediately() {
        let mut scheduler = Scheduler::new();
        scheduler.register("self_cancel", AI_PRIORITY, ActionId::Entity(1));

        let executed = run_tick(&mut scheduler, |s, action| {
            if *action == "self_cancel" {
                s.unsubscribe(ActionId::Entity(1));
            }
        });
        assert_eq!(executed, vec!["self_cancel"]);

        // Not re-enqueued: the next tick runs nothing.
        assert_eq!(run_tick(&mut scheduler, |_, _| {}), Vec::<&str>::new());
    }

    #[test]
    fn test_unsubscribe_during_tick_hits_later_record_same_tick() {
        let mut scheduler = Scheduler::new();
        scheduler.register("killer", PLAYER_ACTION_PRIORITY, ActionId::Entity(1));
        scheduler.register("victim", AI_PRIORITY, ActionId::Entity(2));

        let executed = run_tick(&mut scheduler, |s, action| {
            if *action == "killer" {
                s.unsubscribe(ActionId::Entity(2));
            }
        });
        assert_eq!(executed, vec!["killer"]);
    }

    #[test]
    fn test_registration_after_unsubscribe_is_unaffected() {
        let mut scheduler = Scheduler::new();
        scheduler.register("old", AI_PRIORITY, ActionId::Entity(1));
        scheduler.unsubscribe(ActionId::Entity(1));
        scheduler.register("new", AI_PRIORITY, ActionId::Entity(1));

        let executed = run_tick(&mut scheduler, |_, _| {});
        assert_eq!(executed, vec!["new"]);
    }

    proptest! {
        /// A record registered during a tick never executes within that
        /// same tick, regardless of priority.
        #[test]
        fn prop_mid_tick_registrations_never_run_same_tick(
            priorities in proptest::collection::vec(0i32..5, 1..8),
            inner_priority in 0i32..5,
        ) {
            let mut scheduler = Scheduler::new();
            for (i, priority) in priorities.iter().enumerate() {
                scheduler.register(("outer", i), *priority, ActionId::Entity(i as u64));
            }

            let mut registered_inner = false;
            let executed = run_tick(&mut scheduler, |s, _| {
                if !registered_inner {
                    registered_inner = true;
                    s.register_once(("inner", usize::MAX), inner_priority, ActionId::PlayerAction);
                }
            });

            prop_assert!(executed.iter().all(|(tag, _)| *tag == "outer"));
            prop_assert_eq!(executed.len(), priorities.len());
        }

        /// Priorities are respected regardless of registration order.
        #[test]
        fn prop_execution_is_sorted_by_priority(
            priorities in proptest::collection::vec(0i32..10, 1..16),
        ) {
            let mut scheduler = Scheduler::new();
            for (i, priority) in priorities.iter().enumerate() {
                scheduler.register(*priority, *priority, ActionId::Entity(i as u64));
            }

            let executed = run_tick(&mut scheduler, |_, _| {});
            let mut sorted = executed.clone();
            sorted.sort_unstable();
            prop_assert_eq!(executed, sorted);
        }
    }
}
