//! Action registry and bitset-based legal action sets.
//!
//! Domain actions are opaque to the solver. A simulator registers the subset
//! it wants searched (at most 32) in an `ActionRegistry` once at startup; from
//! then on legal moves travel around as a 32-bit `ActionSet` where bit *i*
//! means "the action in registry slot *i* is legal".
//!
//! ## Example
//!
//! ```
//! use craft_mcts::core::{ActionRegistry, ActionSet};
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! enum Move { Synth, Touch, Mend }
//!
//! let registry = ActionRegistry::new(&[Move::Synth, Move::Touch, Move::Mend]).unwrap();
//!
//! let mut set = ActionSet::new();
//! assert!(set.add(&registry, Move::Mend));
//! assert!(set.add(&registry, Move::Synth));
//! assert!(!set.add(&registry, Move::Synth));
//!
//! assert_eq!(set.len(), 2);
//! assert_eq!(set.element_at(&registry, 0), Move::Synth);
//! assert_eq!(set.element_at(&registry, 1), Move::Mend);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU32, Ordering};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::error::{SolverError, SolverResult};
use super::rng::SolverRng;
use crate::mcts::intrinsics::nth_bit_set;

/// Maximum number of actions a registry (and therefore an `ActionSet`) can hold.
pub const MAX_ACTIONS: usize = 32;

/// Marker trait for domain action types.
///
/// Blanket-implemented for every small copyable enum-like type.
pub trait ActionKind: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> ActionKind for T where T: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Immutable mapping between domain actions and bitset slots.
///
/// Slots follow registration order. Built once; lookups of actions that were
/// never registered are errors (or panics on the `ActionSet` hot path), never
/// silently ignored.
#[derive(Clone, Debug)]
pub struct ActionRegistry<A: ActionKind> {
    actions: Vec<A>,
    slots: FxHashMap<A, u8>,
}

impl<A: ActionKind> ActionRegistry<A> {
    /// Build a registry from an ordered list of actions.
    ///
    /// Fails if more than `MAX_ACTIONS` are given or an action repeats.
    pub fn new(actions: &[A]) -> SolverResult<Self> {
        if actions.len() > MAX_ACTIONS {
            return Err(SolverError::TooManyActions {
                count: actions.len(),
                max: MAX_ACTIONS,
            });
        }

        let mut slots = FxHashMap::default();
        for (slot, &action) in actions.iter().enumerate() {
            if slots.insert(action, slot as u8).is_some() {
                return Err(SolverError::DuplicateAction(format!("{:?}", action)));
            }
        }

        Ok(Self {
            actions: actions.to_vec(),
            slots,
        })
    }

    /// Slot of a registered action.
    pub fn slot(&self, action: A) -> SolverResult<u8> {
        self.slots
            .get(&action)
            .copied()
            .ok_or_else(|| SolverError::UnregisteredAction(format!("{:?}", action)))
    }

    /// Single-bit mask for an action.
    ///
    /// Panics if the action is not registered.
    #[inline]
    #[must_use]
    pub fn mask(&self, action: A) -> u32 {
        match self.slots.get(&action) {
            Some(&slot) => 1u32 << slot,
            None => panic!("action {:?} is not registered", action),
        }
    }

    /// Action stored in a slot, if any.
    #[inline]
    #[must_use]
    pub fn action_at(&self, slot: usize) -> Option<A> {
        self.actions.get(slot).copied()
    }

    /// Check if an action is registered.
    #[must_use]
    pub fn contains(&self, action: A) -> bool {
        self.slots.contains_key(&action)
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterate over registered actions in slot order.
    pub fn iter(&self) -> impl Iterator<Item = A> + '_ {
        self.actions.iter().copied()
    }

    /// A set containing every registered action.
    #[must_use]
    pub fn full_set(&self) -> ActionSet {
        let bits = if self.actions.len() == MAX_ACTIONS {
            u32::MAX
        } else {
            (1u32 << self.actions.len()) - 1
        };
        ActionSet(bits)
    }
}

/// Fixed-capacity set of registered actions.
///
/// A plain `Copy` bitmask. Every operation takes the registry that gives the
/// bits meaning.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionSet(u32);

impl ActionSet {
    /// Create an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Create a set from raw slot bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw slot bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Add an action. Returns true if it was not already present.
    #[inline]
    pub fn add<A: ActionKind>(&mut self, registry: &ActionRegistry<A>, action: A) -> bool {
        let mask = registry.mask(action);
        let old = self.0;
        self.0 |= mask;
        old & mask == 0
    }

    /// Remove an action. Returns true if it was present.
    #[inline]
    pub fn remove<A: ActionKind>(&mut self, registry: &ActionRegistry<A>, action: A) -> bool {
        let mask = registry.mask(action);
        let old = self.0;
        self.0 &= !mask;
        old & mask != 0
    }

    /// Check if an action is present.
    #[inline]
    #[must_use]
    pub fn has<A: ActionKind>(self, registry: &ActionRegistry<A>, action: A) -> bool {
        self.0 & registry.mask(action) != 0
    }

    /// Number of actions present.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Check if no action is present.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Action at rank `index` in ascending slot order.
    ///
    /// Panics unless `index < self.len()`.
    #[inline]
    #[must_use]
    pub fn element_at<A: ActionKind>(self, registry: &ActionRegistry<A>, index: usize) -> A {
        match self.try_element_at(registry, index) {
            Ok(action) => action,
            Err(err) => panic!("{}", err),
        }
    }

    /// Fallible form of `element_at`.
    pub fn try_element_at<A: ActionKind>(
        self,
        registry: &ActionRegistry<A>,
        index: usize,
    ) -> SolverResult<A> {
        nth_bit_set(self.0, index)
            .and_then(|slot| registry.action_at(slot as usize))
            .ok_or(SolverError::IndexOutOfRange {
                index,
                count: self.len(),
            })
    }

    /// Lowest-ranked action, if any.
    #[must_use]
    pub fn first<A: ActionKind>(self, registry: &ActionRegistry<A>) -> Option<A> {
        if self.is_empty() {
            None
        } else {
            registry.action_at(self.0.trailing_zeros() as usize)
        }
    }

    /// Pick a present action without removing it.
    ///
    /// Uniform in random mode, rank 0 in deterministic mode.
    #[inline]
    pub fn select_random<A: ActionKind>(
        self,
        registry: &ActionRegistry<A>,
        rng: &mut SolverRng,
    ) -> Option<A> {
        if self.is_empty() {
            return None;
        }
        let index = rng.pick_index(self.len());
        Some(self.element_at(registry, index))
    }

    /// Pick and remove a present action. Returns `None` on an empty set.
    #[inline]
    pub fn pop_random<A: ActionKind>(
        &mut self,
        registry: &ActionRegistry<A>,
        rng: &mut SolverRng,
    ) -> Option<A> {
        let action = self.select_random(registry, rng)?;
        self.remove(registry, action);
        Some(action)
    }

    /// Iterate over present actions in ascending slot order.
    pub fn iter<A: ActionKind>(self, registry: &ActionRegistry<A>) -> impl Iterator<Item = A> + '_ {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let slot = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            registry.action_at(slot)
        })
    }
}

impl fmt::Debug for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActionSet({:#034b})", self.0)
    }
}

/// An `ActionSet` that can be shared between search workers.
///
/// Pops go through a compare-and-swap loop: a failed exchange means another
/// worker removed something, so the loop re-draws among what is left. Every
/// present action is handed out exactly once.
#[derive(Default)]
pub struct AtomicActionSet(AtomicU32);

impl AtomicActionSet {
    /// Wrap a set.
    #[must_use]
    pub fn new(set: ActionSet) -> Self {
        Self(AtomicU32::new(set.0))
    }

    /// Snapshot of the current set.
    #[inline]
    #[must_use]
    pub fn load(&self) -> ActionSet {
        ActionSet(self.0.load(Ordering::Acquire))
    }

    /// Check if no action is left.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.load().is_empty()
    }

    /// Remove an action. Returns true if this call removed it.
    #[inline]
    pub fn remove<A: ActionKind>(&self, registry: &ActionRegistry<A>, action: A) -> bool {
        let mask = registry.mask(action);
        self.0.fetch_and(!mask, Ordering::AcqRel) & mask != 0
    }

    /// Atomically pick and remove a present action.
    ///
    /// Returns `None` once the set is empty.
    pub fn pop_random<A: ActionKind>(
        &self,
        registry: &ActionRegistry<A>,
        rng: &mut SolverRng,
    ) -> Option<A> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let action = ActionSet(current).select_random(registry, rng)?;
            let next = current & !registry.mask(action);
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Some(action),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Clone for AtomicActionSet {
    fn clone(&self) -> Self {
        Self::new(self.load())
    }
}

impl fmt::Debug for AtomicActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicActionSet").field(&self.load()).finish()
    }
}

impl From<ActionSet> for AtomicActionSet {
    fn from(set: ActionSet) -> Self {
        Self::new(set)
    }
}
