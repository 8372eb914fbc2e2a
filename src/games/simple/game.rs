//! Simple craft implementation.

use serde::{Deserialize, Serialize};

use crate::core::{ActionRegistry, ActionSet, SolverResult};
use crate::simulation::{ActionResponse, CompletionState, Simulator, StateMetrics};

/// Actions of the simple craft.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CraftAction {
    /// Full synthesis power, no CP.
    BasicSynthesis,
    /// 150% synthesis power for a little CP.
    CarefulSynthesis,
    /// Full touch power, 150% under Innovation.
    BasicTouch,
    /// Restore 30 durability.
    MastersMend,
    /// Boost touches for the next 4 actions.
    Innovation,
}

impl CraftAction {
    pub const ALL: [CraftAction; 5] = [
        CraftAction::BasicSynthesis,
        CraftAction::CarefulSynthesis,
        CraftAction::BasicTouch,
        CraftAction::MastersMend,
        CraftAction::Innovation,
    ];

    pub fn cp_cost(self) -> u32 {
        match self {
            CraftAction::BasicSynthesis => 0,
            CraftAction::CarefulSynthesis => 7,
            CraftAction::BasicTouch => 18,
            CraftAction::MastersMend => 88,
            CraftAction::Innovation => 18,
        }
    }

    pub fn durability_cost(self) -> u32 {
        match self {
            CraftAction::BasicSynthesis | CraftAction::CarefulSynthesis | CraftAction::BasicTouch => DURABILITY_COST,
            CraftAction::MastersMend | CraftAction::Innovation => 0,
        }
    }
}

const DURABILITY_COST: u32 = 10;
const MEND_AMOUNT: u32 = 30;
const INNOVATION_TURNS: u8 = 4;

/// Craft progress at one point of a rotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CraftState {
    pub progress: u32,
    pub quality: u32,
    pub durability: u32,
    pub cp: u32,
    pub steps_taken: u32,
    /// Remaining actions boosted by Innovation.
    pub innovation: u8,
}

/// Deterministic toy crafting simulator.
#[derive(Clone, Debug)]
pub struct SimpleCraft {
    registry: ActionRegistry<CraftAction>,
    max_progress: u32,
    max_quality: u32,
    max_durability: u32,
    max_cp: u32,
    synthesis_power: u32,
    touch_power: u32,
}

/// Builder for creating a SimpleCraft.
pub struct SimpleCraftBuilder {
    actions: Vec<CraftAction>,
    max_progress: u32,
    max_quality: u32,
    max_durability: u32,
    max_cp: u32,
    synthesis_power: u32,
    touch_power: u32,
}

impl Default for SimpleCraftBuilder {
    fn default() -> Self {
        Self {
            actions: CraftAction::ALL.to_vec(),
            max_progress: 400,
            max_quality: 600,
            max_durability: 60,
            max_cp: 200,
            synthesis_power: 100,
            touch_power: 100,
        }
    }
}

impl SimpleCraftBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the craft to `actions`, in registry order. Repeats are ignored.
    pub fn actions(mut self, actions: &[CraftAction]) -> Self {
        self.actions.clear();
        for &action in actions {
            if !self.actions.contains(&action) {
                self.actions.push(action);
            }
        }
        self
    }

    pub fn max_progress(mut self, value: u32) -> Self {
        self.max_progress = value;
        self
    }

    /// Zero removes quality from the score.
    pub fn max_quality(mut self, value: u32) -> Self {
        self.max_quality = value;
        self
    }

    pub fn max_durability(mut self, value: u32) -> Self {
        assert!(value > 0, "Max durability must be positive");
        self.max_durability = value;
        self
    }

    pub fn max_cp(mut self, value: u32) -> Self {
        self.max_cp = value;
        self
    }

    pub fn synthesis_power(mut self, value: u32) -> Self {
        self.synthesis_power = value;
        self
    }

    pub fn touch_power(mut self, value: u32) -> Self {
        self.touch_power = value;
        self
    }

    /// Build the simulator and the starting state.
    pub fn try_build(self) -> SolverResult<(SimpleCraft, CraftState)> {
        let registry = ActionRegistry::new(&self.actions)?;
        let state = CraftState {
            durability: self.max_durability,
            cp: self.max_cp,
            ..CraftState::default()
        };

        let craft = SimpleCraft {
            registry,
            max_progress: self.max_progress,
            max_quality: self.max_quality,
            max_durability: self.max_durability,
            max_cp: self.max_cp,
            synthesis_power: self.synthesis_power,
            touch_power: self.touch_power,
        };
        Ok((craft, state))
    }

    /// Build the simulator and the starting state.
    ///
    /// # Panics
    ///
    /// Panics if the action list is empty.
    pub fn build(self) -> (SimpleCraft, CraftState) {
        assert!(!self.actions.is_empty(), "Simple craft needs at least one action");
        match self.try_build() {
            Ok(built) => built,
            Err(err) => panic!("Invalid simple craft: {err}"),
        }
    }
}

impl SimpleCraft {
    pub fn max_progress(&self) -> u32 {
        self.max_progress
    }

    pub fn max_quality(&self) -> u32 {
        self.max_quality
    }

    pub fn max_durability(&self) -> u32 {
        self.max_durability
    }

    /// Whether `action` can be used in `state` at all.
    pub fn can_use(&self, state: &CraftState, action: CraftAction) -> bool {
        state.cp >= action.cp_cost()
    }

    fn touch_gain(&self, state: &CraftState) -> u32 {
        if state.innovation > 0 {
            self.touch_power * 3 / 2
        } else {
            self.touch_power
        }
    }

    /// Whether strict mode prunes `action` as dominated in `state`.
    fn is_dominated(&self, state: &CraftState, action: CraftAction) -> bool {
        let quality_done = state.quality >= self.max_quality;
        match action {
            CraftAction::BasicTouch => quality_done,
            CraftAction::Innovation => quality_done || state.innovation > 0,
            CraftAction::MastersMend => self.max_durability.saturating_sub(state.durability) < 25,
            CraftAction::BasicSynthesis | CraftAction::CarefulSynthesis => false,
        }
    }
}

impl Simulator for SimpleCraft {
    type State = CraftState;
    type Action = CraftAction;

    fn registry(&self) -> &ActionRegistry<CraftAction> {
        &self.registry
    }

    fn execute(&self, state: &CraftState, action: CraftAction) -> (ActionResponse, CraftState) {
        if self.completion_state(state).is_terminal() {
            return (ActionResponse::SimulationComplete, *state);
        }
        if !self.can_use(state, action) {
            return (ActionResponse::NotUsable, *state);
        }

        let mut next = *state;
        next.cp -= action.cp_cost();
        match action {
            CraftAction::BasicSynthesis => next.progress += self.synthesis_power,
            CraftAction::CarefulSynthesis => next.progress += self.synthesis_power * 3 / 2,
            CraftAction::BasicTouch => next.quality += self.touch_gain(state),
            CraftAction::MastersMend => {
                next.durability = (next.durability + MEND_AMOUNT).min(self.max_durability);
            }
            CraftAction::Innovation => {}
        }
        next.durability = next.durability.saturating_sub(action.durability_cost());

        next.innovation = match action {
            CraftAction::Innovation => INNOVATION_TURNS,
            _ => next.innovation.saturating_sub(1),
        };
        next.steps_taken += 1;

        (ActionResponse::Used, next)
    }

    fn completion_state(&self, state: &CraftState) -> CompletionState {
        if state.progress >= self.max_progress {
            CompletionState::ProgressComplete
        } else if state.durability == 0 {
            CompletionState::NoMoreDurability
        } else {
            CompletionState::Incomplete
        }
    }

    fn available_actions(&self, state: &CraftState, strict: bool) -> ActionSet {
        let mut set = ActionSet::new();
        if self.completion_state(state).is_terminal() {
            return set;
        }

        for action in self.registry.iter() {
            if self.can_use(state, action) && !(strict && self.is_dominated(state, action)) {
                set.add(&self.registry, action);
            }
        }
        set
    }

    fn metrics(&self, state: &CraftState) -> StateMetrics {
        StateMetrics {
            progress: state.progress,
            max_progress: self.max_progress,
            quality: state.quality,
            max_quality: self.max_quality,
            durability: state.durability,
            max_durability: self.max_durability,
            cp: state.cp,
            max_cp: self.max_cp,
            steps_taken: state.steps_taken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_craft_creation() {
        let (craft, state) = SimpleCraftBuilder::new().max_durability(40).max_cp(100).build();

        assert_eq!(craft.registry().len(), 5);
        assert_eq!(state.durability, 40);
        assert_eq!(state.cp, 100);
        assert_eq!(state.steps_taken, 0);
        assert_eq!(craft.completion_state(&state), CompletionState::Incomplete);
    }

    #[test]
    fn test_synthesis_finishes_craft() {
        let (craft, state) = SimpleCraftBuilder::new().max_progress(200).build();

        let (response, state) = craft.execute(&state, CraftAction::BasicSynthesis);
        assert_eq!(response, ActionResponse::Used);
        assert_eq!(state.progress, 100);
        assert_eq!(state.durability, 50);
        assert_eq!(state.steps_taken, 1);

        let (_, state) = craft.execute(&state, CraftAction::BasicSynthesis);
        assert_eq!(craft.completion_state(&state), CompletionState::ProgressComplete);

        let (response, after) = craft.execute(&state, CraftAction::BasicSynthesis);
        assert_eq!(response, ActionResponse::SimulationComplete);
        assert_eq!(after, state);
    }

    #[test]
    fn test_durability_runs_out() {
        let (craft, mut state) = SimpleCraftBuilder::new().max_durability(20).build();

        for _ in 0..2 {
            state = craft.execute(&state, CraftAction::BasicTouch).1;
        }
        assert_eq!(state.durability, 0);
        assert_eq!(craft.completion_state(&state), CompletionState::NoMoreDurability);
        assert!(craft.available_actions(&state, false).is_empty());
    }

    #[test]
    fn test_innovation_boosts_touches() {
        let (craft, state) = SimpleCraftBuilder::new().build();

        let (_, state) = craft.execute(&state, CraftAction::Innovation);
        assert_eq!(state.innovation, 4);
        assert_eq!(state.durability, 60);

        let (_, state) = craft.execute(&state, CraftAction::BasicTouch);
        assert_eq!(state.quality, 150);
        assert_eq!(state.innovation, 3);
    }

    #[test]
    fn test_not_enough_cp() {
        let (craft, state) = SimpleCraftBuilder::new().max_cp(50).build();

        let (response, after) = craft.execute(&state, CraftAction::MastersMend);
        assert_eq!(response, ActionResponse::NotUsable);
        assert_eq!(after, state);
        assert!(!craft
            .available_actions(&state, false)
            .has(craft.registry(), CraftAction::MastersMend));
    }

    #[test]
    fn test_strict_mode_prunes_dominated_actions() {
        let (craft, state) = SimpleCraftBuilder::new().build();
        let registry = craft.registry();

        // Full durability: mending is pointless
        let strict = craft.available_actions(&state, true);
        let loose = craft.available_actions(&state, false);
        assert!(!strict.has(registry, CraftAction::MastersMend));
        assert!(loose.has(registry, CraftAction::MastersMend));
        assert_eq!(loose.len(), 5);

        let (_, boosted) = craft.execute(&state, CraftAction::Innovation);
        assert!(!craft
            .available_actions(&boosted, true)
            .has(registry, CraftAction::Innovation));

        let maxed = CraftState {
            quality: 600,
            ..state
        };
        let strict = craft.available_actions(&maxed, true);
        assert!(!strict.has(registry, CraftAction::BasicTouch));
        assert!(strict.has(registry, CraftAction::BasicSynthesis));
    }

    #[test]
    fn test_restricted_action_list() {
        let (craft, state) = SimpleCraftBuilder::new()
            .actions(&[CraftAction::BasicSynthesis, CraftAction::BasicSynthesis])
            .build();

        assert_eq!(craft.registry().len(), 1);
        assert_eq!(craft.available_actions(&state, true).len(), 1);
    }
}
