// src/error_model.rs
//
// Error model controller (EMC): perturbs user actions in place to
// simulate noisy language understanding before they reach the state
// tracker. Slot-level error modes: value replacement, whole-slot
// substitution, slot deletion; plus independent intent corruption.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::ErrorModelConfig;
use crate::corpus::{Corpus, SlotDictionary};
use crate::types::{UserAction, UserIntent};

/// Noise-injection seam between the simulator and the tracker.
pub trait ErrorModel {
    /// Mutate `action` into a (possibly) noisy variant. Not idempotent.
    fn infuse_error(&mut self, action: &mut UserAction);
}

pub struct SlotErrorModel {
    dict: SlotDictionary,
    slot_error_prob: f64,
    intent_error_prob: f64,
    rng: ChaCha8Rng,
}

impl SlotErrorModel {
    pub fn new(corpus: &Corpus, cfg: &ErrorModelConfig, seed: u64) -> Self {
        Self {
            dict: corpus.dict.clone(),
            slot_error_prob: cfg.slot_error_prob,
            intent_error_prob: cfg.intent_error_prob,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn random_value(&mut self, slot: &str) -> Option<String> {
        let candidates = self.dict.candidates(slot);
        if candidates.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..candidates.len());
        Some(candidates[idx].clone())
    }

    fn random_slot(&mut self) -> Option<String> {
        let slots = self.dict.slots();
        if slots.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..slots.len());
        Some(slots[idx].clone())
    }
}

impl ErrorModel for SlotErrorModel {
    fn infuse_error(&mut self, action: &mut UserAction) {
        let slots: Vec<String> = action.inform_slots.keys().cloned().collect();
        for slot in slots {
            if self.rng.gen::<f64>() >= self.slot_error_prob {
                continue;
            }
            match self.rng.gen_range(0..3u8) {
                // Wrong value for the right slot.
                0 => {
                    if let Some(value) = self.random_value(&slot) {
                        action.inform_slots.insert(slot, value);
                    }
                }
                // Entirely different slot.
                1 => {
                    if let Some(new_slot) = self.random_slot() {
                        if let Some(value) = self.random_value(&new_slot) {
                            action.inform_slots.remove(&slot);
                            action.inform_slots.insert(new_slot, value);
                        }
                    }
                }
                // Slot dropped altogether.
                _ => {
                    action.inform_slots.remove(&slot);
                }
            }
        }

        if self.rng.gen::<f64>() < self.intent_error_prob {
            let idx = self.rng.gen_range(0..UserIntent::ALL.len());
            action.intent = UserIntent::ALL[idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Corpus;

    fn mk_action() -> UserAction {
        let mut a = UserAction::new(UserIntent::Inform);
        a.inform_slots
            .insert("city".to_string(), "seattle".to_string());
        a.inform_slots
            .insert("date".to_string(), "tomorrow".to_string());
        a
    }

    #[test]
    fn test_zero_probability_is_identity() {
        let corpus = Corpus::builtin();
        let cfg = ErrorModelConfig {
            slot_error_prob: 0.0,
            intent_error_prob: 0.0,
        };
        let mut emc = SlotErrorModel::new(&corpus, &cfg, 1);

        let mut action = mk_action();
        let original = action.clone();
        for _ in 0..50 {
            emc.infuse_error(&mut action);
        }
        assert_eq!(action, original);
    }

    #[test]
    fn test_full_probability_perturbs_informs() {
        let corpus = Corpus::builtin();
        let cfg = ErrorModelConfig {
            slot_error_prob: 1.0,
            intent_error_prob: 0.0,
        };
        let mut emc = SlotErrorModel::new(&corpus, &cfg, 1);

        // Across many trials the action must change at least once
        // (deletion or substitution always changes it; value replacement
        // can coincidentally pick the original value).
        let mut changed = false;
        for _ in 0..20 {
            let mut action = mk_action();
            emc.infuse_error(&mut action);
            if action != mk_action() {
                changed = true;
                break;
            }
        }
        assert!(changed);
    }

    #[test]
    fn test_intent_corruption_only_touches_intent_space() {
        let corpus = Corpus::builtin();
        let cfg = ErrorModelConfig {
            slot_error_prob: 0.0,
            intent_error_prob: 1.0,
        };
        let mut emc = SlotErrorModel::new(&corpus, &cfg, 3);

        let mut action = mk_action();
        emc.infuse_error(&mut action);
        assert!(UserIntent::ALL.contains(&action.intent));
        assert_eq!(action.inform_slots, mk_action().inform_slots);
    }

    #[test]
    fn test_deterministic_given_seed() {
        let corpus = Corpus::builtin();
        let cfg = ErrorModelConfig {
            slot_error_prob: 0.5,
            intent_error_prob: 0.5,
        };
        let mut e1 = SlotErrorModel::new(&corpus, &cfg, 99);
        let mut e2 = SlotErrorModel::new(&corpus, &cfg, 99);

        for _ in 0..25 {
            let mut a1 = mk_action();
            let mut a2 = mk_action();
            e1.infuse_error(&mut a1);
            e2.infuse_error(&mut a2);
            assert_eq!(a1, a2);
        }
    }
}
