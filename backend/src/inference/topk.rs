//! Bounded top-k selection over a score vector.
//!
//! Selection runs in a single left-to-right pass over `k` ranked slots. Every
//! slot starts at `(index 0, score 0.0)` and is only displaced by a strictly
//! greater score, so equal scores keep the earliest index and a vector with
//! no positive score leaves rank 1 at index 0.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub index: usize,
    pub score: f32,
    /// False while the slot still holds its initial value.
    pub assigned: bool,
}

impl Ranked {
    const UNASSIGNED: Ranked = Ranked {
        index: 0,
        score: 0.0,
        assigned: false,
    };
}

/// The `k` highest scores in descending order, always exactly `k` slots long.
pub fn top_k(scores: &[f32], k: usize) -> Vec<Ranked> {
    let mut slots = vec![Ranked::UNASSIGNED; k];
    for (index, &score) in scores.iter().enumerate() {
        let Some(rank) = slots.iter().position(|slot| score > slot.score) else {
            continue;
        };
        slots.pop();
        slots.insert(
            rank,
            Ranked {
                index,
                score,
                assigned: true,
            },
        );
    }
    slots
}

/// Keeps rank 1 unconditionally and every lower rank that was filled from the
/// vector with a score strictly above `min_score`. Each rank is checked on its
/// own.
pub fn filter_ranks(ranked: &[Ranked], min_score: f32) -> Vec<Ranked> {
    ranked
        .iter()
        .enumerate()
        .filter(|(rank, slot)| *rank == 0 || (slot.assigned && slot.score > min_score))
        .map(|(_, slot)| *slot)
        .collect()
}

/// Category selection policy: up to three ranks, lower ranks gated by score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopKSelector {
    pub k: usize,
    pub min_secondary_score: f32,
}

impl Default for TopKSelector {
    fn default() -> Self {
        Self {
            k: 3,
            min_secondary_score: 0.3,
        }
    }
}

impl TopKSelector {
    pub fn new(min_secondary_score: f32) -> Self {
        Self {
            min_secondary_score,
            ..Self::default()
        }
    }

    /// Ranks in descending order. The first entry is always present; check
    /// its `assigned` flag to tell a real winner from the initial slot.
    pub fn select(&self, scores: &[f32]) -> Vec<Ranked> {
        let ranked = top_k(scores, self.k.max(1));
        filter_ranks(&ranked, self.min_secondary_score)
    }

    pub fn select_indices(&self, scores: &[f32]) -> Vec<usize> {
        self.select(scores).into_iter().map(|r| r.index).collect()
    }
}
