//! Vote/aura bookkeeping rules.
//!
//! Both stores apply these transitions inside a single transaction (or a
//! single write lock), so the vote row, the target counters and the author's
//! aura move together.

use crate::models::VoteType;

/// Aura granted to an author for creating content (the creation itself plus
/// the implicit self upvote).
pub const CREATION_AURA: i64 = 2;

/// What a vote request does to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    /// Vote row after the request; `None` means the row is removed.
    pub next: Option<VoteType>,
    pub upvote_delta: i64,
    pub downvote_delta: i64,
    /// Delta applied to the target author's aura (before the zero floor).
    pub aura_delta: i64,
}

impl VoteTransition {
    pub fn score_delta(&self) -> i64 {
        self.upvote_delta - self.downvote_delta
    }
}

fn counter_delta(vote: VoteType, amount: i64) -> (i64, i64) {
    match vote {
        VoteType::Upvote => (amount, 0),
        VoteType::Downvote => (0, amount),
    }
}

fn direction(vote: VoteType) -> i64 {
    match vote {
        VoteType::Upvote => 1,
        VoteType::Downvote => -1,
    }
}

/// Three-way branch on the voter's prior vote for the target.
pub fn transition(prior: Option<VoteType>, requested: VoteType) -> VoteTransition {
    match prior {
        None => {
            let (up, down) = counter_delta(requested, 1);
            VoteTransition {
                next: Some(requested),
                upvote_delta: up,
                downvote_delta: down,
                aura_delta: direction(requested),
            }
        }
        Some(existing) if existing == requested => {
            let (up, down) = counter_delta(existing, -1);
            VoteTransition {
                next: None,
                upvote_delta: up,
                downvote_delta: down,
                aura_delta: -direction(existing),
            }
        }
        Some(existing) => {
            let (old_up, old_down) = counter_delta(existing, -1);
            let (new_up, new_down) = counter_delta(requested, 1);
            VoteTransition {
                next: Some(requested),
                upvote_delta: old_up + new_up,
                downvote_delta: old_down + new_down,
                aura_delta: 2 * direction(requested),
            }
        }
    }
}

/// Aura never drops below zero; oversized negative deltas clamp at the floor.
pub fn apply_aura(current: i64, delta: i64) -> i64 {
    (current + delta).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use VoteType::*;

    #[test]
    fn first_vote_counts_once() {
        let t = transition(None, Upvote);
        assert_eq!(t, VoteTransition { next: Some(Upvote), upvote_delta: 1, downvote_delta: 0, aura_delta: 1 });
        let t = transition(None, Downvote);
        assert_eq!(t, VoteTransition { next: Some(Downvote), upvote_delta: 0, downvote_delta: 1, aura_delta: -1 });
    }

    #[test]
    fn repeating_a_vote_removes_it() {
        let t = transition(Some(Upvote), Upvote);
        assert_eq!(t.next, None);
        assert_eq!((t.upvote_delta, t.downvote_delta, t.aura_delta), (-1, 0, -1));
        let t = transition(Some(Downvote), Downvote);
        assert_eq!(t.next, None);
        assert_eq!((t.upvote_delta, t.downvote_delta, t.aura_delta), (0, -1, 1));
    }

    #[test]
    fn switching_moves_both_counters() {
        let t = transition(Some(Upvote), Downvote);
        assert_eq!(t.next, Some(Downvote));
        assert_eq!((t.upvote_delta, t.downvote_delta), (-1, 1));
        assert_eq!(t.aura_delta, -2);
        assert_eq!(t.score_delta(), -2);

        let t = transition(Some(Downvote), Upvote);
        assert_eq!(t.aura_delta, 2);
        assert_eq!(t.score_delta(), 2);
    }

    #[test]
    fn toggle_restores_original_state() {
        let on = transition(None, Upvote);
        let off = transition(on.next, Upvote);
        assert_eq!(on.score_delta() + off.score_delta(), 0);
        assert_eq!(on.aura_delta + off.aura_delta, 0);
    }

    #[test]
    fn aura_is_floored_at_zero() {
        assert_eq!(apply_aura(0, -1), 0);
        assert_eq!(apply_aura(1, -2), 0);
        assert_eq!(apply_aura(3, -2), 1);
        assert_eq!(apply_aura(0, 2), 2);
    }
}
