use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::PunterId;

/// One punter's final score, as reported in [`Stop`](crate::Stop).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub punter: PunterId,
    pub score: i64,
}

/// Where one punter finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Standing {
    /// 1-based.
    pub rank: usize,
    pub total: usize,
}

/// Sorts by descending score. Ties keep the order the server reported them in.
pub fn ranked(scores: &[ScoreEntry]) -> Vec<ScoreEntry> {
    let mut scores = scores.to_vec();
    scores.sort_by_key(|entry| Reverse(entry.score));
    scores
}

/// Returns `None` if the punter is not among the scores.
pub fn standing(punter: PunterId, scores: &[ScoreEntry]) -> Option<Standing> {
    ranked(scores)
        .iter()
        .position(|entry| entry.punter == punter)
        .map(|idx| Standing {
            rank: idx + 1,
            total: scores.len(),
        })
}

#[cfg(test)]
mod tests {
    use quickcheck::quickcheck;

    use super::*;

    fn entries(pairs: &[(PunterId, i64)]) -> Vec<ScoreEntry> {
        pairs
            .iter()
            .map(|&(punter, score)| ScoreEntry { punter, score })
            .collect()
    }

    #[test]
    fn ties_keep_server_order() {
        let scores = entries(&[(0, 10), (1, 20), (2, 20)]);
        let rank = |punter| standing(punter, &scores).unwrap().rank;
        assert_eq!(rank(1), 1);
        assert_eq!(rank(2), 2);
        assert_eq!(rank(0), 3);
        assert_eq!(standing(0, &scores).unwrap().total, 3);
    }

    #[test]
    fn last_place_of_two() {
        let scores = entries(&[(0, 5), (1, 15)]);
        assert_eq!(standing(0, &scores), Some(Standing { rank: 2, total: 2 }));
    }

    #[test]
    fn unknown_punter_has_no_standing() {
        assert_eq!(standing(7, &entries(&[(0, 5)])), None);
        assert_eq!(standing(0, &[]), None);
    }

    quickcheck! {
        fn ranking_is_idempotent(pairs: Vec<(PunterId, i8)>) -> bool {
            let scores: Vec<ScoreEntry> = pairs
                .into_iter()
                .map(|(punter, score)| ScoreEntry { punter, score: score.into() })
                .collect();
            let once = ranked(&scores);
            ranked(&once) == once
        }
    }

    quickcheck! {
        fn ranking_is_descending_and_stable(scores: Vec<i8>) -> bool {
            // Punter ids record the input position, so stability is checkable.
            let scores: Vec<ScoreEntry> = scores
                .into_iter()
                .enumerate()
                .map(|(idx, score)| ScoreEntry { punter: idx as PunterId, score: score.into() })
                .collect();
            ranked(&scores).windows(2).all(|pair| {
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].punter < pair[1].punter)
            })
        }
    }
}
