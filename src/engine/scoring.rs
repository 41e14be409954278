//! Point awards computed once per round at the voting→results boundary.

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;
use uuid::Uuid;

use crate::config::GameTuning;
use crate::dao::game_store::GameStore;
use crate::dao::models::{GeneratedImageEntity, VoteEntity};
use crate::engine::eligibility::{count_per_target, winning_targets};
use crate::error::ServiceError;

/// Points owed to one player for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreAward {
    /// Player receiving the points.
    pub player_id: Uuid,
    /// Total points, win share plus participation.
    pub points: i64,
}

/// Compute the round's awards. Pure; a round with zero votes awards nothing.
///
/// The win budget is split evenly (floor division) across the owners of every
/// image tied for the most votes. Every distinct voter then receives the
/// participation amount exactly once, winners included.
pub fn calculate_scores(
    images: &[GeneratedImageEntity],
    votes: &[VoteEntity],
    tuning: &GameTuning,
) -> Vec<ScoreAward> {
    let mut totals: IndexMap<Uuid, i64> = IndexMap::new();

    let counts = count_per_target(votes);
    let winners = winning_targets(&counts);
    if !winners.is_empty() {
        let share = tuning.win_points / winners.len() as i64;
        for image_id in &winners {
            let Some(image) = images.iter().find(|image| image.id == *image_id) else {
                debug!(%image_id, "winning target has no image record; skipping");
                continue;
            };
            *totals.entry(image.player_id).or_insert(0) += share;
        }
    }

    // Collecting into a set guards against duplicate rows; each distinct
    // voter is paid exactly once.
    let voters: HashSet<Uuid> = votes.iter().map(|vote| vote.voter_id).collect();
    for voter_id in voters {
        *totals.entry(voter_id).or_insert(0) += tuning.participation_points;
    }

    totals
        .into_iter()
        .map(|(player_id, points)| ScoreAward { player_id, points })
        .collect()
}

/// Persist the awards through the store. Scores only ever increase.
pub async fn apply_scores(
    store: &Arc<dyn GameStore>,
    awards: &[ScoreAward],
) -> Result<(), ServiceError> {
    for award in awards {
        store
            .add_player_score(award.player_id, award.points)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn tuning() -> GameTuning {
        GameTuning::default()
    }

    fn image(owner: Uuid) -> GeneratedImageEntity {
        GeneratedImageEntity {
            id: Uuid::new_v4(),
            round_id: Uuid::new_v4(),
            prompt_id: Uuid::new_v4(),
            player_id: owner,
            url: Some("https://img.example/a".into()),
            error: None,
            metadata: None,
            created_at: SystemTime::now(),
        }
    }

    fn vote(voter: Uuid, image_id: Uuid) -> VoteEntity {
        VoteEntity {
            id: Uuid::new_v4(),
            round_id: Uuid::new_v4(),
            voter_id: voter,
            image_id,
            submitted_at: SystemTime::now(),
        }
    }

    fn points_for(awards: &[ScoreAward], player: Uuid) -> i64 {
        awards
            .iter()
            .find(|award| award.player_id == player)
            .map(|award| award.points)
            .unwrap_or(0)
    }

    #[test]
    fn zero_votes_awards_nothing() {
        let owner = Uuid::new_v4();
        let awards = calculate_scores(&[image(owner)], &[], &tuning());
        assert!(awards.is_empty());
    }

    #[test]
    fn single_winner_takes_full_budget_plus_participation() {
        let tuning = tuning();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let alice_image = image(alice);
        let bob_image = image(bob);

        // Both vote for Alice's image.
        let votes = vec![vote(bob, alice_image.id), vote(alice, alice_image.id)];
        let awards = calculate_scores(&[alice_image, bob_image], &votes, &tuning);

        assert_eq!(
            points_for(&awards, alice),
            tuning.win_points + tuning.participation_points
        );
        assert_eq!(points_for(&awards, bob), tuning.participation_points);
    }

    #[test]
    fn three_way_tie_splits_budget_with_floor_division() {
        let tuning = tuning();
        let owners: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let images: Vec<GeneratedImageEntity> =
            owners.iter().map(|owner| image(*owner)).collect();

        // Each owner votes for the next image over, producing a 1-1-1 tie.
        let votes = vec![
            vote(owners[0], images[1].id),
            vote(owners[1], images[2].id),
            vote(owners[2], images[0].id),
        ];
        let awards = calculate_scores(&images, &votes, &tuning);

        let share = tuning.win_points / 3;
        for owner in &owners {
            assert_eq!(
                points_for(&awards, *owner),
                share + tuning.participation_points
            );
        }

        let total_win_points: i64 = awards.iter().map(|award| award.points).sum::<i64>()
            - 3 * tuning.participation_points;
        assert!(total_win_points <= tuning.win_points);
    }

    #[test]
    fn participation_awarded_once_per_distinct_voter() {
        let tuning = tuning();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let target = image(alice);

        // Bob's re-vote is stored as a single row, but even duplicate rows
        // must not double the participation award.
        let votes = vec![vote(bob, target.id), vote(bob, target.id)];
        let awards = calculate_scores(std::slice::from_ref(&target), &votes, &tuning);

        assert_eq!(points_for(&awards, bob), tuning.participation_points);
        assert_eq!(points_for(&awards, alice), tuning.win_points);
    }
}
