//! Pure eligibility and completion evaluation.
//!
//! Everything here is side-effect free: the submission handlers re-load
//! authoritative state and feed it through these functions on every action,
//! so the last submission to complete the eligible set is the one that
//! triggers the early transition.

use std::collections::HashSet;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::dao::models::{GeneratedImageEntity, PlayerEntity, VoteEntity};

/// Whether a player must act in the current phase, and if not, why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// The player is required to act before the phase can end early.
    Eligible,
    /// Disconnected or kicked players are never required to act.
    NotConnected,
    /// The only votable image is the player's own.
    OnlyOwnImage,
    /// No votable image exists at all.
    NoImages,
}

impl Eligibility {
    /// Whether this entry marks a required actor.
    pub fn is_eligible(self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Who must submit a prompt: every connected player.
pub fn prompt_eligibility(players: &[PlayerEntity]) -> IndexMap<Uuid, Eligibility> {
    players
        .iter()
        .map(|player| {
            let eligibility = if player.is_connected() {
                Eligibility::Eligible
            } else {
                Eligibility::NotConnected
            };
            (player.id, eligibility)
        })
        .collect()
}

/// Who must vote: every connected player for whom a votable image owned by
/// somebody else exists. A player who submitted the only image in the round
/// has nothing legal to vote on; a player who submitted nothing is eligible
/// as soon as any image exists.
pub fn vote_eligibility(
    players: &[PlayerEntity],
    images: &[GeneratedImageEntity],
) -> IndexMap<Uuid, Eligibility> {
    let votable: Vec<&GeneratedImageEntity> =
        images.iter().filter(|image| image.is_votable()).collect();

    players
        .iter()
        .map(|player| {
            let eligibility = if !player.is_connected() {
                Eligibility::NotConnected
            } else if votable.is_empty() {
                Eligibility::NoImages
            } else if votable.iter().all(|image| image.player_id == player.id) {
                Eligibility::OnlyOwnImage
            } else {
                Eligibility::Eligible
            };
            (player.id, eligibility)
        })
        .collect()
}

/// True only when the eligible set is non-empty and every eligible player has
/// a recorded action. An empty eligible set never completes a phase.
pub fn all_required_have_acted(
    eligibility: &IndexMap<Uuid, Eligibility>,
    actors: &HashSet<Uuid>,
) -> bool {
    let mut required = eligibility
        .iter()
        .filter(|(_, entry)| entry.is_eligible())
        .peekable();

    if required.peek().is_none() {
        return false;
    }

    required.all(|(player_id, _)| actors.contains(player_id))
}

/// Tally votes per target image.
pub fn count_per_target(votes: &[VoteEntity]) -> IndexMap<Uuid, u32> {
    let mut counts: IndexMap<Uuid, u32> = IndexMap::new();
    for vote in votes {
        *counts.entry(vote.image_id).or_insert(0) += 1;
    }
    counts
}

/// Every target tied for the maximum count. A count of zero never wins; ties
/// return every tied target, never a single arbitrary pick.
pub fn winning_targets(counts: &IndexMap<Uuid, u32>) -> Vec<Uuid> {
    let max = counts.values().copied().max().unwrap_or(0);
    if max == 0 {
        return Vec::new();
    }

    counts
        .iter()
        .filter(|(_, count)| **count == max)
        .map(|(target, _)| *target)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::PlayerStatus;

    fn player(status: PlayerStatus) -> PlayerEntity {
        PlayerEntity {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            user_id: "user".into(),
            status,
            is_host: false,
            score: 0,
            created_at: SystemTime::now(),
        }
    }

    fn image_owned_by(player_id: Uuid) -> GeneratedImageEntity {
        GeneratedImageEntity {
            id: Uuid::new_v4(),
            round_id: Uuid::new_v4(),
            prompt_id: Uuid::new_v4(),
            player_id,
            url: Some("https://img.example/1".into()),
            error: None,
            metadata: None,
            created_at: SystemTime::now(),
        }
    }

    fn vote_for(image_id: Uuid) -> VoteEntity {
        VoteEntity {
            id: Uuid::new_v4(),
            round_id: Uuid::new_v4(),
            voter_id: Uuid::new_v4(),
            image_id,
            submitted_at: SystemTime::now(),
        }
    }

    #[test]
    fn disconnected_players_are_never_required() {
        let connected = player(PlayerStatus::Connected);
        let gone = player(PlayerStatus::Disconnected);
        let kicked = player(PlayerStatus::Kicked);
        let players = vec![connected.clone(), gone.clone(), kicked.clone()];

        let prompts = prompt_eligibility(&players);
        assert_eq!(prompts[&connected.id], Eligibility::Eligible);
        assert_eq!(prompts[&gone.id], Eligibility::NotConnected);
        assert_eq!(prompts[&kicked.id], Eligibility::NotConnected);

        let votes = vote_eligibility(&players, &[image_owned_by(connected.id)]);
        assert_eq!(votes[&gone.id], Eligibility::NotConnected);
        assert_eq!(votes[&kicked.id], Eligibility::NotConnected);
    }

    #[test]
    fn lone_submitter_cannot_vote_on_own_image() {
        let submitter = player(PlayerStatus::Connected);
        let images = vec![image_owned_by(submitter.id)];

        let eligibility = vote_eligibility(std::slice::from_ref(&submitter), &images);
        assert_eq!(eligibility[&submitter.id], Eligibility::OnlyOwnImage);
    }

    #[test]
    fn non_submitter_is_eligible_when_any_image_exists() {
        let submitter = player(PlayerStatus::Connected);
        let bystander = player(PlayerStatus::Connected);
        let images = vec![image_owned_by(submitter.id)];

        let eligibility = vote_eligibility(&[submitter.clone(), bystander.clone()], &images);
        assert_eq!(eligibility[&bystander.id], Eligibility::Eligible);
        assert_eq!(eligibility[&submitter.id], Eligibility::OnlyOwnImage);
    }

    #[test]
    fn error_placeholders_are_not_votable() {
        let submitter = player(PlayerStatus::Connected);
        let other = player(PlayerStatus::Connected);
        let mut broken = image_owned_by(submitter.id);
        broken.url = None;
        broken.error = Some("model refused".into());

        let eligibility = vote_eligibility(&[submitter, other.clone()], &[broken]);
        assert_eq!(eligibility[&other.id], Eligibility::NoImages);
    }

    #[test]
    fn empty_eligible_set_never_completes() {
        let gone = player(PlayerStatus::Disconnected);
        let eligibility = vote_eligibility(&[gone], &[]);
        assert!(!all_required_have_acted(&eligibility, &HashSet::new()));
    }

    #[test]
    fn completion_requires_every_eligible_actor() {
        let a = player(PlayerStatus::Connected);
        let b = player(PlayerStatus::Connected);
        let eligibility = prompt_eligibility(&[a.clone(), b.clone()]);

        let mut actors = HashSet::from([a.id]);
        assert!(!all_required_have_acted(&eligibility, &actors));

        actors.insert(b.id);
        assert!(all_required_have_acted(&eligibility, &actors));
    }

    #[test]
    fn winning_targets_keeps_all_tied_maxima() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();

        let votes = vec![
            vote_for(first),
            vote_for(first),
            vote_for(second),
            vote_for(second),
            vote_for(third),
        ];
        let counts = count_per_target(&votes);
        let winners = winning_targets(&counts);

        assert_eq!(winners.len(), 2);
        assert!(winners.contains(&first));
        assert!(winners.contains(&second));
        assert!(!winners.contains(&third));
    }

    #[test]
    fn no_votes_means_no_winners() {
        assert!(winning_targets(&IndexMap::new()).is_empty());

        let counts: IndexMap<Uuid, u32> =
            IndexMap::from([(Uuid::new_v4(), 0), (Uuid::new_v4(), 0)]);
        assert!(winning_targets(&counts).is_empty());
    }
}
