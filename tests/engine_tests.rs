//! End-to-end engine scenarios over the in-memory store and manual scheduler.

mod common;

use std::sync::Arc;

use common::{FailingGenerator, harness, harness_with_generator};
use prompt_party_back::{
    dao::game_store::GameStore,
    dao::models::{RoomStatus, RoundPhase},
    engine::{self, generation, lifecycle},
    scheduler::ScheduledJob,
    services::{session_service, submission_service},
};

#[tokio::test]
async fn start_game_walks_a_full_round_through_every_phase() {
    let h = harness();
    h.install_store().await;
    let (room, players) = h.seed_room(2).await;

    // Host starts the game; round 1 is initialized through the scheduler.
    session_service::start_game(&h.state, room.id, players[0].id)
        .await
        .unwrap();
    assert_eq!(h.room(room.id).await.status, RoomStatus::Starting);

    for (_, job) in h.scheduler.drain() {
        engine::dispatch_job(&h.state, job).await.unwrap();
    }

    let updated = h.room(room.id).await;
    assert_eq!(updated.status, RoomStatus::Playing);
    assert_eq!(updated.current_round, Some(1));

    let round = h
        .store
        .current_round_for_room(room.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(round.phase, RoundPhase::Prompt);
    assert!(round.scheduled_timer.is_some());

    // Both players submit prompts; the second submission completes the
    // eligible set and advances the round without its timer firing.
    submission_service::submit_prompt(&h.state, room.id, players[0].id, "a moth with opinions")
        .await
        .unwrap();
    assert_eq!(h.round(round.id).await.phase, RoundPhase::Prompt);

    h.mature_round(round.id).await;
    submission_service::submit_prompt(&h.state, room.id, players[1].id, "the last slice of pizza")
        .await
        .unwrap();

    let generating = h.round(round.id).await;
    assert_eq!(generating.phase, RoundPhase::Generating);
    assert_eq!(generating.images_expected, 2);

    // Run the generation collaborator to completion; each outcome is recorded
    // and the last one schedules the jump to voting.
    let prompts = h.store.prompts_for_round(round.id).await.unwrap();
    generation::run_generation(&h.state, round.id, prompts).await;

    let generated = h.round(round.id).await;
    assert_eq!(generated.images_completed, 2);
    assert!(generated.scheduled_timer.is_some());

    h.mature_round(round.id).await;
    for (_, job) in h.scheduler.drain() {
        if matches!(job, ScheduledJob::RoundDeadline { round_id } if round_id == round.id) {
            engine::dispatch_job(&h.state, job).await.unwrap();
        }
    }
    assert_eq!(h.round(round.id).await.phase, RoundPhase::Voting);

    // Each player votes for the other's image; the second vote ends voting.
    let images = h.store.images_for_round(round.id).await.unwrap();
    let image_of = |player| {
        images
            .iter()
            .find(|image| image.player_id == player)
            .unwrap()
            .id
    };
    submission_service::submit_vote(&h.state, room.id, players[0].id, image_of(players[1].id))
        .await
        .unwrap();
    h.mature_round(round.id).await;
    submission_service::submit_vote(&h.state, room.id, players[1].id, image_of(players[0].id))
        .await
        .unwrap();

    assert_eq!(h.round(round.id).await.phase, RoundPhase::Results);

    // A 1-1 tie: both players own a winning image and both voted.
    let tuning = h.state.tuning().clone();
    let expected = tuning.win_points / 2 + tuning.participation_points;
    assert_eq!(h.player(players[0].id).await.score, expected);
    assert_eq!(h.player(players[1].id).await.score, expected);

    // Results deadline fires; the round completes and the next one is queued.
    h.mature_round(round.id).await;
    engine::dispatch_job(
        &h.state,
        ScheduledJob::RoundDeadline { round_id: round.id },
    )
    .await
    .unwrap();

    assert_eq!(h.round(round.id).await.phase, RoundPhase::Complete);
    assert!(
        h.scheduler
            .pending_jobs()
            .iter()
            .any(|job| matches!(job, ScheduledJob::BeginNextRound { room_id } if *room_id == room.id))
    );

    for (_, job) in h.scheduler.drain() {
        if matches!(job, ScheduledJob::BeginNextRound { .. }) {
            engine::dispatch_job(&h.state, job).await.unwrap();
        }
    }
    let next = h
        .store
        .current_round_for_room(room.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.number, 2);
    assert_eq!(next.phase, RoundPhase::Prompt);
    assert_eq!(h.room(room.id).await.current_round, Some(2));
}

#[tokio::test]
async fn duplicate_transition_is_absorbed() {
    let h = harness();
    h.install_store().await;
    let (room, _) = h.seed_room(2).await;
    let round = h.seed_round_in_phase(&room, 1, RoundPhase::Prompt).await;

    // Simulates the timer and an early trigger racing: the loser arrives just
    // after the winner already advanced the phase.
    let first = lifecycle::transition(&h.state, round.id).await.unwrap();
    let second = lifecycle::transition(&h.state, round.id).await.unwrap();

    assert_eq!(
        first,
        lifecycle::TransitionOutcome::Advanced(RoundPhase::Generating)
    );
    assert!(matches!(second, lifecycle::TransitionOutcome::Skipped(_)));
    assert_eq!(h.round(round.id).await.phase, RoundPhase::Generating);
}

#[tokio::test]
async fn early_prompt_completion_cancels_the_phase_timer() {
    let h = harness();
    h.install_store().await;
    let (room, players) = h.seed_room(2).await;
    let round = h.seed_round_in_phase(&room, 1, RoundPhase::Prompt).await;

    let timer = h
        .state
        .scheduler()
        .schedule_at(std::time::SystemTime::now(), ScheduledJob::RoundDeadline {
            round_id: round.id,
        });
    h.store.set_round_timer(round.id, Some(timer)).await.unwrap();

    submission_service::submit_prompt(&h.state, room.id, players[0].id, "a polite kraken")
        .await
        .unwrap();
    submission_service::submit_prompt(&h.state, room.id, players[1].id, "rush hour on the moon")
        .await
        .unwrap();

    assert_eq!(h.round(round.id).await.phase, RoundPhase::Generating);
    assert!(h.scheduler.was_canceled(timer));
}

#[tokio::test]
async fn lone_submitter_is_skipped_and_single_vote_ends_voting() {
    let h = harness();
    h.install_store().await;
    let (room, players) = h.seed_room(2).await;
    let round = h.seed_round_in_phase(&room, 1, RoundPhase::Voting).await;

    // Only player 0 produced an image, so they have nothing legal to vote on
    // and the phase must complete on player 1's single vote.
    let image = h.seed_image(round.id, players[0].id).await;
    submission_service::submit_vote(&h.state, room.id, players[1].id, image.id)
        .await
        .unwrap();

    assert_eq!(h.round(round.id).await.phase, RoundPhase::Results);

    let tuning = h.state.tuning().clone();
    assert_eq!(h.player(players[0].id).await.score, tuning.win_points);
    assert_eq!(
        h.player(players[1].id).await.score,
        tuning.participation_points
    );
}

#[tokio::test]
async fn own_image_is_never_a_legal_vote_target() {
    let h = harness();
    h.install_store().await;
    let (room, players) = h.seed_room(2).await;
    let round = h.seed_round_in_phase(&room, 1, RoundPhase::Voting).await;
    let own = h.seed_image(round.id, players[0].id).await;

    let err = submission_service::submit_vote(&h.state, room.id, players[0].id, own.id)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("own image"));
    assert_eq!(h.round(round.id).await.phase, RoundPhase::Voting);
}

#[tokio::test]
async fn three_way_tie_splits_the_win_budget_with_floor_division() {
    let h = harness();
    h.install_store().await;
    let (room, players) = h.seed_room(3).await;
    let round = h.seed_round_in_phase(&room, 1, RoundPhase::Voting).await;

    let mut images = Vec::new();
    for player in &players {
        images.push(h.seed_image(round.id, player.id).await);
    }

    // Everyone votes for the next player's image: a 1-1-1 tie.
    for (index, player) in players.iter().enumerate() {
        if index == players.len() - 1 {
            h.mature_round(round.id).await;
        }
        let target = &images[(index + 1) % players.len()];
        submission_service::submit_vote(&h.state, room.id, player.id, target.id)
            .await
            .unwrap();
    }

    assert_eq!(h.round(round.id).await.phase, RoundPhase::Results);

    let tuning = h.state.tuning().clone();
    let share = tuning.win_points / 3;
    let mut total_win_points = 0;
    for player in &players {
        let score = h.player(player.id).await.score;
        assert_eq!(score, share + tuning.participation_points);
        total_win_points += score - tuning.participation_points;
    }
    assert!(total_win_points <= tuning.win_points);
}

#[tokio::test]
async fn generation_verification_fails_open_after_retries() {
    let h = harness();
    h.install_store().await;
    let (room, _) = h.seed_room(2).await;
    let round = h.seed_round_in_phase(&room, 1, RoundPhase::Generating).await;

    // No prompts exist. Attempts below the cap re-schedule themselves.
    let cap = h.state.tuning().verify_max_attempts;
    for attempt in 1..cap {
        generation::verify_generation(&h.state, round.id, attempt)
            .await
            .unwrap();
        assert_eq!(h.round(round.id).await.phase, RoundPhase::Generating);
        let retries: Vec<_> = h
            .scheduler
            .drain()
            .into_iter()
            .filter(|(_, job)| {
                matches!(job, ScheduledJob::VerifyGeneration { attempt: next, .. } if *next == attempt + 1)
            })
            .collect();
        assert_eq!(retries.len(), 1);
    }

    // The final attempt records the failure and forces the round into voting
    // with zero images instead of stalling.
    generation::verify_generation(&h.state, round.id, cap)
        .await
        .unwrap();

    let failed_open = h.round(round.id).await;
    assert_eq!(failed_open.phase, RoundPhase::Voting);
    assert!(failed_open.generation_error.is_some());
    assert_eq!(failed_open.images_expected, 0);
    assert!(
        h.store
            .images_for_round(round.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn failed_generations_still_count_as_progress() {
    let h = harness_with_generator(Arc::new(FailingGenerator));
    h.install_store().await;
    let (room, players) = h.seed_room(2).await;
    let round = h.seed_round_in_phase(&room, 1, RoundPhase::Prompt).await;

    submission_service::submit_prompt(&h.state, room.id, players[0].id, "an unlucky prompt")
        .await
        .unwrap();
    submission_service::submit_prompt(&h.state, room.id, players[1].id, "another unlucky prompt")
        .await
        .unwrap();
    assert_eq!(h.round(round.id).await.phase, RoundPhase::Generating);

    let prompts = h.store.prompts_for_round(round.id).await.unwrap();
    generation::run_generation(&h.state, round.id, prompts).await;

    // Two error placeholders were recorded, completing the expected count.
    let generated = h.round(round.id).await;
    assert_eq!(generated.images_completed, 2);
    let images = h.store.images_for_round(round.id).await.unwrap();
    assert_eq!(images.len(), 2);
    assert!(images.iter().all(|image| !image.is_votable()));
    assert!(images.iter().all(|image| image.error.is_some()));

    // With nothing votable, voting still happens (shortened window) and the
    // results pass awards nothing.
    h.mature_round(round.id).await;
    engine::dispatch_job(
        &h.state,
        ScheduledJob::RoundDeadline { round_id: round.id },
    )
    .await
    .unwrap();
    assert_eq!(h.round(round.id).await.phase, RoundPhase::Voting);

    h.mature_round(round.id).await;
    engine::dispatch_job(
        &h.state,
        ScheduledJob::RoundDeadline { round_id: round.id },
    )
    .await
    .unwrap();
    assert_eq!(h.round(round.id).await.phase, RoundPhase::Results);
    for player in &players {
        assert_eq!(h.player(player.id).await.score, 0);
    }
}

#[tokio::test]
async fn final_round_completion_finishes_the_game() {
    let h = harness();
    h.install_store().await;
    let (room, _) = h.seed_room(2).await;

    // rounds_per_game is 3 in the harness settings.
    let round = h.seed_round_in_phase(&room, 3, RoundPhase::Results).await;
    engine::dispatch_job(
        &h.state,
        ScheduledJob::RoundDeadline { round_id: round.id },
    )
    .await
    .unwrap();

    assert_eq!(h.round(round.id).await.phase, RoundPhase::Complete);
    assert_eq!(h.room(room.id).await.status, RoomStatus::Finished);
    assert!(
        !h.scheduler
            .pending_jobs()
            .iter()
            .any(|job| matches!(job, ScheduledJob::BeginNextRound { .. }))
    );
}

#[tokio::test]
async fn wrong_phase_submissions_are_rejected() {
    let h = harness();
    h.install_store().await;
    let (room, players) = h.seed_room(2).await;
    let round = h.seed_round_in_phase(&room, 1, RoundPhase::Voting).await;

    let err = submission_service::submit_prompt(&h.state, room.id, players[0].id, "too late")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("prompt phase"));

    let image = h.seed_image(round.id, players[0].id).await;
    h.store
        .set_round_phase(
            round.id,
            RoundPhase::Results,
            std::time::SystemTime::now(),
            None,
        )
        .await
        .unwrap();
    let err = submission_service::submit_vote(&h.state, room.id, players[1].id, image.id)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("voting phase"));
}

#[tokio::test]
async fn prompt_length_bounds_are_enforced() {
    let h = harness();
    h.install_store().await;
    let (room, players) = h.seed_room(2).await;
    h.seed_round_in_phase(&room, 1, RoundPhase::Prompt).await;

    let err = submission_service::submit_prompt(&h.state, room.id, players[0].id, "ab")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("between"));

    let long = "x".repeat(201);
    let err = submission_service::submit_prompt(&h.state, room.id, players[0].id, &long)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("between"));
}

#[tokio::test]
async fn resubmitting_a_prompt_updates_in_place() {
    let h = harness();
    h.install_store().await;
    let (room, players) = h.seed_room(3).await;
    let round = h.seed_round_in_phase(&room, 1, RoundPhase::Prompt).await;

    submission_service::submit_prompt(&h.state, room.id, players[0].id, "first draft")
        .await
        .unwrap();
    submission_service::submit_prompt(&h.state, room.id, players[0].id, "second draft")
        .await
        .unwrap();

    let prompts = h.store.prompts_for_round(round.id).await.unwrap();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].text, "second draft");
    // One of three players acted; the phase must not have advanced.
    assert_eq!(h.round(round.id).await.phase, RoundPhase::Prompt);
}

#[tokio::test]
async fn disconnected_players_do_not_block_early_completion() {
    let h = harness();
    h.install_store().await;
    let (room, players) = h.seed_room(3).await;
    let round = h.seed_round_in_phase(&room, 1, RoundPhase::Prompt).await;

    // The third player dropped; the two connected players alone complete the
    // prompt phase.
    h.store
        .set_player_status(
            players[2].id,
            prompt_party_back::dao::models::PlayerStatus::Disconnected,
        )
        .await
        .unwrap();

    submission_service::submit_prompt(&h.state, room.id, players[0].id, "a quiet storm")
        .await
        .unwrap();
    submission_service::submit_prompt(&h.state, room.id, players[1].id, "a loud calm")
        .await
        .unwrap();

    assert_eq!(h.round(round.id).await.phase, RoundPhase::Generating);
}
