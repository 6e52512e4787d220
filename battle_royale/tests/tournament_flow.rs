//! End-to-end tournament lifecycle tests
//!
//! These tests drive royales from creation through completion against the
//! in-memory stores and a scripted evaluator.

mod common;

use battle_royale::events::RoyaleEvent;
use battle_royale::royale::{RoundOutcome, RoyaleError, RoyaleStatus, Standings};
use common::*;
use std::collections::HashSet;

#[tokio::test]
async fn test_three_player_tournament_end_to_end() {
    let (royales, matches) = managers();
    let mut events = royales.context().events.subscribe();
    let (royale, students) = royale_with_students(&royales, 3).await;

    let bracket = royales.start_tournament(royale.id, &admin()).await.unwrap();
    assert_eq!(bracket.total_rounds, 2);
    assert_eq!(bracket.bye_count(), 1);

    let round1 = round_matches(&royales, &royale, 1).await;
    assert_eq!(round1.len(), 2);

    let bye = round1.iter().find(|m| m.is_bye()).unwrap();
    assert!(bye.is_completed());
    assert_eq!(bye.winner, bye.player1);
    assert!(bye.question.is_none());

    let duel = round1.iter().find(|m| !m.is_bye()).unwrap();
    assert!(!duel.is_final);
    assert!(duel.question.is_some());

    let loser = identity_of(&students, &duel.player1.as_ref().unwrap().user_id);
    let finalist = identity_of(&students, &duel.player2.as_ref().unwrap().user_id);
    let champion = identity_of(&students, &bye.player1.as_ref().unwrap().user_id);

    let receipt = matches.submit(duel.id, &loser, "fail", None).await.unwrap();
    assert!(!receipt.passed);
    assert!(!receipt.decided);

    let receipt = matches
        .submit(duel.id, &finalist, "pass", Some("python"))
        .await
        .unwrap();
    assert!(receipt.passed);
    assert!(receipt.decided);
    assert_eq!(receipt.winner, Some(finalist.player()));

    let details = royales.royale_details(royale.id).await.unwrap();
    assert_eq!(details.royale.current_round, 2);

    let round2 = round_matches(&royales, &royale, 2).await;
    assert_eq!(round2.len(), 1);
    let final_match = &round2[0];
    assert!(final_match.is_final);
    assert!(final_match.has_player(&champion.user_id));
    assert!(final_match.has_player(&finalist.user_id));
    assert_ne!(
        final_match.question.as_ref().unwrap().id,
        duel.question.as_ref().unwrap().id
    );

    // A passing first submission in the final waits for the opponent
    let receipt = matches
        .submit(final_match.id, &champion, "pass", None)
        .await
        .unwrap();
    assert!(!receipt.decided);

    let receipt = matches
        .submit(final_match.id, &finalist, "fail", None)
        .await
        .unwrap();
    assert!(receipt.decided);
    assert_eq!(receipt.winner, Some(champion.player()));

    let details = royales.royale_details(royale.id).await.unwrap();
    assert_eq!(details.royale.status, RoyaleStatus::Completed);
    assert_eq!(details.royale.winner, Some(champion.player()));
    for p in &details.participants {
        if p.user_id == champion.user_id {
            assert_eq!(p.eliminated_in_round, None);
        } else if p.user_id == loser.user_id {
            assert_eq!(p.eliminated_in_round, Some(1));
        } else {
            assert_eq!(p.eliminated_in_round, Some(2));
        }
    }

    let standings = Standings::new(royales.context().store.clone());
    let page = standings.leaderboard(None, None).await.unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.entries[0].rank, 1);
    assert_eq!(page.entries[0].record.user_id, champion.user_id);
    assert_eq!(page.entries[0].record.points, 100);
    assert_eq!(page.entries[0].record.wins, 1);

    let stats = standings.user_stats(&loser.user_id).await.unwrap();
    assert_eq!(stats.rank, Some(2));
    assert_eq!(stats.points, 0);
    assert_eq!(stats.losses, 1);
    assert_eq!(stats.tournaments_played, 1);

    let mut saw_start = false;
    let mut saw_complete = false;
    while let Ok(envelope) = events.try_recv() {
        match envelope.event {
            RoyaleEvent::TournamentStarting { .. } => saw_start = true,
            RoyaleEvent::TournamentComplete { winner, points_awarded } => {
                assert_eq!(winner, champion.player());
                assert_eq!(points_awarded.len(), 3);
                saw_complete = true;
            }
            _ => {}
        }
    }
    assert!(saw_start);
    assert!(saw_complete);
}

#[tokio::test]
async fn test_two_player_royale_is_first_to_pass() {
    let (royales, matches) = managers();
    let (royale, students) = royale_with_students(&royales, 2).await;
    royales.start_tournament(royale.id, &admin()).await.unwrap();

    let round1 = round_matches(&royales, &royale, 1).await;
    assert_eq!(round1.len(), 1);
    let duel = &round1[0];
    assert!(!duel.is_final);

    let first = identity_of(&students, &duel.player1.as_ref().unwrap().user_id);
    let second = identity_of(&students, &duel.player2.as_ref().unwrap().user_id);

    let receipt = matches.submit(duel.id, &second, "pass", None).await.unwrap();
    assert!(receipt.decided);
    assert_eq!(receipt.winner, Some(second.player()));

    let err = matches.submit(duel.id, &first, "pass", None).await.unwrap_err();
    assert!(matches!(err, RoyaleError::MatchNotActive));

    let royale = royales.find_royale(royale.id).await.unwrap();
    assert_eq!(royale.status, RoyaleStatus::Completed);
    assert_eq!(royale.winner, Some(second.player()));
}

#[tokio::test]
async fn test_two_player_royale_stays_open_while_nobody_passes() {
    let (royales, matches) = managers();
    let (royale, students) = royale_with_students(&royales, 2).await;
    royales.start_tournament(royale.id, &admin()).await.unwrap();

    let duel = round_matches(&royales, &royale, 1).await.remove(0);
    let first = identity_of(&students, &duel.player1.as_ref().unwrap().user_id);
    let second = identity_of(&students, &duel.player2.as_ref().unwrap().user_id);

    let receipt = matches
        .submit(duel.id, &second, "partial:1", None)
        .await
        .unwrap();
    assert!(!receipt.decided);
    let receipt = matches.submit(duel.id, &first, "fail", None).await.unwrap();
    assert!(!receipt.decided);

    let royale = royales.find_royale(royale.id).await.unwrap();
    assert_eq!(royale.status, RoyaleStatus::InProgress);
}

#[tokio::test]
async fn test_passing_after_opponent_failed_wins() {
    let (royales, matches) = managers();
    let (royale, students) = royale_with_students(&royales, 2).await;
    royales.start_tournament(royale.id, &admin()).await.unwrap();

    let duel = round_matches(&royales, &royale, 1).await.remove(0);
    let first = identity_of(&students, &duel.player1.as_ref().unwrap().user_id);
    let second = identity_of(&students, &duel.player2.as_ref().unwrap().user_id);

    matches.submit(duel.id, &first, "fail", None).await.unwrap();
    let receipt = matches
        .submit(duel.id, &second, "pass;O(n²)", None)
        .await
        .unwrap();

    assert_eq!(receipt.complexity, "O(n²)");
    assert_eq!(receipt.winner, Some(second.player()));
}

#[tokio::test]
async fn test_round_check_is_idempotent() {
    let (royales, matches) = managers();
    let (royale, students) = royale_with_students(&royales, 4).await;
    royales.start_tournament(royale.id, &admin()).await.unwrap();

    assert_eq!(
        royales.check_round_completion(royale.id, 1).await.unwrap(),
        RoundOutcome::Pending
    );

    for m in round_matches(&royales, &royale, 1).await {
        let winner = identity_of(&students, &m.player1.as_ref().unwrap().user_id);
        matches.submit(m.id, &winner, "pass", None).await.unwrap();
    }

    let royale_now = royales.find_royale(royale.id).await.unwrap();
    assert_eq!(royale_now.current_round, 2);

    assert_eq!(
        royales.check_round_completion(royale.id, 1).await.unwrap(),
        RoundOutcome::Unchanged
    );
    assert_eq!(
        royales.check_round_completion(royale.id, 1).await.unwrap(),
        RoundOutcome::Unchanged
    );
    assert_eq!(round_matches(&royales, &royale, 2).await.len(), 1);
}

#[tokio::test]
async fn test_questions_are_distinct_within_a_round() {
    let (royales, _) = managers();
    let (royale, _) = royale_with_students(&royales, 6).await;
    royales.start_tournament(royale.id, &admin()).await.unwrap();

    let duels: Vec<_> = round_matches(&royales, &royale, 1)
        .await
        .into_iter()
        .filter(|m| !m.is_bye())
        .collect();
    let ids: HashSet<_> = duels
        .iter()
        .map(|m| m.question.as_ref().unwrap().id.clone())
        .collect();
    assert_eq!(ids.len(), duels.len());
}

#[tokio::test]
async fn test_countdown_start() {
    let (royales, _) = managers();
    let mut events = royales.context().events.subscribe();
    let (royale, _) = royale_with_students(&royales, 2).await;

    let handle = royales
        .start_after_countdown(royale.id, Some(&admin()))
        .await
        .unwrap();
    let bracket = handle.await.unwrap().unwrap();
    assert_eq!(bracket.total_rounds, 1);

    let mut ticks = Vec::new();
    while let Ok(envelope) = events.try_recv() {
        if let RoyaleEvent::Countdown { seconds_left } = envelope.event {
            ticks.push(seconds_left);
        }
    }
    assert_eq!(ticks, vec![1]);

    let err = royales
        .start_after_countdown(royale.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, RoyaleError::AlreadyStarted));
}

#[tokio::test]
async fn test_countdown_rejects_lone_player_up_front() {
    let (royales, _) = managers();
    let mut events = royales.context().events.subscribe();
    let (royale, _) = royale_with_students(&royales, 1).await;

    let err = royales
        .start_after_countdown(royale.id, Some(&admin()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RoyaleError::InsufficientPlayers {
            needed: 2,
            current: 1
        }
    ));

    while let Ok(envelope) = events.try_recv() {
        assert!(!matches!(
            envelope.event,
            RoyaleEvent::Countdown { .. } | RoyaleEvent::Error { .. }
        ));
    }
    let royale = royales.find_royale(royale.id).await.unwrap();
    assert_eq!(royale.status, RoyaleStatus::Waiting);
}

#[tokio::test]
async fn test_only_one_countdown_runs_per_royale() {
    let (royales, _) = managers();
    let mut events = royales.context().events.subscribe();
    let (royale, _) = royale_with_students(&royales, 3).await;

    let admin_user = admin();
    let (first, second) = tokio::join!(
        royales.start_after_countdown(royale.id, Some(&admin_user)),
        royales.start_after_countdown(royale.id, None),
    );
    let (handle, err) = match (first, second) {
        (Ok(handle), Err(err)) | (Err(err), Ok(handle)) => (handle, err),
        other => panic!("expected exactly one countdown, got {other:?}"),
    };
    assert!(matches!(err, RoyaleError::StartInProgress));

    let bracket = handle.await.unwrap().unwrap();
    assert_eq!(bracket.total_rounds, 2);

    let mut ticks = 0;
    while let Ok(envelope) = events.try_recv() {
        match envelope.event {
            RoyaleEvent::Countdown { .. } => ticks += 1,
            RoyaleEvent::Error { message } => panic!("unexpected room error: {message}"),
            _ => {}
        }
    }
    assert_eq!(ticks, 1);

    // Once started, later attempts see the royale as started
    let err = royales
        .start_after_countdown(royale.id, Some(&admin()))
        .await
        .unwrap_err();
    assert!(matches!(err, RoyaleError::AlreadyStarted));
}

#[tokio::test]
async fn test_stalled_match_forfeits_to_best_attempt() {
    let (royales, matches) = managers();
    let (royale, students) = royale_with_students(&royales, 2).await;
    royales.start_tournament(royale.id, &admin()).await.unwrap();

    let stalled = round_matches(&royales, &royale, 1).await.remove(0);
    let second = identity_of(&students, &stalled.player2.as_ref().unwrap().user_id);
    matches
        .submit(stalled.id, &second, "partial:1", None)
        .await
        .unwrap();

    // Not yet expired
    let report = matches.sweep_expired().await.unwrap();
    assert_eq!(report.resolved, 0);

    let later = chrono::Utc::now() + chrono::Duration::seconds(601);
    let report = matches.sweep_expired_at(later).await.unwrap();
    assert_eq!(report.resolved, 1);

    let royale = royales.find_royale(royale.id).await.unwrap();
    assert_eq!(royale.status, RoyaleStatus::Completed);
    assert_eq!(royale.winner, Some(second.player()));

    let report = matches.sweep_expired_at(later).await.unwrap();
    assert_eq!(report.resolved, 0);
}

#[tokio::test]
async fn test_stalled_match_without_attempts_goes_to_first_slot() {
    let (royales, matches) = managers();
    let (royale, _) = royale_with_students(&royales, 2).await;
    royales.start_tournament(royale.id, &admin()).await.unwrap();

    let stalled = round_matches(&royales, &royale, 1).await.remove(0);
    assert!(matches.resolve_expired(stalled.id).await.unwrap());
    assert!(!matches.resolve_expired(stalled.id).await.unwrap());

    let royale = royales.find_royale(royale.id).await.unwrap();
    assert_eq!(royale.winner, stalled.player1);
}
