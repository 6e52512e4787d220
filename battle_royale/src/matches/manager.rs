//! Match lifecycle: submissions, winner resolution and stalled-match sweeps.

use super::models::{Match, MatchId, NewSubmission, Submission, SubmissionReceipt};
use super::resolution::{Attempt, Side, decide_final, decide_forfeit};
use crate::context::RoyaleContext;
use crate::coordination::keys;
use crate::evaluator::{ComplexityEstimate, GradeReport, GradingError, Language};
use crate::events::RoyaleEvent;
use crate::identity::{Identity, Player};
use crate::questions::TestCase;
use crate::royale::{RoyaleError, RoyaleManager, RoyaleResult};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

/// What a sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Expired matches resolved by forfeit
    pub resolved: usize,
    /// Royales whose round check was re-run
    pub resumed: usize,
}

/// Drives matches from submission to completion
#[derive(Clone)]
pub struct MatchManager {
    ctx: RoyaleContext,
    royales: RoyaleManager,
}

impl MatchManager {
    pub fn new(royales: RoyaleManager) -> Self {
        Self {
            ctx: royales.context().clone(),
            royales,
        }
    }

    pub async fn find_match(&self, match_id: MatchId) -> RoyaleResult<Match> {
        self.ctx
            .store
            .find_match(match_id)
            .await?
            .ok_or(RoyaleError::MatchNotFound(match_id))
    }

    /// Grade and record a solution, resolving the match when it is decided.
    ///
    /// Grading failures persist nothing, so the player may retry.
    pub async fn submit(
        &self,
        match_id: MatchId,
        identity: &Identity,
        code: &str,
        language: Option<&str>,
    ) -> RoyaleResult<SubmissionReceipt> {
        if code.trim().is_empty() {
            return Err(RoyaleError::Validation("Code is required".to_string()));
        }
        let language = Language::parse(language);

        let m = self.find_match(match_id).await?;
        if m.is_completed() || m.is_bye() {
            return Err(RoyaleError::MatchNotActive);
        }
        if !m.has_player(&identity.user_id) {
            return Err(RoyaleError::NotAParticipant);
        }
        if self
            .ctx
            .store
            .has_submitted(match_id, &identity.user_id)
            .await?
        {
            return Err(RoyaleError::AlreadySubmitted);
        }

        let elapsed_ms = self.elapsed_ms(&m).await;
        let test_cases = m
            .question
            .as_ref()
            .map(|q| q.test_cases.as_slice())
            .unwrap_or_default();

        let (report, estimate) = self.grade(code, language, test_cases).await?;

        let submission = self
            .ctx
            .store
            .insert_submission(NewSubmission {
                match_id,
                player: identity.player(),
                code: code.to_string(),
                language,
                report,
                elapsed_ms,
                complexity: estimate.class,
            })
            .await?;

        debug!(
            "{} submitted to match {}: {}/{} in {} ms",
            identity.username,
            match_id,
            submission.passed_count,
            submission.total_count,
            elapsed_ms
        );

        if let Some(opponent) = m.opponent_of(&identity.user_id) {
            let percentage = if submission.total_count == 0 {
                0
            } else {
                submission.passed_count * 100 / submission.total_count
            };
            self.ctx.events.to_user(
                m.royale_id,
                opponent.user_id.clone(),
                RoyaleEvent::OpponentProgress {
                    match_id,
                    percentage,
                },
            );
        }

        let winner = self.resolve(&m, &submission).await?;
        let decided = match &winner {
            Some(winner) => self.finish_match(&m, winner, false).await?,
            None => false,
        };

        Ok(SubmissionReceipt {
            match_id,
            passed: submission.passed,
            output: submission.output,
            passed_count: submission.passed_count,
            total_count: submission.total_count,
            elapsed_ms,
            complexity: submission.complexity.label().to_string(),
            decided,
            winner: if decided { winner } else { None },
        })
    }

    /// Elapsed time since the match began, preferring the cached start
    async fn elapsed_ms(&self, m: &Match) -> i64 {
        let now = Utc::now();
        let cached = match self.ctx.coordination.get(&keys::match_started(m.id)).await {
            Ok(value) => value.and_then(|raw| raw.parse::<i64>().ok()),
            Err(e) => {
                warn!("Match start cache unavailable for {}: {}", m.id, e);
                None
            }
        };

        let started_ms = cached.or_else(|| m.started_at.map(|t| t.timestamp_millis()));
        started_ms
            .map(|start| (now.timestamp_millis() - start).max(0))
            .unwrap_or(0)
    }

    async fn grade(
        &self,
        code: &str,
        language: Language,
        test_cases: &[TestCase],
    ) -> RoyaleResult<(GradeReport, ComplexityEstimate)> {
        let limit = self.ctx.config.grading_timeout;
        let evaluator = &self.ctx.evaluator;

        let graded = tokio::time::timeout(limit, async {
            let report = evaluator.grade(code, language, test_cases).await?;
            let estimate = evaluator.estimate_complexity(code, language).await?;
            Ok::<_, GradingError>((report, estimate))
        })
        .await
        .map_err(|_| GradingError::Timeout(limit))??;

        Ok(graded)
    }

    /// Winner decided by this submission, if any
    async fn resolve(&self, m: &Match, latest: &Submission) -> RoyaleResult<Option<Player>> {
        if !m.is_final {
            return Ok(latest.passed.then(|| latest.player()));
        }

        let submissions = self.ctx.store.submissions(m.id).await?;
        let (Some(p1), Some(p2)) = (&m.player1, &m.player2) else {
            return Ok(None);
        };
        let first = submissions.iter().find(|s| s.user_id == p1.user_id);
        let second = submissions.iter().find(|s| s.user_id == p2.user_id);

        Ok(match (first, second) {
            (Some(a), Some(b)) => Some(
                match decide_final(&Attempt::from(a), &Attempt::from(b)) {
                    Side::Player1 => p1.clone(),
                    Side::Player2 => p2.clone(),
                },
            ),
            _ => None,
        })
    }

    /// Complete the match exactly once and notify. Returns false if another
    /// caller completed it first.
    pub async fn finish_match(
        &self,
        m: &Match,
        winner: &Player,
        forfeit: bool,
    ) -> RoyaleResult<bool> {
        if !self.ctx.store.complete_match(m.id, winner).await? {
            debug!("Match {} was already completed", m.id);
            return Ok(false);
        }

        if let Err(e) = self.ctx.coordination.delete(&keys::match_started(m.id)).await {
            warn!("Failed to clear start of match {}: {}", m.id, e);
        }

        self.ctx.events.to_royale(
            m.royale_id,
            RoyaleEvent::MatchResult {
                match_id: m.id,
                round: m.round,
                winner: winner.clone(),
                forfeit,
            },
        );
        if let Some(loser) = m.opponent_of(&winner.user_id) {
            self.ctx.events.to_user(
                m.royale_id,
                loser.user_id.clone(),
                RoyaleEvent::Eliminated {
                    round: m.round,
                    defeated_by: winner.clone(),
                },
            );
        }

        info!(
            "Match {} (round {}) won by {}{}",
            m.id,
            m.round,
            winner.username,
            if forfeit { " by forfeit" } else { "" }
        );

        if let Err(e) = self
            .royales
            .check_round_completion(m.royale_id, m.round)
            .await
        {
            warn!(
                "Round check of royale {} after match {} failed: {}",
                m.royale_id, m.id, e
            );
        }

        Ok(true)
    }

    /// Resolve an active match by forfeit rules. Returns whether this call completed it.
    pub async fn resolve_expired(&self, match_id: MatchId) -> RoyaleResult<bool> {
        let m = self.find_match(match_id).await?;
        if m.is_completed() {
            return Ok(false);
        }
        let (Some(p1), Some(p2)) = (&m.player1, &m.player2) else {
            return Ok(false);
        };

        let submissions = self.ctx.store.submissions(match_id).await?;
        let attempt_of = |user_id: &str| {
            submissions
                .iter()
                .find(|s| s.user_id == user_id)
                .map(Attempt::from)
        };
        let first = attempt_of(&p1.user_id);
        let second = attempt_of(&p2.user_id);

        let winner = match decide_forfeit(first.as_ref(), second.as_ref()) {
            Side::Player1 => p1.clone(),
            Side::Player2 => p2.clone(),
        };

        self.finish_match(&m, &winner, true).await
    }

    /// Forfeit matches active past the match timeout, then re-run the round
    /// check for every royale still in progress.
    pub async fn sweep_expired(&self) -> RoyaleResult<SweepReport> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Sweep as if the current time were `now`
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> RoyaleResult<SweepReport> {
        let timeout = chrono::Duration::from_std(self.ctx.config.match_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(600));
        let cutoff = now - timeout;

        let mut report = SweepReport::default();
        for m in self.ctx.store.expired_matches(cutoff).await? {
            match self.resolve_expired(m.id).await {
                Ok(true) => report.resolved += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to resolve expired match {}: {}", m.id, e),
            }
        }

        for royale in self.ctx.store.royales_in_progress().await? {
            match self
                .royales
                .check_round_completion(royale.id, royale.current_round)
                .await
            {
                Ok(_) => report.resumed += 1,
                Err(e) => warn!("Round check of royale {} failed: {}", royale.id, e),
            }
        }

        if report.resolved > 0 {
            info!("Sweep forfeited {} stalled matches", report.resolved);
        }
        Ok(report)
    }
}
