//! Durable royale store.
//!
//! `RoyaleStore` is the single source of truth for royales, participants,
//! matches, submissions and points. The transitions `start_royale`,
//! `complete_match`, `advance_round` and `complete_royale` are atomic and
//! conditional: each reports whether this caller performed it, so racing
//! callers observe a no-op instead of a double transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use super::timeouts::{TimeoutError, with_default_timeout, with_transaction_timeout};
use crate::evaluator::{ComplexityClass, Language};
use crate::identity::{Identity, Player, Role};
use crate::matches::{Match, MatchId, MatchStatus, NewMatch, NewSubmission, Submission};
use crate::questions::Question;
use crate::royale::models::{
    Difficulty, NewRoyale, Participant, PointsAward, PointsRecord, RankedPoints, Royale,
    RoyaleId, RoyaleStatus, Visibility,
};
use crate::royale::{RoyaleError, RoyaleResult};

/// Trait for tournament persistence
#[async_trait]
pub trait RoyaleStore: Send + Sync {
    /// Insert a royale in `waiting` state. A join code clash yields `DuplicateCode`.
    async fn insert_royale(&self, royale: NewRoyale) -> RoyaleResult<Royale>;

    async fn find_royale(&self, royale_id: RoyaleId) -> RoyaleResult<Option<Royale>>;

    async fn find_royale_by_code(&self, code: &str) -> RoyaleResult<Option<Royale>>;

    /// Add a participant, checking state, duplicates and capacity atomically.
    /// Returns the participant count after the insert.
    async fn add_participant(&self, royale_id: RoyaleId, identity: &Identity)
    -> RoyaleResult<u32>;

    /// Remove a participant while the royale is waiting. Returns the remaining count.
    async fn remove_participant(&self, royale_id: RoyaleId, user_id: &str) -> RoyaleResult<u32>;

    /// Participants in join order
    async fn participants(&self, royale_id: RoyaleId) -> RoyaleResult<Vec<Participant>>;

    async fn set_connected(
        &self,
        royale_id: RoyaleId,
        user_id: &str,
        connected: bool,
    ) -> RoyaleResult<bool>;

    /// Move a waiting royale to round one and persist its first matches.
    /// Returns None when the royale was no longer waiting.
    async fn start_royale(
        &self,
        royale_id: RoyaleId,
        total_rounds: u32,
        matches: Vec<NewMatch>,
    ) -> RoyaleResult<Option<Vec<Match>>>;

    async fn find_match(&self, match_id: MatchId) -> RoyaleResult<Option<Match>>;

    /// All matches ordered by round then index
    async fn matches(&self, royale_id: RoyaleId) -> RoyaleResult<Vec<Match>>;

    async fn round_matches(&self, royale_id: RoyaleId, round: u32) -> RoyaleResult<Vec<Match>>;

    /// Active matches started before `started_before`
    async fn expired_matches(&self, started_before: DateTime<Utc>) -> RoyaleResult<Vec<Match>>;

    async fn royales_in_progress(&self) -> RoyaleResult<Vec<Royale>>;

    /// Record a submission on an active match. (match, user) is unique.
    async fn insert_submission(&self, submission: NewSubmission) -> RoyaleResult<Submission>;

    /// Submissions in submission order
    async fn submissions(&self, match_id: MatchId) -> RoyaleResult<Vec<Submission>>;

    async fn has_submitted(&self, match_id: MatchId, user_id: &str) -> RoyaleResult<bool>;

    /// Complete an active match and eliminate the loser in one step.
    /// Returns false when the match was not active.
    async fn complete_match(&self, match_id: MatchId, winner: &Player) -> RoyaleResult<bool>;

    /// Persist the next round's matches and bump `current_round` from
    /// `from_round`. Returns None when the royale already moved on.
    async fn advance_round(
        &self,
        royale_id: RoyaleId,
        from_round: u32,
        matches: Vec<NewMatch>,
    ) -> RoyaleResult<Option<Vec<Match>>>;

    /// Complete an in-progress royale and settle points for every participant.
    /// Returns None when the royale was not in progress.
    async fn complete_royale(
        &self,
        royale_id: RoyaleId,
        winner: &Player,
        winner_points: i64,
    ) -> RoyaleResult<Option<Vec<PointsAward>>>;

    /// Points ordered by points descending, with the total number of records
    async fn leaderboard(&self, limit: u32, offset: u32)
    -> RoyaleResult<(Vec<RankedPoints>, u64)>;

    async fn user_points(&self, user_id: &str) -> RoyaleResult<Option<RankedPoints>>;

    async fn health_check(&self) -> RoyaleResult<()>;
}

/// Default PostgreSQL implementation of `RoyaleStore`
#[derive(Clone)]
pub struct PgRoyaleStore {
    pool: PgPool,
}

impl PgRoyaleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn corrupt(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("unexpected value in {column}: {value}"))
}

fn player_columns(row: &PgRow, id_col: &str, name_col: &str) -> Result<Option<Player>, sqlx::Error> {
    let id: Option<String> = row.try_get(id_col)?;
    let name: Option<String> = row.try_get(name_col)?;
    Ok(id.map(|id| Player::new(id, name.unwrap_or_default())))
}

fn royale_from_row(row: &PgRow) -> Result<Royale, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Royale {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        title: row.try_get("title")?,
        creator: Player::new(
            row.try_get::<String, _>("created_by")?,
            row.try_get::<String, _>("creator_username")?,
        ),
        creator_role: Role::parse(row.try_get::<String, _>("creator_role")?.as_str()),
        difficulty: Difficulty::parse(row.try_get::<String, _>("difficulty")?.as_str()),
        visibility: Visibility::parse(row.try_get::<String, _>("type")?.as_str()),
        status: RoyaleStatus::parse(&status).ok_or_else(|| corrupt("status", &status))?,
        max_players: row.try_get::<i32, _>("max_players")? as u32,
        current_round: row.try_get::<i32, _>("current_round")? as u32,
        total_rounds: row.try_get::<i32, _>("total_rounds")? as u32,
        winner: player_columns(row, "winner_id", "winner_username")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn participant_from_row(row: &PgRow) -> Result<Participant, sqlx::Error> {
    Ok(Participant {
        royale_id: row.try_get("royale_id")?,
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        role: Role::parse(row.try_get::<String, _>("role")?.as_str()),
        is_connected: row.try_get("is_connected")?,
        eliminated_in_round: row
            .try_get::<Option<i32>, _>("eliminated_in_round")?
            .map(|r| r as u32),
        joined_at: row.try_get("joined_at")?,
    })
}

fn match_from_row(row: &PgRow) -> Result<Match, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Match {
        id: row.try_get("id")?,
        royale_id: row.try_get("royale_id")?,
        round: row.try_get::<i32, _>("round_number")? as u32,
        match_index: row.try_get::<i32, _>("match_index")? as u32,
        player1: player_columns(row, "player1_id", "player1_username")?,
        player2: player_columns(row, "player2_id", "player2_username")?,
        question: row
            .try_get::<Option<Json<Question>>, _>("question")?
            .map(|q| q.0),
        is_final: row.try_get("is_final")?,
        status: MatchStatus::parse(&status).ok_or_else(|| corrupt("status", &status))?,
        winner: player_columns(row, "winner_id", "winner_username")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn submission_from_row(row: &PgRow) -> Result<Submission, sqlx::Error> {
    let language: String = row.try_get("language")?;
    let complexity: Option<String> = row.try_get("time_complexity")?;
    Ok(Submission {
        id: row.try_get("id")?,
        match_id: row.try_get("match_id")?,
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        code: row.try_get("code")?,
        language: Language::parse(Some(&language)),
        passed: row.try_get("passed")?,
        output: row.try_get::<Option<String>, _>("output")?.unwrap_or_default(),
        passed_count: row.try_get::<i32, _>("passed_count")? as u32,
        total_count: row.try_get::<i32, _>("total_count")? as u32,
        elapsed_ms: row.try_get("time_taken_ms")?,
        complexity: complexity
            .as_deref()
            .map(ComplexityClass::from_label)
            .unwrap_or(ComplexityClass::Unknown),
        submitted_at: row.try_get("submitted_at")?,
        sequence: row.try_get("seq")?,
    })
}

fn points_from_row(row: &PgRow) -> Result<PointsRecord, sqlx::Error> {
    Ok(PointsRecord {
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        points: row.try_get("points")?,
        wins: row.try_get("wins")?,
        losses: row.try_get("losses")?,
        tournaments_played: row.try_get("tournaments_played")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn insert_match(conn: &mut PgConnection, m: &Match) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO matches (id, royale_id, round_number, match_index, player1_id, player1_username,
                             player2_id, player2_username, winner_id, winner_username, question,
                             is_final, status, started_at, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(m.id)
    .bind(m.royale_id)
    .bind(m.round as i32)
    .bind(m.match_index as i32)
    .bind(m.player1.as_ref().map(|p| p.user_id.as_str()))
    .bind(m.player1.as_ref().map(|p| p.username.as_str()))
    .bind(m.player2.as_ref().map(|p| p.user_id.as_str()))
    .bind(m.player2.as_ref().map(|p| p.username.as_str()))
    .bind(m.winner.as_ref().map(|p| p.user_id.as_str()))
    .bind(m.winner.as_ref().map(|p| p.username.as_str()))
    .bind(m.question.as_ref().map(Json))
    .bind(m.is_final)
    .bind(m.status.as_str())
    .bind(m.started_at)
    .bind(m.completed_at)
    .execute(conn)
    .await?;
    Ok(())
}

/// Lock the royale row and return its status and capacity
async fn lock_royale(
    conn: &mut PgConnection,
    royale_id: RoyaleId,
) -> RoyaleResult<(RoyaleStatus, u32)> {
    let row = sqlx::query("SELECT status, max_players FROM battle_royales WHERE id = $1 FOR UPDATE")
        .bind(royale_id)
        .fetch_optional(conn)
        .await?
        .ok_or(RoyaleError::RoyaleNotFound(royale_id))?;

    let status: String = row.try_get("status")?;
    let status = RoyaleStatus::parse(&status).ok_or_else(|| corrupt("status", &status))?;
    Ok((status, row.try_get::<i32, _>("max_players")? as u32))
}

async fn participant_count(conn: &mut PgConnection, royale_id: RoyaleId) -> RoyaleResult<u32> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM battle_royale_participants WHERE royale_id = $1")
            .bind(royale_id)
            .fetch_one(conn)
            .await?;
    Ok(count as u32)
}

#[async_trait]
impl RoyaleStore for PgRoyaleStore {
    async fn insert_royale(&self, royale: NewRoyale) -> RoyaleResult<Royale> {
        let result = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO battle_royales (id, code, title, created_by, creator_username, creator_role,
                                            difficulty, type, status, max_players)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'waiting', $9)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&royale.code)
            .bind(&royale.title)
            .bind(&royale.creator.user_id)
            .bind(&royale.creator.username)
            .bind(royale.creator_role.as_str())
            .bind(royale.difficulty.as_str())
            .bind(royale.visibility.as_str())
            .bind(royale.max_players as i32)
            .fetch_one(&self.pool),
        )
        .await;

        match result {
            Ok(row) => Ok(royale_from_row(&row)?),
            Err(TimeoutError::Database(e)) if is_unique_violation(&e) => {
                Err(RoyaleError::DuplicateCode)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_royale(&self, royale_id: RoyaleId) -> RoyaleResult<Option<Royale>> {
        let row = with_default_timeout(
            sqlx::query("SELECT * FROM battle_royales WHERE id = $1")
                .bind(royale_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(royale_from_row).transpose()?)
    }

    async fn find_royale_by_code(&self, code: &str) -> RoyaleResult<Option<Royale>> {
        let row = with_default_timeout(
            sqlx::query("SELECT * FROM battle_royales WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(royale_from_row).transpose()?)
    }

    async fn add_participant(
        &self,
        royale_id: RoyaleId,
        identity: &Identity,
    ) -> RoyaleResult<u32> {
        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let (status, max_players) = lock_royale(&mut tx, royale_id).await?;
            if status != RoyaleStatus::Waiting {
                return Err(RoyaleError::InvalidState {
                    expected: RoyaleStatus::Waiting,
                    actual: status,
                });
            }

            let existing = sqlx::query(
                "SELECT 1 FROM battle_royale_participants WHERE royale_id = $1 AND user_id = $2",
            )
            .bind(royale_id)
            .bind(&identity.user_id)
            .fetch_optional(&mut *tx)
            .await?;
            if existing.is_some() {
                return Err(RoyaleError::AlreadyJoined);
            }

            let count = participant_count(&mut tx, royale_id).await?;
            if count >= max_players {
                return Err(RoyaleError::RoomFull);
            }

            sqlx::query(
                r#"
                INSERT INTO battle_royale_participants (royale_id, user_id, username, role)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(royale_id)
            .bind(&identity.user_id)
            .bind(&identity.username)
            .bind(identity.role.as_str())
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok::<_, RoyaleError>(count + 1)
        })
        .await
    }

    async fn remove_participant(&self, royale_id: RoyaleId, user_id: &str) -> RoyaleResult<u32> {
        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let (status, _) = lock_royale(&mut tx, royale_id).await?;
            if status != RoyaleStatus::Waiting {
                return Err(RoyaleError::InvalidState {
                    expected: RoyaleStatus::Waiting,
                    actual: status,
                });
            }

            let removed = sqlx::query(
                "DELETE FROM battle_royale_participants WHERE royale_id = $1 AND user_id = $2",
            )
            .bind(royale_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            if removed.rows_affected() == 0 {
                return Err(RoyaleError::NotJoined);
            }

            let count = participant_count(&mut tx, royale_id).await?;
            tx.commit().await?;
            Ok::<_, RoyaleError>(count)
        })
        .await
    }

    async fn participants(&self, royale_id: RoyaleId) -> RoyaleResult<Vec<Participant>> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT * FROM battle_royale_participants WHERE royale_id = $1 ORDER BY joined_at, id",
            )
            .bind(royale_id)
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows
            .iter()
            .map(participant_from_row)
            .collect::<Result<_, _>>()?)
    }

    async fn set_connected(
        &self,
        royale_id: RoyaleId,
        user_id: &str,
        connected: bool,
    ) -> RoyaleResult<bool> {
        let result = with_default_timeout(
            sqlx::query(
                "UPDATE battle_royale_participants SET is_connected = $3 WHERE royale_id = $1 AND user_id = $2",
            )
            .bind(royale_id)
            .bind(user_id)
            .bind(connected)
            .execute(&self.pool),
        )
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn start_royale(
        &self,
        royale_id: RoyaleId,
        total_rounds: u32,
        matches: Vec<NewMatch>,
    ) -> RoyaleResult<Option<Vec<Match>>> {
        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE battle_royales
                SET status = 'in_progress', current_round = 1, total_rounds = $2,
                    started_at = NOW(), updated_at = NOW()
                WHERE id = $1 AND status = 'waiting'
                "#,
            )
            .bind(royale_id)
            .bind(total_rounds as i32)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Ok(None);
            }

            let now = Utc::now();
            let mut created = Vec::with_capacity(matches.len());
            for new_match in matches {
                let m = new_match.into_match(royale_id, now);
                insert_match(&mut tx, &m).await?;
                created.push(m);
            }

            tx.commit().await?;
            Ok::<_, RoyaleError>(Some(created))
        })
        .await
    }

    async fn find_match(&self, match_id: MatchId) -> RoyaleResult<Option<Match>> {
        let row = with_default_timeout(
            sqlx::query("SELECT * FROM matches WHERE id = $1")
                .bind(match_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.as_ref().map(match_from_row).transpose()?)
    }

    async fn matches(&self, royale_id: RoyaleId) -> RoyaleResult<Vec<Match>> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT * FROM matches WHERE royale_id = $1 ORDER BY round_number, match_index",
            )
            .bind(royale_id)
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.iter().map(match_from_row).collect::<Result<_, _>>()?)
    }

    async fn round_matches(&self, royale_id: RoyaleId, round: u32) -> RoyaleResult<Vec<Match>> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT * FROM matches WHERE royale_id = $1 AND round_number = $2 ORDER BY match_index",
            )
            .bind(royale_id)
            .bind(round as i32)
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.iter().map(match_from_row).collect::<Result<_, _>>()?)
    }

    async fn expired_matches(&self, started_before: DateTime<Utc>) -> RoyaleResult<Vec<Match>> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT * FROM matches WHERE status = 'active' AND started_at < $1 ORDER BY started_at",
            )
            .bind(started_before)
            .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.iter().map(match_from_row).collect::<Result<_, _>>()?)
    }

    async fn royales_in_progress(&self) -> RoyaleResult<Vec<Royale>> {
        let rows = with_default_timeout(
            sqlx::query("SELECT * FROM battle_royales WHERE status = 'in_progress'")
                .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows.iter().map(royale_from_row).collect::<Result<_, _>>()?)
    }

    async fn insert_submission(&self, submission: NewSubmission) -> RoyaleResult<Submission> {
        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let status: Option<String> =
                sqlx::query_scalar("SELECT status FROM matches WHERE id = $1 FOR SHARE")
                    .bind(submission.match_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match status.as_deref() {
                None => return Err(RoyaleError::MatchNotFound(submission.match_id)),
                Some("active") => {}
                Some(_) => return Err(RoyaleError::MatchNotActive),
            }

            let inserted = sqlx::query(
                r#"
                INSERT INTO submissions (id, match_id, user_id, username, code, language, passed,
                                         output, passed_count, total_count, time_taken_ms, time_complexity)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(submission.match_id)
            .bind(&submission.player.user_id)
            .bind(&submission.player.username)
            .bind(&submission.code)
            .bind(submission.language.as_str())
            .bind(submission.report.passed)
            .bind(&submission.report.output)
            .bind(submission.report.passed_count as i32)
            .bind(submission.report.total_count as i32)
            .bind(submission.elapsed_ms)
            .bind(submission.complexity.label())
            .fetch_one(&mut *tx)
            .await;

            let row = match inserted {
                Ok(row) => row,
                Err(e) if is_unique_violation(&e) => return Err(RoyaleError::AlreadySubmitted),
                Err(e) => return Err(e.into()),
            };

            let recorded = submission_from_row(&row)?;
            tx.commit().await?;
            Ok::<_, RoyaleError>(recorded)
        })
        .await
    }

    async fn submissions(&self, match_id: MatchId) -> RoyaleResult<Vec<Submission>> {
        let rows = with_default_timeout(
            sqlx::query("SELECT * FROM submissions WHERE match_id = $1 ORDER BY submitted_at, seq")
                .bind(match_id)
                .fetch_all(&self.pool),
        )
        .await?;

        Ok(rows
            .iter()
            .map(submission_from_row)
            .collect::<Result<_, _>>()?)
    }

    async fn has_submitted(&self, match_id: MatchId, user_id: &str) -> RoyaleResult<bool> {
        let row = with_default_timeout(
            sqlx::query("SELECT 1 FROM submissions WHERE match_id = $1 AND user_id = $2")
                .bind(match_id)
                .bind(user_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.is_some())
    }

    async fn complete_match(&self, match_id: MatchId, winner: &Player) -> RoyaleResult<bool> {
        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let row = sqlx::query(
                r#"
                UPDATE matches
                SET status = 'completed', winner_id = $2, winner_username = $3, completed_at = NOW()
                WHERE id = $1 AND status = 'active'
                RETURNING royale_id, round_number, player1_id, player2_id
                "#,
            )
            .bind(match_id)
            .bind(&winner.user_id)
            .bind(&winner.username)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else {
                return Ok(false);
            };

            let royale_id: Uuid = row.try_get("royale_id")?;
            let round: i32 = row.try_get("round_number")?;
            let loser = [
                row.try_get::<Option<String>, _>("player1_id")?,
                row.try_get::<Option<String>, _>("player2_id")?,
            ]
            .into_iter()
            .flatten()
            .find(|id| *id != winner.user_id);

            if let Some(loser) = loser {
                sqlx::query(
                    r#"
                    UPDATE battle_royale_participants SET eliminated_in_round = $3
                    WHERE royale_id = $1 AND user_id = $2 AND eliminated_in_round IS NULL
                    "#,
                )
                .bind(royale_id)
                .bind(&loser)
                .bind(round)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok::<_, RoyaleError>(true)
        })
        .await
    }

    async fn advance_round(
        &self,
        royale_id: RoyaleId,
        from_round: u32,
        matches: Vec<NewMatch>,
    ) -> RoyaleResult<Option<Vec<Match>>> {
        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE battle_royales SET current_round = current_round + 1, updated_at = NOW()
                WHERE id = $1 AND status = 'in_progress' AND current_round = $2
                "#,
            )
            .bind(royale_id)
            .bind(from_round as i32)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Ok(None);
            }

            let now = Utc::now();
            let mut created = Vec::with_capacity(matches.len());
            for new_match in matches {
                let m = new_match.into_match(royale_id, now);
                insert_match(&mut tx, &m).await?;
                created.push(m);
            }

            tx.commit().await?;
            Ok::<_, RoyaleError>(Some(created))
        })
        .await
    }

    async fn complete_royale(
        &self,
        royale_id: RoyaleId,
        winner: &Player,
        winner_points: i64,
    ) -> RoyaleResult<Option<Vec<PointsAward>>> {
        with_transaction_timeout(async {
            let mut tx = self.pool.begin().await?;

            let final_round: Option<i32> = sqlx::query_scalar(
                r#"
                UPDATE battle_royales
                SET status = 'completed', winner_id = $2, winner_username = $3,
                    completed_at = NOW(), updated_at = NOW()
                WHERE id = $1 AND status = 'in_progress'
                RETURNING current_round
                "#,
            )
            .bind(royale_id)
            .bind(&winner.user_id)
            .bind(&winner.username)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(final_round) = final_round else {
                return Ok(None);
            };

            sqlx::query(
                r#"
                UPDATE battle_royale_participants SET eliminated_in_round = $3
                WHERE royale_id = $1 AND user_id <> $2 AND eliminated_in_round IS NULL
                "#,
            )
            .bind(royale_id)
            .bind(&winner.user_id)
            .bind(final_round)
            .execute(&mut *tx)
            .await?;

            let rows = sqlx::query(
                "SELECT user_id, username FROM battle_royale_participants WHERE royale_id = $1 ORDER BY joined_at, id",
            )
            .bind(royale_id)
            .fetch_all(&mut *tx)
            .await?;

            let mut awards = Vec::with_capacity(rows.len());
            for row in rows {
                let user_id: String = row.try_get("user_id")?;
                let username: String = row.try_get("username")?;
                let won = user_id == winner.user_id;
                let points = if won { winner_points } else { 0 };

                sqlx::query(
                    r#"
                    INSERT INTO battle_royale_points (user_id, username, points, wins, losses, tournaments_played, updated_at)
                    VALUES ($1, $2, $3, $4, $5, 1, NOW())
                    ON CONFLICT (user_id) DO UPDATE SET
                        username = EXCLUDED.username,
                        points = battle_royale_points.points + EXCLUDED.points,
                        wins = battle_royale_points.wins + EXCLUDED.wins,
                        losses = battle_royale_points.losses + EXCLUDED.losses,
                        tournaments_played = battle_royale_points.tournaments_played + 1,
                        updated_at = NOW()
                    "#,
                )
                .bind(&user_id)
                .bind(&username)
                .bind(points)
                .bind(i64::from(won))
                .bind(i64::from(!won))
                .execute(&mut *tx)
                .await?;

                awards.push(PointsAward {
                    user_id,
                    username,
                    points,
                    won,
                });
            }

            tx.commit().await?;
            Ok::<_, RoyaleError>(Some(awards))
        })
        .await
    }

    async fn leaderboard(
        &self,
        limit: u32,
        offset: u32,
    ) -> RoyaleResult<(Vec<RankedPoints>, u64)> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT * FROM battle_royale_points
                ORDER BY points DESC, wins DESC, user_id
                LIMIT $1 OFFSET $2
                "#,
            )
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool),
        )
        .await?;

        let total: i64 = with_default_timeout(
            sqlx::query_scalar("SELECT COUNT(*) FROM battle_royale_points").fetch_one(&self.pool),
        )
        .await?;

        let entries = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                Ok(RankedPoints {
                    rank: u64::from(offset) + i as u64 + 1,
                    record: points_from_row(row)?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok((entries, total as u64))
    }

    async fn user_points(&self, user_id: &str) -> RoyaleResult<Option<RankedPoints>> {
        let row = with_default_timeout(
            sqlx::query("SELECT * FROM battle_royale_points WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool),
        )
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let record = points_from_row(&row)?;

        let ahead: i64 = with_default_timeout(
            sqlx::query_scalar("SELECT COUNT(*) FROM battle_royale_points WHERE points > $1")
                .bind(record.points)
                .fetch_one(&self.pool),
        )
        .await?;

        Ok(Some(RankedPoints {
            rank: ahead as u64 + 1,
            record,
        }))
    }

    async fn health_check(&self) -> RoyaleResult<()> {
        with_default_timeout(sqlx::query("SELECT 1").execute(&self.pool)).await?;
        Ok(())
    }
}
