//! Postgres backend. Every multi-statement mutation runs in one transaction;
//! ledger operations lock the target row first so concurrent votes on the
//! same post or comment serialise.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use tracing::{info, warn};

use super::*;
use crate::ledger;
use crate::streak;

/// Pool settings plus the retry policy for the initial connection.
#[derive(Debug, Clone)]
pub struct PgConnectOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for PgConnectOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Connect with a fixed number of attempts and linear backoff, then apply
/// migrations.
pub async fn connect(url: &str, opts: &PgConnectOptions) -> anyhow::Result<PgPool> {
    let attempts = opts.attempts.max(1);
    let mut attempt = 0u32;
    let pool = loop {
        attempt += 1;
        let result = PgPoolOptions::new()
            .max_connections(opts.max_connections)
            .acquire_timeout(opts.acquire_timeout)
            .connect(url)
            .await;
        match result {
            Ok(pool) => break pool,
            Err(e) if attempt < attempts => {
                let wait = opts.backoff * attempt;
                warn!(attempt, ?wait, "postgres connect failed: {e}");
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(anyhow::anyhow!("postgres connect failed after {attempt} attempts: {e}")),
        }
    };
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("postgres schema up to date");
    Ok(pool)
}

fn db_err(e: sqlx::Error) -> RepoError {
    match e {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
            RepoError::Conflict(db.message().to_string())
        }
        other => RepoError::Internal(other.to_string()),
    }
}

fn decode<T, E: std::fmt::Display>(r: Result<T, E>) -> RepoResult<T> {
    r.map_err(|e| RepoError::Internal(format!("bad row: {e}")))
}

fn table(kind: TargetType) -> &'static str {
    match kind {
        TargetType::Post => "posts",
        TargetType::Comment => "comments",
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    title: String,
    content: String,
    community: String,
    author_uid: String,
    upvotes: i64,
    downvotes: i64,
    pinned: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = RepoError;

    fn try_from(r: PostRow) -> RepoResult<Post> {
        Ok(Post {
            id: r.id,
            title: r.title,
            content: r.content,
            community: decode(r.community.parse())?,
            author_uid: r.author_uid,
            upvotes: r.upvotes,
            downvotes: r.downvotes,
            pinned: r.pinned,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    content: String,
    author_uid: String,
    upvotes: i64,
    downvotes: i64,
    pinned: bool,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(r: CommentRow) -> Comment {
        Comment {
            id: r.id,
            post_id: r.post_id,
            content: r.content,
            author_uid: r.author_uid,
            upvotes: r.upvotes,
            downvotes: r.downvotes,
            pinned: r.pinned,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: i64,
    target_type: String,
    content_id: i64,
    reason: String,
    reporter_uid: String,
    status: String,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReportRow> for Report {
    type Error = RepoError;

    fn try_from(r: ReportRow) -> RepoResult<Report> {
        Ok(Report {
            id: r.id,
            target_type: decode(r.target_type.parse())?,
            content_id: r.content_id,
            reason: r.reason,
            reporter_uid: r.reporter_uid,
            status: decode(r.status.parse())?,
            created_at: r.created_at,
            resolved_at: r.resolved_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StreakRow {
    user_uid: String,
    current_streak: i32,
    longest_streak: i32,
    last_assessment_date: NaiveDate,
}

impl From<StreakRow> for Streak {
    fn from(r: StreakRow) -> Streak {
        Streak {
            user_uid: r.user_uid,
            current_streak: r.current_streak,
            longest_streak: r.longest_streak,
            last_assessment_date: r.last_assessment_date,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AssessmentRow {
    id: i64,
    user_uid: String,
    kind: String,
    score: i32,
    created_at: DateTime<Utc>,
}

impl From<AssessmentRow> for Assessment {
    fn from(r: AssessmentRow) -> Assessment {
        Assessment { id: r.id, user_uid: r.user_uid, kind: r.kind, score: r.score, created_at: r.created_at }
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    uid: String,
    email: String,
    display_name: Option<String>,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(r: AccountRow) -> Account {
        Account {
            uid: r.uid,
            email: r.email,
            display_name: r.display_name,
            password_hash: r.password_hash,
            created_at: r.created_at,
        }
    }
}

const POST_COLUMNS: &str = "id, title, content, community, author_uid, upvotes, downvotes, pinned, created_at";
const COMMENT_COLUMNS: &str = "id, post_id, content, author_uid, upvotes, downvotes, pinned, created_at";
const REPORT_COLUMNS: &str = "id, target_type, content_id, reason, reporter_uid, status, created_at, resolved_at";

async fn add_aura(conn: &mut PgConnection, user_uid: &str, delta: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO aura (user_uid, score) VALUES ($1, GREATEST(0, $2))
         ON CONFLICT (user_uid) DO UPDATE SET score = GREATEST(0, aura.score + $2)",
    )
    .bind(user_uid)
    .bind(delta)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn drop_votes_on(conn: &mut PgConnection, kind: TargetType, ids: &[i64]) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM votes WHERE target_type = $1 AND target_id = ANY($2)")
        .bind(kind.as_str())
        .bind(ids.to_vec())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Returns false when the target did not exist.
async fn remove_target(conn: &mut PgConnection, target: Target) -> Result<bool, sqlx::Error> {
    if target.kind == TargetType::Post {
        let comment_ids: Vec<i64> = sqlx::query_scalar("DELETE FROM comments WHERE post_id = $1 RETURNING id")
            .bind(target.id)
            .fetch_all(&mut *conn)
            .await?;
        if !comment_ids.is_empty() {
            drop_votes_on(conn, TargetType::Comment, &comment_ids).await?;
        }
    }
    let sql = format!("DELETE FROM {} WHERE id = $1", table(target.kind));
    let removed = sqlx::query(&sql).bind(target.id).execute(&mut *conn).await?.rows_affected();
    drop_votes_on(conn, target.kind, &[target.id]).await?;
    Ok(removed > 0)
}

#[derive(Clone)]
pub struct PgRepo { pool: PgPool }

impl PgRepo {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl PostRepo for PgRepo {
    async fn list_posts(&self, community: Option<Community>) -> RepoResult<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE ($1::TEXT IS NULL OR community = $1)
             ORDER BY pinned DESC, created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, PostRow>(&sql)
            .bind(community.map(|c| c.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(Post::try_from).collect()
    }

    async fn get_post(&self, id: Id) -> RepoResult<Post> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        row.try_into()
    }

    async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let sql = format!(
            "INSERT INTO posts (title, content, community, author_uid, upvotes, downvotes)
             VALUES ($1, $2, $3, $4, 1, 0) RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query_as::<_, PostRow>(&sql)
            .bind(&new.title)
            .bind(&new.content)
            .bind(new.community.as_str())
            .bind(&new.author_uid)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        add_aura(&mut tx, &new.author_uid, ledger::CREATION_AURA).await.map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        row.try_into()
    }

    async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        if exists.is_none() {
            return Err(RepoError::NotFound);
        }
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1
             ORDER BY pinned DESC, created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rows.into_iter().map(Comment::from).collect())
    }

    async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.into())
    }

    async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        // key share lock keeps the parent from disappearing mid-insert
        let parent: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 FOR KEY SHARE")
            .bind(new.post_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if parent.is_none() {
            return Err(RepoError::NotFound);
        }
        let sql = format!(
            "INSERT INTO comments (post_id, content, author_uid, upvotes, downvotes)
             VALUES ($1, $2, $3, 1, 0) RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(new.post_id)
            .bind(&new.content)
            .bind(&new.author_uid)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        add_aura(&mut tx, &new.author_uid, ledger::CREATION_AURA).await.map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(row.into())
    }

    async fn author_of(&self, target: Target) -> RepoResult<String> {
        let sql = format!("SELECT author_uid FROM {} WHERE id = $1", table(target.kind));
        sqlx::query_scalar::<_, String>(&sql)
            .bind(target.id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn delete_content(&self, target: Target) -> RepoResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let removed = remove_target(&mut tx, target).await.map_err(db_err)?;
        if !removed {
            return Err(RepoError::NotFound);
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn toggle_pin(&self, target: Target) -> RepoResult<bool> {
        let sql = format!("UPDATE {} SET pinned = NOT pinned WHERE id = $1 RETURNING pinned", table(target.kind));
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(target.id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }
}

#[async_trait]
impl VoteRepo for PgRepo {
    async fn apply_vote(&self, target: Target, vote: VoteType, voter_uid: &str) -> RepoResult<VoteOutcome> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let sql = format!("SELECT author_uid FROM {} WHERE id = $1 FOR UPDATE", table(target.kind));
        let author: String = sqlx::query_scalar(&sql)
            .bind(target.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        if author == voter_uid {
            return Err(RepoError::SelfVote);
        }

        let prior: Option<String> = sqlx::query_scalar(
            "SELECT vote_type FROM votes WHERE voter_uid = $1 AND target_type = $2 AND target_id = $3 FOR UPDATE",
        )
        .bind(voter_uid)
        .bind(target.kind.as_str())
        .bind(target.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        let prior = prior.map(|v| decode(v.parse::<VoteType>())).transpose()?;

        let t = ledger::transition(prior, vote);
        let written = match (prior, t.next) {
            (None, Some(next)) => sqlx::query(
                "INSERT INTO votes (voter_uid, target_type, target_id, vote_type) VALUES ($1, $2, $3, $4)",
            )
            .bind(voter_uid)
            .bind(target.kind.as_str())
            .bind(target.id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await,
            (Some(_), Some(next)) => sqlx::query(
                "UPDATE votes SET vote_type = $4 WHERE voter_uid = $1 AND target_type = $2 AND target_id = $3",
            )
            .bind(voter_uid)
            .bind(target.kind.as_str())
            .bind(target.id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await,
            (_, None) => sqlx::query(
                "DELETE FROM votes WHERE voter_uid = $1 AND target_type = $2 AND target_id = $3",
            )
            .bind(voter_uid)
            .bind(target.kind.as_str())
            .bind(target.id)
            .execute(&mut *tx)
            .await,
        };
        written.map_err(db_err)?;

        let sql = format!(
            "UPDATE {} SET upvotes = upvotes + $2, downvotes = downvotes + $3 WHERE id = $1",
            table(target.kind)
        );
        sqlx::query(&sql)
            .bind(target.id)
            .bind(t.upvote_delta)
            .bind(t.downvote_delta)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        add_aura(&mut tx, &author, t.aura_delta).await.map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(VoteOutcome { aura_change: t.aura_delta, user_vote: t.next })
    }

    async fn votes_by(&self, voter_uid: &str, kind: TargetType, ids: &[Id]) -> RepoResult<HashMap<Id, VoteType>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT target_id, vote_type FROM votes WHERE voter_uid = $1 AND target_type = $2 AND target_id = ANY($3)",
        )
        .bind(voter_uid)
        .bind(kind.as_str())
        .bind(ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter()
            .map(|(id, v)| -> RepoResult<(Id, VoteType)> { Ok((id, decode(v.parse::<VoteType>())?)) })
            .collect()
    }

    async fn aura(&self, user_uid: &str) -> RepoResult<i64> {
        let score: Option<i64> = sqlx::query_scalar("SELECT score FROM aura WHERE user_uid = $1")
            .bind(user_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(score.unwrap_or(0))
    }
}

#[async_trait]
impl MembershipRepo for PgRepo {
    async fn join(&self, user_uid: &str, community: Community) -> RepoResult<()> {
        sqlx::query("INSERT INTO memberships (user_uid, community) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_uid)
            .bind(community.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn leave(&self, user_uid: &str, community: Community) -> RepoResult<()> {
        sqlx::query("DELETE FROM memberships WHERE user_uid = $1 AND community = $2")
            .bind(user_uid)
            .bind(community.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn is_member(&self, user_uid: &str, community: Community) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM memberships WHERE user_uid = $1 AND community = $2)",
        )
        .bind(user_uid)
        .bind(community.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn memberships(&self, user_uid: &str) -> RepoResult<Vec<Community>> {
        let rows: Vec<String> = sqlx::query_scalar("SELECT community FROM memberships WHERE user_uid = $1")
            .bind(user_uid)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        let joined: Vec<Community> = rows.iter()
            .map(|c| decode(c.parse::<Community>()))
            .collect::<RepoResult<_>>()?;
        Ok(Community::ALL.into_iter().filter(|c| joined.contains(c)).collect())
    }

    async fn community_rules(&self, community: Community) -> RepoResult<String> {
        let rules: Option<String> = sqlx::query_scalar("SELECT rules FROM community_rules WHERE community = $1")
            .bind(community.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(rules.unwrap_or_else(|| community.default_rules().to_string()))
    }
}

#[async_trait]
impl ReportRepo for PgRepo {
    async fn create_report(&self, new: NewReport) -> RepoResult<Report> {
        let sql = format!(
            "INSERT INTO reports (target_type, content_id, reason, reporter_uid, status)
             VALUES ($1, $2, $3, $4, 'pending') RETURNING {REPORT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(new.target_type.as_str())
            .bind(new.content_id)
            .bind(&new.reason)
            .bind(&new.reporter_uid)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        row.try_into()
    }

    async fn list_reports(&self, status: Option<ReportStatus>) -> RepoResult<Vec<Report>> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE ($1::TEXT IS NULL OR status = $1)
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(Report::try_from).collect()
    }

    async fn resolve_report(&self, id: Id, action: ReportAction) -> RepoResult<Report> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1 FOR UPDATE");
        let report: Report = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?
            .try_into()?;
        if action == ReportAction::Delete {
            let target = Target { kind: report.target_type, id: report.content_id };
            remove_target(&mut tx, target).await.map_err(db_err)?;
        }
        let sql = format!(
            "UPDATE reports SET status = $2, resolved_at = now() WHERE id = $1 RETURNING {REPORT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(id)
            .bind(action.resulting_status().as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        row.try_into()
    }
}

#[async_trait]
impl AssessmentRepo for PgRepo {
    async fn record_assessment(&self, new: NewAssessment, today: NaiveDate) -> RepoResult<AssessmentReceipt> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let prior: Option<Streak> = sqlx::query_as::<_, StreakRow>(
            "SELECT user_uid, current_streak, longest_streak, last_assessment_date
             FROM assessment_streaks WHERE user_uid = $1 FOR UPDATE",
        )
        .bind(&new.user_uid)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .map(Streak::from);

        let (streak, update) = streak::advance(&new.user_uid, prior.as_ref(), today);
        sqlx::query(
            "INSERT INTO assessment_streaks (user_uid, current_streak, longest_streak, last_assessment_date)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_uid) DO UPDATE SET current_streak = $2, longest_streak = $3, last_assessment_date = $4",
        )
        .bind(&streak.user_uid)
        .bind(streak.current_streak)
        .bind(streak.longest_streak)
        .bind(streak.last_assessment_date)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let row = sqlx::query_as::<_, AssessmentRow>(
            "INSERT INTO assessments (user_uid, kind, score) VALUES ($1, $2, $3)
             RETURNING id, user_uid, kind, score, created_at",
        )
        .bind(&new.user_uid)
        .bind(&new.kind)
        .bind(new.score)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        tx.commit().await.map_err(db_err)?;
        Ok(AssessmentReceipt { assessment: row.into(), streak, update })
    }

    async fn get_streak(&self, user_uid: &str) -> RepoResult<Option<Streak>> {
        let row = sqlx::query_as::<_, StreakRow>(
            "SELECT user_uid, current_streak, longest_streak, last_assessment_date
             FROM assessment_streaks WHERE user_uid = $1",
        )
        .bind(user_uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Streak::from))
    }

    async fn list_assessments(&self, user_uid: &str) -> RepoResult<Vec<Assessment>> {
        let rows = sqlx::query_as::<_, AssessmentRow>(
            "SELECT id, user_uid, kind, score, created_at FROM assessments
             WHERE user_uid = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_uid)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Assessment::from).collect())
    }
}

#[async_trait]
impl AccountRepo for PgRepo {
    async fn create_account(&self, new: NewAccount) -> RepoResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            "INSERT INTO accounts (uid, email, display_name, password_hash) VALUES ($1, $2, $3, $4)
             RETURNING uid, email, display_name, password_hash, created_at",
        )
        .bind(&new.uid)
        .bind(&new.email)
        .bind(&new.display_name)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match db_err(e) {
            RepoError::Conflict(_) => RepoError::Conflict("email already registered".into()),
            other => other,
        })?;
        Ok(row.into())
    }

    async fn find_account_by_email(&self, email: &str) -> RepoResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT uid, email, display_name, password_hash, created_at FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.into())
    }

    async fn get_account(&self, uid: &str) -> RepoResult<Account> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT uid, email, display_name, password_hash, created_at FROM accounts WHERE uid = $1",
        )
        .bind(uid)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.into())
    }
}
