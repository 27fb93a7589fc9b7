use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::*;
use crate::streak::StreakUpdate;

#[cfg(feature = "inmem-store")]
pub mod inmem;
#[cfg(feature = "postgres-store")]
pub mod pg;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict: {0}")] Conflict(String),
    #[error("self vote")] SelfVote,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Pinned first, then newest first.
    async fn list_posts(&self, community: Option<Community>) -> RepoResult<Vec<Post>>;
    async fn get_post(&self, id: Id) -> RepoResult<Post>;
    /// Creates the post already upvoted by its author and credits the author
    /// with [`crate::ledger::CREATION_AURA`].
    async fn create_post(&self, new: NewPost) -> RepoResult<Post>;
    async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, id: Id) -> RepoResult<Comment>;
    async fn create_comment(&self, new: NewComment) -> RepoResult<Comment>;
    async fn author_of(&self, target: Target) -> RepoResult<String>;
    /// Hard delete. Deleting a post removes its comments and every vote on
    /// either.
    async fn delete_content(&self, target: Target) -> RepoResult<()>;
    /// Flips `pinned` and returns the new value.
    async fn toggle_pin(&self, target: Target) -> RepoResult<bool>;
}

#[async_trait]
pub trait VoteRepo: Send + Sync {
    /// Applies one vote request atomically (vote row, counters, author aura).
    async fn apply_vote(&self, target: Target, vote: VoteType, voter_uid: &str) -> RepoResult<VoteOutcome>;
    async fn votes_by(&self, voter_uid: &str, kind: TargetType, ids: &[Id]) -> RepoResult<HashMap<Id, VoteType>>;
    /// Zero for users who never received a vote.
    async fn aura(&self, user_uid: &str) -> RepoResult<i64>;
}

#[async_trait]
pub trait MembershipRepo: Send + Sync {
    async fn join(&self, user_uid: &str, community: Community) -> RepoResult<()>;
    async fn leave(&self, user_uid: &str, community: Community) -> RepoResult<()>;
    async fn is_member(&self, user_uid: &str, community: Community) -> RepoResult<bool>;
    async fn memberships(&self, user_uid: &str) -> RepoResult<Vec<Community>>;
    async fn community_rules(&self, community: Community) -> RepoResult<String>;
}

#[async_trait]
pub trait ReportRepo: Send + Sync {
    async fn create_report(&self, new: NewReport) -> RepoResult<Report>;
    /// Newest first.
    async fn list_reports(&self, status: Option<ReportStatus>) -> RepoResult<Vec<Report>>;
    /// Not idempotent: resolving again re-runs the action and re-stamps
    /// `resolved_at`.
    async fn resolve_report(&self, id: Id, action: ReportAction) -> RepoResult<Report>;
}

/// Result of one accepted assessment submission.
#[derive(Debug, Clone)]
pub struct AssessmentReceipt {
    pub assessment: Assessment,
    pub streak: Streak,
    pub update: StreakUpdate,
}

#[async_trait]
pub trait AssessmentRepo: Send + Sync {
    async fn record_assessment(&self, new: NewAssessment, today: NaiveDate) -> RepoResult<AssessmentReceipt>;
    async fn get_streak(&self, user_uid: &str) -> RepoResult<Option<Streak>>;
    async fn list_assessments(&self, user_uid: &str) -> RepoResult<Vec<Assessment>>;
}

#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// `Conflict` when the email is already registered.
    async fn create_account(&self, new: NewAccount) -> RepoResult<Account>;
    async fn find_account_by_email(&self, email: &str) -> RepoResult<Account>;
    async fn get_account(&self, uid: &str) -> RepoResult<Account>;
}

pub trait Repo: PostRepo + VoteRepo + MembershipRepo + ReportRepo + AssessmentRepo + AccountRepo {}

impl<T> Repo for T where T: PostRepo + VoteRepo + MembershipRepo + ReportRepo + AssessmentRepo + AccountRepo {}
