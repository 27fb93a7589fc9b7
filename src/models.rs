use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Id = i64;

/// Forum sub-sections. Membership and posting are scoped to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Community {
    Depression,
    Anxiety,
    Stress,
    General,
}

impl Community {
    pub const ALL: [Community; 4] = [
        Community::Depression,
        Community::Anxiety,
        Community::Stress,
        Community::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Community::Depression => "depression",
            Community::Anxiety => "anxiety",
            Community::Stress => "stress",
            Community::General => "general",
        }
    }

    /// Rules text served until an operator stores a custom one.
    pub fn default_rules(&self) -> &'static str {
        match self {
            Community::Depression => "1. Be kind and supportive.\n2. No medical advice; encourage professional help.\n3. If you are in crisis, contact a local helpline immediately.\n4. No self-harm content or methods.",
            Community::Anxiety => "1. Be kind and supportive.\n2. Share coping strategies, not diagnoses.\n3. No triggering content without a warning.\n4. Respect privacy; no personal information.",
            Community::Stress => "1. Be kind and supportive.\n2. Keep posts about stress and its management.\n3. No spam or self-promotion.\n4. Respect privacy; no personal information.",
            Community::General => "1. Be respectful.\n2. Stay on the topic of mental wellness.\n3. No spam, harassment or hate speech.\n4. Report content that breaks the rules.",
        }
    }
}

impl fmt::Display for Community {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Community {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "depression" => Ok(Community::Depression),
            "anxiety" => Ok(Community::Anxiety),
            "stress" => Ok(Community::Stress),
            "general" => Ok(Community::General),
            other => Err(format!("unknown community '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Post,
    Comment,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Post => "post",
            TargetType::Comment => "comment",
        }
    }
}

impl FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(TargetType::Post),
            "comment" => Ok(TargetType::Comment),
            other => Err(format!("unknown target type '{other}'")),
        }
    }
}

/// A post or comment addressed by a vote, pin, report or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub kind: TargetType,
    pub id: Id,
}

impl Target {
    pub fn post(id: Id) -> Self {
        Self { kind: TargetType::Post, id }
    }

    pub fn comment(id: Id) -> Self {
        Self { kind: TargetType::Comment, id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }
}

impl FromStr for VoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upvote" => Ok(VoteType::Upvote),
            "downvote" => Ok(VoteType::Downvote),
            other => Err(format!("unknown vote type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Post {
    pub id: Id,
    pub title: String,
    pub content: String,
    pub community: Community,
    pub author_uid: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub community: Community,
    pub author_uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Comment {
    pub id: Id,
    pub post_id: Id,
    pub content: String,
    pub author_uid: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewComment {
    pub post_id: Id,
    pub content: String,
    pub author_uid: String,
}

/// Listing order shared by both stores: pinned first, newest first.
pub trait Listed {
    fn pinned(&self) -> bool;
    fn created_at(&self) -> DateTime<Utc>;
    fn id(&self) -> Id;
}

impl Listed for Post {
    fn pinned(&self) -> bool { self.pinned }
    fn created_at(&self) -> DateTime<Utc> { self.created_at }
    fn id(&self) -> Id { self.id }
}

impl Listed for Comment {
    fn pinned(&self) -> bool { self.pinned }
    fn created_at(&self) -> DateTime<Utc> { self.created_at }
    fn id(&self) -> Id { self.id }
}

pub fn sort_listing<T: Listed>(items: &mut [T]) {
    items.sort_by(|a, b| {
        b.pinned()
            .cmp(&a.pinned())
            .then_with(|| b.created_at().cmp(&a.created_at()))
            .then_with(|| b.id().cmp(&a.id()))
    });
}

/// Post as returned to clients, with the derived score and the requesting
/// user's own vote.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub votes: i64,
    pub user_vote: Option<VoteType>,
}

impl PostView {
    pub fn new(post: Post, user_vote: Option<VoteType>) -> Self {
        let votes = post.upvotes - post.downvotes;
        Self { post, votes, user_vote }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub votes: i64,
    pub user_vote: Option<VoteType>,
}

impl CommentView {
    pub fn new(comment: Comment, user_vote: Option<VoteType>) -> Self {
        let votes = comment.upvotes - comment.downvotes;
        Self { comment, votes, user_vote }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VoteOutcome {
    pub aura_change: i64,
    pub user_vote: Option<VoteType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Deleted,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Deleted => "deleted",
            ReportStatus::Dismissed => "dismissed",
        }
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "deleted" => Ok(ReportStatus::Deleted),
            "dismissed" => Ok(ReportStatus::Dismissed),
            other => Err(format!("unknown report status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportAction {
    Delete,
    Dismiss,
}

impl ReportAction {
    pub fn resulting_status(&self) -> ReportStatus {
        match self {
            ReportAction::Delete => ReportStatus::Deleted,
            ReportAction::Dismiss => ReportStatus::Dismissed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Report {
    pub id: Id,
    #[serde(rename = "type")]
    pub target_type: TargetType,
    pub content_id: Id,
    pub reason: String,
    pub reporter_uid: String,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewReport {
    pub target_type: TargetType,
    pub content_id: Id,
    pub reason: String,
    pub reporter_uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Streak {
    pub user_uid: String,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_assessment_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Assessment {
    pub id: Id,
    pub user_uid: String,
    pub kind: String,
    pub score: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewAssessment {
    pub user_uid: String,
    pub kind: String,
    pub score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: String,
}
