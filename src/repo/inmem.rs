//! Process-local store used when no `DATABASE_URL` is configured and by the
//! integration tests. Every mutation runs under a single write lock, which
//! gives the same all-or-nothing behaviour as the Postgres transactions.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{NaiveDate, Utc};

use super::*;
use crate::ledger;
use crate::streak;

type VoteKey = (String, TargetType, Id);

#[derive(Default)]
struct State {
    posts: HashMap<Id, Post>,
    comments: HashMap<Id, Comment>,
    votes: HashMap<VoteKey, VoteType>,
    aura: HashMap<String, i64>,
    memberships: HashSet<(String, Community)>,
    rules: HashMap<Community, String>,
    reports: HashMap<Id, Report>,
    streaks: HashMap<String, Streak>,
    assessments: Vec<Assessment>,
    accounts: HashMap<String, Account>,
    next_id: Id,
}

impl State {
    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn author_of(&self, target: Target) -> RepoResult<String> {
        let author = match target.kind {
            TargetType::Post => self.posts.get(&target.id).map(|p| &p.author_uid),
            TargetType::Comment => self.comments.get(&target.id).map(|c| &c.author_uid),
        };
        author.cloned().ok_or(RepoError::NotFound)
    }

    fn bump_counters(&mut self, target: Target, up: i64, down: i64) {
        let counters = match target.kind {
            TargetType::Post => self.posts.get_mut(&target.id).map(|p| (&mut p.upvotes, &mut p.downvotes)),
            TargetType::Comment => self.comments.get_mut(&target.id).map(|c| (&mut c.upvotes, &mut c.downvotes)),
        };
        if let Some((upvotes, downvotes)) = counters {
            *upvotes += up;
            *downvotes += down;
        }
    }

    fn add_aura(&mut self, user_uid: &str, delta: i64) {
        let score = self.aura.entry(user_uid.to_string()).or_insert(0);
        *score = ledger::apply_aura(*score, delta);
    }

    fn drop_votes_on(&mut self, kind: TargetType, id: Id) {
        self.votes.retain(|(_, k, target_id), _| !(*k == kind && *target_id == id));
    }

    /// Returns false when the target did not exist.
    fn remove_target(&mut self, target: Target) -> bool {
        match target.kind {
            TargetType::Post => {
                if self.posts.remove(&target.id).is_none() {
                    return false;
                }
                let orphaned: Vec<Id> = self.comments.values()
                    .filter(|c| c.post_id == target.id)
                    .map(|c| c.id)
                    .collect();
                for comment_id in orphaned {
                    self.comments.remove(&comment_id);
                    self.drop_votes_on(TargetType::Comment, comment_id);
                }
                self.drop_votes_on(TargetType::Post, target.id);
                true
            }
            TargetType::Comment => {
                if self.comments.remove(&target.id).is_none() {
                    return false;
                }
                self.drop_votes_on(TargetType::Comment, target.id);
                true
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
}

impl InMemRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace a community's rules text (operators / tests).
    pub fn set_community_rules(&self, community: Community, rules: impl Into<String>) {
        self.write().rules.insert(community, rules.into());
    }
}

#[async_trait]
impl PostRepo for InMemRepo {
    async fn list_posts(&self, community: Option<Community>) -> RepoResult<Vec<Post>> {
        let s = self.read();
        let mut v: Vec<Post> = s.posts.values()
            .filter(|p| community.map_or(true, |c| p.community == c))
            .cloned()
            .collect();
        sort_listing(&mut v);
        Ok(v)
    }

    async fn get_post(&self, id: Id) -> RepoResult<Post> {
        self.read().posts.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
        let mut s = self.write();
        let id = s.next_id();
        let post = Post {
            id,
            title: new.title,
            content: new.content,
            community: new.community,
            author_uid: new.author_uid,
            upvotes: 1,
            downvotes: 0,
            pinned: false,
            created_at: Utc::now(),
        };
        s.posts.insert(id, post.clone());
        s.add_aura(&post.author_uid, ledger::CREATION_AURA);
        Ok(post)
    }

    async fn list_comments(&self, post_id: Id) -> RepoResult<Vec<Comment>> {
        let s = self.read();
        if !s.posts.contains_key(&post_id) {
            return Err(RepoError::NotFound);
        }
        let mut v: Vec<Comment> = s.comments.values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        sort_listing(&mut v);
        Ok(v)
    }

    async fn get_comment(&self, id: Id) -> RepoResult<Comment> {
        self.read().comments.get(&id).cloned().ok_or(RepoError::NotFound)
    }

    async fn create_comment(&self, new: NewComment) -> RepoResult<Comment> {
        let mut s = self.write();
        if !s.posts.contains_key(&new.post_id) {
            return Err(RepoError::NotFound);
        }
        let id = s.next_id();
        let comment = Comment {
            id,
            post_id: new.post_id,
            content: new.content,
            author_uid: new.author_uid,
            upvotes: 1,
            downvotes: 0,
            pinned: false,
            created_at: Utc::now(),
        };
        s.comments.insert(id, comment.clone());
        s.add_aura(&comment.author_uid, ledger::CREATION_AURA);
        Ok(comment)
    }

    async fn author_of(&self, target: Target) -> RepoResult<String> {
        self.read().author_of(target)
    }

    async fn delete_content(&self, target: Target) -> RepoResult<()> {
        if self.write().remove_target(target) {
            Ok(())
        } else {
            Err(RepoError::NotFound)
        }
    }

    async fn toggle_pin(&self, target: Target) -> RepoResult<bool> {
        let mut s = self.write();
        let pinned = match target.kind {
            TargetType::Post => s.posts.get_mut(&target.id).map(|p| &mut p.pinned),
            TargetType::Comment => s.comments.get_mut(&target.id).map(|c| &mut c.pinned),
        }
        .ok_or(RepoError::NotFound)?;
        *pinned = !*pinned;
        Ok(*pinned)
    }
}

#[async_trait]
impl VoteRepo for InMemRepo {
    async fn apply_vote(&self, target: Target, vote: VoteType, voter_uid: &str) -> RepoResult<VoteOutcome> {
        let mut s = self.write();
        let author = s.author_of(target)?;
        if author == voter_uid {
            return Err(RepoError::SelfVote);
        }
        let key: VoteKey = (voter_uid.to_string(), target.kind, target.id);
        let t = ledger::transition(s.votes.get(&key).copied(), vote);
        match t.next {
            Some(v) => { s.votes.insert(key, v); }
            None => { s.votes.remove(&key); }
        }
        s.bump_counters(target, t.upvote_delta, t.downvote_delta);
        s.add_aura(&author, t.aura_delta);
        Ok(VoteOutcome { aura_change: t.aura_delta, user_vote: t.next })
    }

    async fn votes_by(&self, voter_uid: &str, kind: TargetType, ids: &[Id]) -> RepoResult<HashMap<Id, VoteType>> {
        let s = self.read();
        Ok(ids.iter()
            .filter_map(|id| {
                s.votes.get(&(voter_uid.to_string(), kind, *id)).map(|v| (*id, *v))
            })
            .collect())
    }

    async fn aura(&self, user_uid: &str) -> RepoResult<i64> {
        Ok(self.read().aura.get(user_uid).copied().unwrap_or(0))
    }
}

#[async_trait]
impl MembershipRepo for InMemRepo {
    async fn join(&self, user_uid: &str, community: Community) -> RepoResult<()> {
        self.write().memberships.insert((user_uid.to_string(), community));
        Ok(())
    }

    async fn leave(&self, user_uid: &str, community: Community) -> RepoResult<()> {
        self.write().memberships.remove(&(user_uid.to_string(), community));
        Ok(())
    }

    async fn is_member(&self, user_uid: &str, community: Community) -> RepoResult<bool> {
        Ok(self.read().memberships.contains(&(user_uid.to_string(), community)))
    }

    async fn memberships(&self, user_uid: &str) -> RepoResult<Vec<Community>> {
        let s = self.read();
        Ok(Community::ALL.into_iter()
            .filter(|c| s.memberships.contains(&(user_uid.to_string(), *c)))
            .collect())
    }

    async fn community_rules(&self, community: Community) -> RepoResult<String> {
        let s = self.read();
        Ok(s.rules.get(&community).cloned().unwrap_or_else(|| community.default_rules().to_string()))
    }
}

#[async_trait]
impl ReportRepo for InMemRepo {
    async fn create_report(&self, new: NewReport) -> RepoResult<Report> {
        let mut s = self.write();
        let id = s.next_id();
        let report = Report {
            id,
            target_type: new.target_type,
            content_id: new.content_id,
            reason: new.reason,
            reporter_uid: new.reporter_uid,
            status: ReportStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        };
        s.reports.insert(id, report.clone());
        Ok(report)
    }

    async fn list_reports(&self, status: Option<ReportStatus>) -> RepoResult<Vec<Report>> {
        let s = self.read();
        let mut v: Vec<Report> = s.reports.values()
            .filter(|r| status.map_or(true, |st| r.status == st))
            .cloned()
            .collect();
        v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(v)
    }

    async fn resolve_report(&self, id: Id, action: ReportAction) -> RepoResult<Report> {
        let mut s = self.write();
        let target = {
            let r = s.reports.get(&id).ok_or(RepoError::NotFound)?;
            Target { kind: r.target_type, id: r.content_id }
        };
        if action == ReportAction::Delete {
            // content may already be gone; the report is still closed
            s.remove_target(target);
        }
        let report = s.reports.get_mut(&id).ok_or(RepoError::NotFound)?;
        report.status = action.resulting_status();
        report.resolved_at = Some(Utc::now());
        Ok(report.clone())
    }
}

#[async_trait]
impl AssessmentRepo for InMemRepo {
    async fn record_assessment(&self, new: NewAssessment, today: NaiveDate) -> RepoResult<AssessmentReceipt> {
        let mut s = self.write();
        let (streak, update) = streak::advance(&new.user_uid, s.streaks.get(&new.user_uid), today);
        s.streaks.insert(new.user_uid.clone(), streak.clone());
        let id = s.next_id();
        let assessment = Assessment {
            id,
            user_uid: new.user_uid,
            kind: new.kind,
            score: new.score,
            created_at: Utc::now(),
        };
        s.assessments.push(assessment.clone());
        Ok(AssessmentReceipt { assessment, streak, update })
    }

    async fn get_streak(&self, user_uid: &str) -> RepoResult<Option<Streak>> {
        Ok(self.read().streaks.get(user_uid).cloned())
    }

    async fn list_assessments(&self, user_uid: &str) -> RepoResult<Vec<Assessment>> {
        let s = self.read();
        let mut v: Vec<Assessment> = s.assessments.iter()
            .filter(|a| a.user_uid == user_uid)
            .cloned()
            .collect();
        v.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(v)
    }
}

#[async_trait]
impl AccountRepo for InMemRepo {
    async fn create_account(&self, new: NewAccount) -> RepoResult<Account> {
        let mut s = self.write();
        if s.accounts.values().any(|a| a.email == new.email) {
            return Err(RepoError::Conflict("email already registered".into()));
        }
        if s.accounts.contains_key(&new.uid) {
            return Err(RepoError::Conflict("uid already taken".into()));
        }
        let account = Account {
            uid: new.uid,
            email: new.email,
            display_name: new.display_name,
            password_hash: new.password_hash,
            created_at: Utc::now(),
        };
        s.accounts.insert(account.uid.clone(), account.clone());
        Ok(account)
    }

    async fn find_account_by_email(&self, email: &str) -> RepoResult<Account> {
        let s = self.read();
        s.accounts.values().find(|a| a.email == email).cloned().ok_or(RepoError::NotFound)
    }

    async fn get_account(&self, uid: &str) -> RepoResult<Account> {
        self.read().accounts.get(uid).cloned().ok_or(RepoError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (InMemRepo, Post) {
        let r = InMemRepo::new();
        let post = r.create_post(NewPost {
            title: "Hello".into(),
            content: "First post".into(),
            community: Community::General,
            author_uid: "u/xyz".into(),
        }).await.unwrap();
        (r, post)
    }

    #[tokio::test]
    async fn creation_self_upvotes_and_grants_aura() {
        let (r, post) = seeded().await;
        assert_eq!((post.upvotes, post.downvotes), (1, 0));
        assert_eq!(r.aura("u/xyz").await.unwrap(), 2);
        // no vote row is held on own content
        let votes = r.votes_by("u/xyz", TargetType::Post, &[post.id]).await.unwrap();
        assert!(votes.is_empty());
    }

    #[tokio::test]
    async fn vote_toggle_and_switch() {
        let (r, post) = seeded().await;
        let target = Target::post(post.id);

        let out = r.apply_vote(target, VoteType::Upvote, "u/abc").await.unwrap();
        assert_eq!(out.aura_change, 1);
        assert_eq!(r.get_post(post.id).await.unwrap().upvotes, 2);
        assert_eq!(r.aura("u/xyz").await.unwrap(), 3);

        let out = r.apply_vote(target, VoteType::Downvote, "u/abc").await.unwrap();
        assert_eq!(out.aura_change, -2);
        let p = r.get_post(post.id).await.unwrap();
        assert_eq!((p.upvotes, p.downvotes), (1, 1));
        assert_eq!(r.aura("u/xyz").await.unwrap(), 1);

        let out = r.apply_vote(target, VoteType::Downvote, "u/abc").await.unwrap();
        assert_eq!(out.aura_change, 1);
        assert_eq!(out.user_vote, None);
        let p = r.get_post(post.id).await.unwrap();
        assert_eq!((p.upvotes, p.downvotes), (1, 0));
        assert_eq!(r.aura("u/xyz").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn self_vote_is_rejected() {
        let (r, post) = seeded().await;
        let err = r.apply_vote(Target::post(post.id), VoteType::Upvote, "u/xyz").await.unwrap_err();
        assert!(matches!(err, RepoError::SelfVote));
    }

    #[tokio::test]
    async fn vote_on_missing_target_is_not_found() {
        let r = InMemRepo::new();
        let err = r.apply_vote(Target::comment(99), VoteType::Upvote, "u/abc").await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn aura_never_goes_negative() {
        let (r, post) = seeded().await;
        for voter in ["u/a", "u/b", "u/c", "u/d"] {
            r.apply_vote(Target::post(post.id), VoteType::Downvote, voter).await.unwrap();
        }
        assert_eq!(r.aura("u/xyz").await.unwrap(), 0);
        let p = r.get_post(post.id).await.unwrap();
        assert_eq!(p.upvotes - p.downvotes, -3);
    }

    #[tokio::test]
    async fn deleting_post_cascades_to_comments_and_votes() {
        let (r, post) = seeded().await;
        let mut ids = Vec::new();
        for i in 0..3 {
            let c = r.create_comment(NewComment {
                post_id: post.id,
                content: format!("comment {i}"),
                author_uid: "u/abc".into(),
            }).await.unwrap();
            r.apply_vote(Target::comment(c.id), VoteType::Upvote, "u/xyz").await.unwrap();
            ids.push(c.id);
        }
        r.delete_content(Target::post(post.id)).await.unwrap();
        for id in ids {
            assert!(matches!(r.get_comment(id).await, Err(RepoError::NotFound)));
        }
        assert!(r.read().votes.is_empty());
        assert!(matches!(r.delete_content(Target::post(post.id)).await, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn pinned_items_list_first() {
        let (r, first) = seeded().await;
        let second = r.create_post(NewPost {
            title: "Later".into(),
            content: "Second".into(),
            community: Community::General,
            author_uid: "u/abc".into(),
        }).await.unwrap();
        let listed: Vec<Id> = r.list_posts(None).await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(listed, vec![second.id, first.id]);

        assert!(r.toggle_pin(Target::post(first.id)).await.unwrap());
        let listed: Vec<Id> = r.list_posts(Some(Community::General)).await.unwrap().iter().map(|p| p.id).collect();
        assert_eq!(listed, vec![first.id, second.id]);
        assert!(r.list_posts(Some(Community::Anxiety)).await.unwrap().is_empty());

        assert!(!r.toggle_pin(Target::post(first.id)).await.unwrap());
    }

    #[tokio::test]
    async fn resolve_report_delete_and_dismiss() {
        let (r, post) = seeded().await;
        let report = r.create_report(NewReport {
            target_type: TargetType::Post,
            content_id: post.id,
            reason: "spam spam".into(),
            reporter_uid: "u/abc".into(),
        }).await.unwrap();
        assert_eq!(report.status, ReportStatus::Pending);

        let dismissed = r.resolve_report(report.id, ReportAction::Dismiss).await.unwrap();
        assert_eq!(dismissed.status, ReportStatus::Dismissed);
        assert!(dismissed.resolved_at.is_some());
        assert!(r.get_post(post.id).await.is_ok());

        let deleted = r.resolve_report(report.id, ReportAction::Delete).await.unwrap();
        assert_eq!(deleted.status, ReportStatus::Deleted);
        assert!(matches!(r.get_post(post.id).await, Err(RepoError::NotFound)));

        // resolving again still succeeds with the content gone
        assert!(r.resolve_report(report.id, ReportAction::Delete).await.is_ok());
        assert!(matches!(r.resolve_report(4242, ReportAction::Dismiss).await, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn membership_is_idempotent() {
        let r = InMemRepo::new();
        r.join("u/abc", Community::Stress).await.unwrap();
        r.join("u/abc", Community::Stress).await.unwrap();
        assert_eq!(r.memberships("u/abc").await.unwrap(), vec![Community::Stress]);
        r.leave("u/abc", Community::Stress).await.unwrap();
        r.leave("u/abc", Community::Stress).await.unwrap();
        assert!(!r.is_member("u/abc", Community::Stress).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let r = InMemRepo::new();
        let new = |uid: &str| NewAccount {
            uid: uid.into(),
            email: "a@b.c".into(),
            display_name: None,
            password_hash: "x".into(),
        };
        r.create_account(new("u/aaaaaa")).await.unwrap();
        assert!(matches!(r.create_account(new("u/bbbbbb")).await, Err(RepoError::Conflict(_))));
    }
}
