use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::auth::Role;
use crate::chat::{ChatReply, ChatRole, ChatTurn, Emotion};
use crate::error::ApiErrorBody;
use crate::models::{
    Assessment, Comment, CommentView, Community, Post, PostView, Report, ReportAction, ReportStatus, Streak,
    TargetType, VoteOutcome, VoteType,
};
use crate::routes::{account, assessment, chat, forum};
use crate::streak::StreakUpdate;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        forum::forum_get,
        forum::forum_post,
        forum::forum_delete,
        assessment::submit_assessment,
        assessment::list_assessments,
        assessment::get_streak,
        chat::chat,
        chat::chat_history,
        account::register,
        account::login,
        account::me,
        crate::routes::health,
    ),
    components(schemas(
        Community, TargetType, VoteType, Post, Comment, PostView, CommentView, VoteOutcome,
        Report, ReportStatus, ReportAction, Streak, StreakUpdate, Assessment, ApiErrorBody, Role,
        Emotion, ChatRole, ChatTurn, ChatReply,
        forum::CreatePostBody, forum::CreateCommentBody, forum::VoteBody, forum::JoinBody,
        forum::PinBody, forum::ReportBody, forum::ResolveReportBody,
        assessment::SubmitAssessmentRequest, assessment::SubmitAssessmentResponse,
        chat::ChatRequest,
        account::RegisterRequest, account::LoginRequest, account::SessionResponse, account::MeResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "forum", description = "Posts, comments, votes, aura and moderation"),
        (name = "wellness", description = "Assessments, streaks and chat"),
        (name = "auth", description = "Accounts and sessions"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_forum_and_auth_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/forum"));
        assert!(doc.paths.paths.contains_key("/api/auth/register"));
        assert!(doc.paths.paths.contains_key("/api/assessments/streak"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
