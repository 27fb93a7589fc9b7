#![allow(dead_code)]

use std::sync::Arc;

use actix_web::test::TestRequest;
use chetana::models::{Comment, Community, NewComment, NewPost, Post};
use chetana::repo::inmem::InMemRepo;
use chetana::repo::PostRepo;
use chetana::AppState;
use serde_json::Value;

pub const JWT_SECRET: &str = "test-secret-must-be-32-bytes-long!!";
pub const ADMIN: &str = "u/kklt3o";

pub fn set_jwt_secret() {
    std::env::set_var("JWT_SECRET", JWT_SECRET);
}

/// A fresh store plus handler state sharing it.
pub fn state() -> (InMemRepo, AppState) {
    let repo = InMemRepo::new();
    let state = AppState::new(Arc::new(repo.clone()));
    (repo, state)
}

pub fn forum_post(action: &str, body: Value) -> TestRequest {
    TestRequest::post().uri(&format!("/api/forum?action={action}")).set_json(body)
}

pub fn forum_get(query: &str) -> TestRequest {
    TestRequest::get().uri(&format!("/api/forum?{query}"))
}

pub fn forum_delete(query: &str) -> TestRequest {
    TestRequest::delete().uri(&format!("/api/forum?action=delete-content&{query}"))
}

pub async fn seed_post(repo: &InMemRepo, author: &str, community: Community) -> Post {
    repo.create_post(NewPost {
        title: "Feeling better today".into(),
        content: "Small steps count.".into(),
        community,
        author_uid: author.into(),
    })
    .await
    .unwrap()
}

pub async fn seed_comment(repo: &InMemRepo, post_id: i64, author: &str) -> Comment {
    repo.create_comment(NewComment { post_id, content: "Proud of you".into(), author_uid: author.into() })
        .await
        .unwrap()
}
