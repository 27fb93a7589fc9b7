#![cfg(feature = "inmem-store")]

mod common;

use actix_web::{test, web, App};
use chetana::configure;
use chetana::models::{Community, Target};
use chetana::repo::{PostRepo, RepoError, VoteRepo};
use serde_json::{json, Value};

use common::{forum_delete, forum_get, forum_post, seed_comment, seed_post, state, ADMIN};

#[actix_web::test]
async fn only_admins_pin_and_pinned_posts_list_first() {
    let (repo, state) = state();
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;
    let older = seed_post(&repo, "u/a", Community::General).await;
    let newer = seed_post(&repo, "u/b", Community::General).await;

    let req = forum_post("pin", json!({"postId": older.id, "pinnerUid": "u/a"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = forum_post("pin", json!({"postId": older.id, "pinnerUid": ADMIN})).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["pinned"], true);

    let list: Value = test::call_and_read_body_json(&app, forum_get("action=posts").to_request()).await;
    assert_eq!(list[0]["id"], older.id);
    assert_eq!(list[0]["pinned"], true);
    assert_eq!(list[1]["id"], newer.id);

    let req = forum_post("pin", json!({"postId": older.id, "pinnerUid": ADMIN})).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["pinned"], false);
    let list: Value = test::call_and_read_body_json(&app, forum_get("action=posts").to_request()).await;
    assert_eq!(list[0]["id"], newer.id);

    let req = forum_post("pin", json!({"commentId": 777, "pinnerUid": ADMIN})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn report_reason_is_validated_after_trimming() {
    let (repo, state) = state();
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;
    let post = seed_post(&repo, "u/a", Community::Depression).await;
    let report = |reason: String| forum_post("report", json!({"type": "post", "id": post.id, "reason": reason, "reporterUid": "u/r"}));

    for bad in ["bad".to_string(), "   spam    ".to_string(), "x".repeat(501)] {
        let resp = test::call_service(&app, report(bad).to_request()).await;
        assert_eq!(resp.status(), 400);
    }
    let resp = test::call_service(&app, report("x".repeat(500)).to_request()).await;
    assert_eq!(resp.status(), 201);
    let resp = test::call_service(&app, report("  spam!  ".into()).to_request()).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert!(body["reportId"].as_i64().is_some());

    let req = forum_post("report", json!({"type": "comment", "id": 31337, "reason": "harassment", "reporterUid": "u/r"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
    let req = forum_post("report", json!({"type": "thread", "id": post.id, "reason": "harassment", "reporterUid": "u/r"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn admins_review_and_resolve_reports() {
    let (repo, state) = state();
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;
    let keep = seed_post(&repo, "u/a", Community::General).await;
    let drop = seed_post(&repo, "u/b", Community::General).await;
    let drop_comment = seed_comment(&repo, drop.id, "u/c").await;

    let file = |id: i64| forum_post("report", json!({"type": "post", "id": id, "reason": "off topic", "reporterUid": "u/r"}));
    let first: Value = test::call_and_read_body_json(&app, file(keep.id).to_request()).await;
    let second: Value = test::call_and_read_body_json(&app, file(drop.id).to_request()).await;

    let req = forum_get("action=reports&adminUid=u/r").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);
    let req = forum_get(&format!("action=reports&adminUid={ADMIN}&status=pending")).to_request();
    let pending: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(pending.as_array().unwrap().len(), 2);
    assert_eq!(pending[0]["type"], "post");

    let resolve = |id: &Value, action: &str, who: &str| {
        forum_post("resolve-report", json!({"reportId": id, "action": action, "resolverUid": who}))
    };
    let req = resolve(&first["reportId"], "dismiss", "u/r").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let body: Value = test::call_and_read_body_json(&app, resolve(&first["reportId"], "dismiss", ADMIN).to_request()).await;
    assert_eq!(body["status"], "dismissed");
    assert!(repo.get_post(keep.id).await.is_ok());

    let body: Value = test::call_and_read_body_json(&app, resolve(&second["reportId"], "delete", ADMIN).to_request()).await;
    assert_eq!(body["status"], "deleted");
    assert!(matches!(repo.get_post(drop.id).await, Err(RepoError::NotFound)));
    assert!(matches!(repo.get_comment(drop_comment.id).await, Err(RepoError::NotFound)));

    // resolving again re-runs the branch even though the post is gone
    let resp = test::call_service(&app, resolve(&second["reportId"], "delete", ADMIN).to_request()).await;
    assert_eq!(resp.status(), 200);

    let req = resolve(&json!(4040), "delete", ADMIN).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
    let req = resolve(&first["reportId"], "ban", ADMIN).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    let req = forum_get(&format!("action=reports&adminUid={ADMIN}&status=pending")).to_request();
    let pending: Value = test::call_and_read_body_json(&app, req).await;
    assert!(pending.as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn delete_content_requires_author_or_admin_and_cascades() {
    let (repo, state) = state();
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(configure)).await;
    let post = seed_post(&repo, "u/author", Community::Anxiety).await;
    let mine = seed_comment(&repo, post.id, "u/commenter").await;
    let other = seed_comment(&repo, post.id, "u/someone").await;
    repo.apply_vote(Target::comment(other.id), chetana::models::VoteType::Upvote, "u/voter").await.unwrap();

    let req = forum_delete(&format!("type=comment&id={}&authorUid=u/stranger", mine.id)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 403);

    let req = forum_delete(&format!("type=comment&id={}&authorUid=u/commenter", mine.id)).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);

    let req = forum_delete(&format!("type=post&id={}&authorUid={ADMIN}", post.id)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    assert!(matches!(repo.get_comment(other.id).await, Err(RepoError::NotFound)));
    let req = forum_get(&format!("action=comments&postId={}", post.id)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
    // aura already earned survives deletion
    assert_eq!(repo.aura("u/someone").await.unwrap(), 3);

    let req = forum_delete(&format!("type=post&id={}&authorUid={ADMIN}", post.id)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
    let req = forum_delete("type=post&authorUid=u/author").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}
