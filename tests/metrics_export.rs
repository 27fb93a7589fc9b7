//! Installs the process-wide recorder, so it lives in its own test binary.
#![cfg(feature = "inmem-store")]

mod common;

use actix_web::{test, web, App};
use chetana::models::Community;
use chetana::{configure, telemetry};
use serde_json::json;

use common::{forum_post, seed_post, state};

#[actix_web::test]
async fn forum_counters_reach_the_metrics_page() {
    let handle = telemetry::install().unwrap();
    let (repo, state) = state();
    let app = test::init_service(App::new().app_data(web::Data::new(state.with_metrics(handle))).configure(configure)).await;
    let post = seed_post(&repo, "u/xyz", Community::General).await;

    let req = forum_post("vote", json!({"postId": post.id, "voteType": "upvote", "voterUid": "u/abc"})).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 200);
    let req = forum_post(
        "report",
        json!({"type": "post", "id": post.id, "reason": "spam link", "reporterUid": "u/abc"}),
    )
    .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 201);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(resp.status(), 200);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.contains("forum_votes_total{vote=\"upvote\"} 1"), "{body}");
    assert!(body.contains("forum_reports_total 1"), "{body}");
}
