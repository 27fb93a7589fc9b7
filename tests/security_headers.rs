#![cfg(feature = "inmem-store")]

mod common;

use actix_web::{test, web, App};
use chetana::{configure, SecurityHeaders};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value;

use common::state;

#[actix_web::test]
async fn security_headers_present_without_hsts_by_default() {
    let (_repo, state) = state();
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::default())
            .app_data(web::Data::new(state))
            .configure(configure),
    )
    .await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.status().is_success());
    let headers = resp.headers();
    let csp = headers.get("content-security-policy").unwrap().to_str().unwrap();
    assert!(csp.contains("worker-src 'self'"));
    assert!(csp.contains("manifest-src 'self'"));
    assert_eq!(headers.get("referrer-policy").unwrap(), "no-referrer");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert!(headers.get("permissions-policy").is_some());
    assert!(headers.get("strict-transport-security").is_none());
}

#[actix_web::test]
async fn hsts_is_opt_in() {
    let (_repo, state) = state();
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::new(true))
            .app_data(web::Data::new(state))
            .configure(configure),
    )
    .await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert!(resp.headers().get("strict-transport-security").is_some(), "HSTS header missing");
}

#[actix_web::test]
async fn error_responses_carry_headers_too() {
    let (_repo, state) = state();
    let app = test::init_service(
        App::new()
            .wrap(SecurityHeaders::default())
            .app_data(web::Data::new(state))
            .configure(configure),
    )
    .await;
    let req = test::TestRequest::get().uri("/api/forum?action=posts&postId=1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
    assert!(resp.headers().get("x-frame-options").is_some());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn health_and_metrics_endpoints() {
    let (_repo, state) = state();
    let app = test::init_service(App::new().app_data(web::Data::new(state.clone())).configure(configure)).await;
    let body: Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(body["status"], "ok");
    // no recorder configured
    let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(resp.status(), 404);

    let handle = PrometheusBuilder::new().build_recorder().handle();
    let app = test::init_service(
        App::new().app_data(web::Data::new(state.with_metrics(handle))).configure(configure),
    )
    .await;
    let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("content-type").unwrap().to_str().unwrap().starts_with("text/plain"));
}
