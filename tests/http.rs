mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use arkivdium::server::{create_router, OWNER_HEADER};
use common::{harness, FakeCrawler, Harness};

fn router(h: &Harness) -> Router {
    create_router(h.services.clone())
}

fn get(uri: &str, owner: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(owner) = owner {
        builder = builder.header(OWNER_HEADER, owner);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_owner_header_is_required() {
    let h = harness(FakeCrawler::default()).await;
    let response = router(&h).oneshot(get("/archives", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_submission_is_rejected() {
    let h = harness(FakeCrawler::default()).await;
    let request = Request::builder()
        .method("POST")
        .uri("/archives")
        .header(OWNER_HEADER, "alice")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"setting_type":"standard","url":"https://example.com","include_domains":["example.com; rm -rf /"],"email":"owner@example.org"}"#,
        ))
        .unwrap();

    let response = router(&h).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(h.crawler.commands().is_empty());
}

#[tokio::test]
async fn test_unknown_archive_is_not_found() {
    let h = harness(FakeCrawler::default()).await;
    let response = router(&h)
        .oneshot(get("/archives/does-not-exist", Some("alice")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submit_download_preview_delete() {
    let h = harness(FakeCrawler::default()).await;
    let submit = Request::builder()
        .method("POST")
        .uri("/archives")
        .header(OWNER_HEADER, "alice")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"url":"https://example.com","include_domains":["example.com"],"email":"owner@example.org"}"#,
        ))
        .unwrap();
    let response = router(&h).oneshot(submit).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // The run continues in the background and emails when it is done.
    for _ in 0..100 {
        if !h.mailer.sent().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let archives = h.services.archives.list("alice", 0).await.unwrap();
    let record = archives.first().cloned().expect("archive was created");

    let listing = json_body(
        router(&h)
            .oneshot(get("/archives?page=0", Some("alice")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(listing["total"], 1);
    assert_eq!(listing["archives"][0]["id"], record.id.as_str());

    let download = router(&h)
        .oneshot(get(&format!("/archives/{}", record.id), Some("alice")))
        .await
        .unwrap();
    assert_eq!(download.status(), StatusCode::OK);
    let disposition = download.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.contains(&record.file_name));

    // Another owner sees nothing.
    let foreign = router(&h)
        .oneshot(get(&format!("/archives/{}", record.id), Some("bob")))
        .await
        .unwrap();
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);

    let preview = router(&h)
        .oneshot(get(&format!("/archives/{}/preview", record.id), Some("alice")))
        .await
        .unwrap();
    assert_eq!(preview.status(), StatusCode::OK);

    let escape = router(&h)
        .oneshot(get(
            &format!("/archives/{}/preview/..%2F..%2Fdb.sqlite", record.id),
            Some("alice"),
        ))
        .await
        .unwrap();
    assert_eq!(escape.status(), StatusCode::NOT_FOUND);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/archives/{}", record.id))
        .header(OWNER_HEADER, "alice")
        .body(Body::empty())
        .unwrap();
    let deleted = json_body(router(&h).oneshot(delete).await.unwrap()).await;
    assert_eq!(deleted["deleted"], record.file_name.as_str());
    assert!(h.services.archives.list("alice", 0).await.unwrap().is_empty());
}
