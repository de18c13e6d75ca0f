//! GithubBlobStore against a mocked contents API

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use referral_core::store::{BlobStore, GithubBlobStore, GithubConfig, StoreError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONTENTS: &str = "/repos/acme/referrals/contents/referrals.json";

fn store(server: &MockServer, branch: &str) -> GithubBlobStore {
    GithubBlobStore::new(
        GithubConfig::new("test-token", "acme/referrals", branch).with_api_base(server.uri()),
    )
    .unwrap()
}

/// base64 wrapped the way the contents API returns it
fn wrapped(bytes: &[u8]) -> String {
    let encoded = BASE64.encode(bytes);
    encoded
        .as_bytes()
        .chunks(8)
        .map(|c| std::str::from_utf8(c).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn test_read_decodes_wrapped_content() {
    let server = MockServer::start().await;
    let body = br#"{"ALL":{"1":{"team_label":"TEAM1","referrals":3}}}"#;

    Mock::given(method("GET"))
        .and(path(CONTENTS))
        .and(query_param("ref", "master"))
        .and(header("authorization", "token test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "abc123",
            "content": wrapped(body),
        })))
        .mount(&server)
        .await;

    let bytes = store(&server, "master").read_blob("referrals.json").await.unwrap();
    assert_eq!(bytes.unwrap(), body);
}

#[tokio::test]
async fn test_read_falls_back_to_main() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONTENTS))
        .and(query_param("ref", "dev"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CONTENTS))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": BASE64.encode(b"{}"),
        })))
        .mount(&server)
        .await;

    let bytes = store(&server, "dev").read_blob("referrals.json").await.unwrap();
    assert_eq!(bytes.unwrap(), b"{}");
}

#[tokio::test]
async fn test_read_missing_everywhere_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONTENTS))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(store(&server, "master")
        .read_blob("referrals.json")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_write_sends_existing_sha() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONTENTS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sha": "abc123",
            "content": BASE64.encode(b"{}"),
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(CONTENTS))
        .and(body_partial_json(json!({
            "message": "Auto-update referrals.json",
            "branch": "master",
            "sha": "abc123",
            "content": BASE64.encode(b"[1]"),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    store(&server, "master")
        .write_blob("referrals.json", b"[1]")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_write_rejection_is_remote_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(CONTENTS))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(CONTENTS))
        .respond_with(ResponseTemplate::new(409).set_body_string("conflict"))
        .mount(&server)
        .await;

    let err = store(&server, "master")
        .write_blob("referrals.json", b"[]")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Remote(ref m) if m.contains("409")));
}
