//! People API provider against mocked Google endpoints

use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use referral_core::{ContactsProvider, ProviderError};
use referral_node::google::{AuthorizedUser, CredentialStore, PeopleApiProvider};

const CONNECTIONS: &str = "/people/me/connections";

async fn credentials(dir: &tempfile::TempDir, creds: AuthorizedUser) -> Arc<CredentialStore> {
    let store = Arc::new(CredentialStore::new(dir.path().join("token.json")));
    store.save(&creds).await.unwrap();
    store
}

fn fresh_token() -> AuthorizedUser {
    AuthorizedUser {
        token: Some("access-1".into()),
        refresh_token: Some("refresh-1".into()),
        expiry: Some(Utc::now() + Duration::hours(1)),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_lists_every_page() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path(CONNECTIONS))
        .and(query_param("pageToken", "p2"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "connections": [
                {"resourceName": "people/c3", "biographies": [{"value": "TEAM4 member"}]}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CONNECTIONS))
        .and(query_param("personFields", "names,emailAddresses,organizations,biographies,userDefined"))
        .and(query_param("pageSize", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "connections": [
                {"resourceName": "people/c1", "names": [{"displayName": "Ada TEAM1"}]},
                {"resourceName": "people/c2", "names": "not-a-list"}
            ],
            "nextPageToken": "p2"
        })))
        .mount(&server)
        .await;

    let provider = PeopleApiProvider::new(credentials(&dir, fresh_token()).await, server.uri()).with_page_size(2);
    let contacts = provider.list_contacts().await.unwrap();

    assert_eq!(contacts.len(), 3);
    assert_eq!(contacts[2].resource_name.as_deref(), Some("people/c3"));
    assert!(contacts[1].names.is_none());
}

#[tokio::test]
async fn test_missing_token_file_is_no_credentials() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CredentialStore::new(dir.path().join("token.json")));

    let provider = PeopleApiProvider::new(store, server.uri());
    assert_eq!(provider.list_contacts().await, Err(ProviderError::NoCredentials));
}

#[tokio::test]
async fn test_unauthorized_is_no_credentials() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path(CONNECTIONS))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = PeopleApiProvider::new(credentials(&dir, fresh_token()).await, server.uri());
    assert_eq!(provider.list_contacts().await, Err(ProviderError::NoCredentials));
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path(CONNECTIONS))
        .respond_with(ResponseTemplate::new(503).set_body_string("backend unavailable"))
        .mount(&server)
        .await;

    let provider = PeopleApiProvider::new(credentials(&dir, fresh_token()).await, server.uri());
    match provider.list_contacts().await {
        Err(ProviderError::Transient(message)) => assert!(message.contains("503")),
        other => panic!("expected transient error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_saved() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CONNECTIONS))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let expired = AuthorizedUser {
        token: Some("access-1".into()),
        refresh_token: Some("refresh-1".into()),
        token_uri: format!("{}/token", server.uri()),
        client_id: "cid".into(),
        client_secret: "secret".into(),
        expiry: Some(Utc::now() - Duration::minutes(5)),
        ..Default::default()
    };
    let store = credentials(&dir, expired).await;
    let provider = PeopleApiProvider::new(store.clone(), server.uri());

    assert!(provider.list_contacts().await.unwrap().is_empty());

    let saved = store.load().await.unwrap().unwrap();
    assert_eq!(saved.token.as_deref(), Some("access-2"));
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn test_failed_refresh_is_no_credentials() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let expired = AuthorizedUser {
        token: Some("access-1".into()),
        refresh_token: Some("refresh-1".into()),
        token_uri: format!("{}/token", server.uri()),
        expiry: Some(Utc::now() - Duration::minutes(5)),
        ..Default::default()
    };
    let provider = PeopleApiProvider::new(credentials(&dir, expired).await, server.uri());
    assert_eq!(provider.list_contacts().await, Err(ProviderError::NoCredentials));
}
