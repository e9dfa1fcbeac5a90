//! Integration tests for the launch login flow.
//!
//! Tests payload verification, profile sync, token issuance and the bearer
//! gate together against the in-memory store.

use chrono::{DateTime, Duration, Utc};
use funpot::auth::{AuthConfig, AuthError, AuthManager, encode_signed_init_data};
use funpot::db::InMemoryUserRepository;
use funpot::users::{UserService, referral_code};
use std::sync::Arc;

const BOT_TOKEN: &str = "12345:ABCDEF";
const JWT_SECRET: &str = "integration_test_jwt_secret_0123456789";

fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap()
}

/// Helper to create an auth manager over a shared in-memory store
fn setup_auth_manager(repo: InMemoryUserRepository) -> AuthManager {
    let users = UserService::new(Arc::new(repo));
    let mut config = AuthConfig::new(BOT_TOKEN, JWT_SECRET);
    config.init_data_max_age = Duration::hours(1);
    AuthManager::new(config, users).expect("valid auth config")
}

/// Helper to build a signed launch payload
fn launch_payload(auth_date: i64, user: &str) -> String {
    encode_signed_init_data(
        &[
            ("auth_date", auth_date.to_string().as_str()),
            ("query_id", "AAHdF6IQAAAAAN0XohDhrOrc"),
            ("user", user),
        ],
        BOT_TOKEN,
    )
    .expect("signing succeeds")
}

#[tokio::test]
async fn test_first_login_creates_profile() {
    let repo = InMemoryUserRepository::new();
    let auth = setup_auth_manager(repo.clone());
    let raw = launch_payload(
        1_700_000_000,
        r#"{"id":123456789,"first_name":"Alice","username":"alice"}"#,
    );

    let login = auth.authenticate(&raw, at(1_700_001_800)).await.unwrap();

    assert_eq!(login.user.id, "ext_123456789");
    assert_eq!(login.user.external_user_id, 123456789);
    assert_eq!(login.user.first_name, "Alice");
    assert_eq!(login.user.referral_code, referral_code(123456789));
    assert_eq!(login.expires_at, at(1_700_001_800) + Duration::minutes(15));
    assert_eq!(repo.len().await, 1);
}

#[tokio::test]
async fn test_expired_payload_is_rejected() {
    let repo = InMemoryUserRepository::new();
    let auth = setup_auth_manager(repo.clone());
    let raw = launch_payload(1_700_000_000, r#"{"id":123456789}"#);

    let err = auth.authenticate(&raw, at(1_700_005_000)).await.unwrap_err();

    assert!(matches!(err, AuthError::Expired));
    assert!(err.is_trust_error());
    assert!(repo.is_empty().await);
}

#[tokio::test]
async fn test_repeat_login_updates_profile() {
    let repo = InMemoryUserRepository::new();
    let auth = setup_auth_manager(repo.clone());

    let first = auth
        .authenticate(
            &launch_payload(1_700_000_000, r#"{"id":42,"username":"before"}"#),
            at(1_700_000_010),
        )
        .await
        .unwrap();

    let second = auth
        .authenticate(
            &launch_payload(1_700_000_500, r#"{"id":42,"username":"after"}"#),
            at(1_700_000_510),
        )
        .await
        .unwrap();

    assert_eq!(repo.len().await, 1);
    assert_eq!(second.user.id, first.user.id);
    assert_eq!(second.user.username, "after");
    assert_eq!(second.user.created_at, first.user.created_at);
    assert_eq!(second.user.referral_code, first.user.referral_code);
    assert!(second.user.updated_at >= first.user.updated_at);

    let stored = auth.users().get_by_external_id(42).await.unwrap();
    assert_eq!(stored.username, "after");
}

#[tokio::test]
async fn test_token_from_login_passes_gate() {
    let auth = setup_auth_manager(InMemoryUserRepository::new());
    let now = at(1_700_000_100);
    let login = auth
        .authenticate(&launch_payload(1_700_000_000, r#"{"id":7}"#), now)
        .await
        .unwrap();

    let header = format!("Bearer {}", login.token);
    let caller = auth.gate().authenticate_at(Some(&header), now).unwrap();
    assert_eq!(caller.user_id(), login.user.id);
    assert_eq!(caller.external_user_id(), 7);

    let after_expiry = login.expires_at + Duration::seconds(1);
    assert!(matches!(
        auth.gate().authenticate_at(Some(&header), after_expiry),
        Err(AuthError::Unauthenticated)
    ));
}

#[tokio::test]
async fn test_token_from_other_deployment_is_rejected() {
    let now = at(1_700_000_100);
    let ours = setup_auth_manager(InMemoryUserRepository::new());
    let theirs = AuthManager::new(
        AuthConfig::new(BOT_TOKEN, "a_completely_different_jwt_secret"),
        UserService::new(Arc::new(InMemoryUserRepository::new())),
    )
    .unwrap();

    let login = theirs
        .authenticate(&launch_payload(1_700_000_000, r#"{"id":7}"#), now)
        .await
        .unwrap();

    assert!(matches!(
        ours.issuer().parse_at(&login.token, now),
        Err(AuthError::InvalidSignature)
    ));
}

#[tokio::test]
async fn test_concurrent_first_logins_create_one_profile() {
    let repo = InMemoryUserRepository::new();
    let auth = setup_auth_manager(repo.clone());
    let raw = launch_payload(1_700_000_000, r#"{"id":31337,"username":"racer"}"#);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let auth = auth.clone();
        let raw = raw.clone();
        handles.push(tokio::spawn(async move {
            auth.authenticate(&raw, at(1_700_000_001)).await
        }));
    }

    let mut referral_codes = Vec::new();
    for handle in handles {
        let login = handle.await.unwrap().unwrap();
        assert_eq!(login.user.id, "ext_31337");
        referral_codes.push(login.user.referral_code);
    }

    assert_eq!(repo.len().await, 1);
    referral_codes.dedup();
    assert_eq!(referral_codes.len(), 1);
}

#[tokio::test]
async fn test_payload_errors_are_client_errors() {
    let auth = setup_auth_manager(InMemoryUserRepository::new());
    let now = at(1_700_000_100);

    let no_user = encode_signed_init_data(&[("auth_date", "1700000000")], BOT_TOKEN).unwrap();
    let bad_user = launch_payload(1_700_000_000, r#"{"name":"no id"}"#);

    for (raw, expected) in [
        ("", "Init data missing hash"),
        ("hash=abcd", "Init data missing auth_date"),
        ("hash=abcd&auth_date=soon", "Init data auth_date is not a unix timestamp"),
        (no_user.as_str(), "Init data missing user"),
        (bad_user.as_str(), "Init data user is malformed"),
    ] {
        let err = auth.authenticate(raw, now).await.unwrap_err();
        assert!(err.is_payload_error(), "{raw}: {err:?}");
        assert_eq!(err.client_message(), expected);
    }
}
