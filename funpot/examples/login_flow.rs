//! Login Flow Example
//!
//! Signs a launch payload the way the messaging platform does, logs in with
//! it and authenticates a follow-up request with the issued token.

use chrono::Utc;
use funpot::auth::{AuthConfig, AuthManager, encode_signed_init_data};
use funpot::db::InMemoryUserRepository;
use funpot::users::UserService;
use std::sync::Arc;

const BOT_TOKEN: &str = "12345:ABCDEF";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== FunPot Login Flow Example ===\n");

    let users = UserService::new(Arc::new(InMemoryUserRepository::new()));
    let auth = AuthManager::new(
        AuthConfig::new(BOT_TOKEN, "example_jwt_secret_of_reasonable_length"),
        users,
    )?;

    // Step 1: the platform signs the launch payload
    let auth_date = Utc::now().timestamp().to_string();
    let init_data = encode_signed_init_data(
        &[
            ("auth_date", auth_date.as_str()),
            ("query_id", "AAHdF6IQAAAAAN0XohDhrOrc"),
            (
                "user",
                r#"{"id":123456789,"first_name":"Alice","username":"alice","language_code":"en"}"#,
            ),
        ],
        BOT_TOKEN,
    )?;
    println!("initData: {init_data}\n");

    // Step 2: the web app posts it and gets a session
    let login = auth.authenticate(&init_data, Utc::now()).await?;
    println!("Profile: {} (referral code {})", login.user.id, login.user.referral_code);
    println!("Token expires at {}\n", login.expires_at);

    // Step 3: later requests carry the bearer token
    let header = format!("Bearer {}", login.token);
    let caller = auth.gate().authenticate(Some(&header))?;
    println!(
        "Authenticated {} (external id {})",
        caller.user_id(),
        caller.external_user_id()
    );

    // A tampered payload is rejected
    let tampered = init_data.replace("alice", "mallory");
    match auth.authenticate(&tampered, Utc::now()).await {
        Ok(_) => println!("Tampered payload unexpectedly accepted"),
        Err(e) => println!("Tampered payload rejected: {e}"),
    }

    Ok(())
}
