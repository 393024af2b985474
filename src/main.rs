// Entrypoint for the CLI application.
// - Keeps `main` small: configure a client from the environment,
//   make sure an access token is in place, then hand over to the
//   explorer loop.
// - Returns `anyhow::Result` so every failure surfaces with context.

use anyhow::Context;
use cirrus_notes::api::{Client, DEFAULT_BASE_URL};
use cirrus_notes::error::TOKEN_EXPIRED_CODE;
use cirrus_notes::model::Credentials;
use cirrus_notes::ui;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let app = Credentials {
        token: std::env::var("CIRRUS_APP_TOKEN").context("CIRRUS_APP_TOKEN is not set")?,
        secret: std::env::var("CIRRUS_APP_SECRET").context("CIRRUS_APP_SECRET is not set")?,
    };
    let base_url =
        std::env::var("CIRRUS_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
    let mut client = Client::new(app, base_url)?;

    match ui::load_access_token() {
        Some(token) => client.set_access_token(token),
        None => ui::request_access(&mut client)?,
    }

    let user = match client.user_info() {
        Ok(user) => user,
        Err(error) if error.server_code() == Some(TOKEN_EXPIRED_CODE) => {
            // The saved token is stale; run the flow again and retry once.
            ui::request_access(&mut client)?;
            client.user_info().context("fetch user info")?
        }
        Err(error) => return Err(error).context("fetch user info"),
    };
    println!(
        "Hi, {} (last login at {})",
        user.user,
        user.last_login_time.format("%Y-%m-%d %H:%M:%S")
    );

    ui::explore(&client)?;
    Ok(())
}
