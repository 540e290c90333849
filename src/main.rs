use anyhow::{Context, Result};
use log::{error, info};

use lexent_lib::services::{LoginForm, Services};
use lexent_lib::{open_store, ApiClient, AppConfig};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        error!("❌ {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("loading configuration")?;

    println!("\n=== Lexent Configuration ===");
    println!("  API base URL:     {}", config.api_base_url);
    println!("  Request timeout:  {} ms", config.request_timeout_ms);
    println!("  Default retries:  {}", config.default_retries);
    println!("  Answer debounce:  {} ms", config.answer_debounce_ms);
    println!(
        "  Session store:    {}",
        config
            .storage_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    );

    let store = open_store(&config).context("opening session store")?;
    let services = Services::new(ApiClient::new(&config, store));

    if let (Ok(email), Ok(password)) = (std::env::var("LEXENT_EMAIL"), std::env::var("LEXENT_PASSWORD")) {
        println!("\n🔐 Logging in as {}...", email);
        services
            .auth
            .login(&LoginForm { email, password })
            .await
            .context("login failed")?;
    }

    match services.auth.current_user() {
        Some(user) => {
            println!("\n✅ Signed in as {} <{}> ({})", user.name, user.email, user.role.as_str());
            println!("   CEFR level: {}", user.cefr_level.as_deref().unwrap_or("not placed yet"));
        }
        None => {
            println!("\n⚠️  No stored session. Set LEXENT_EMAIL and LEXENT_PASSWORD to log in.");
            return Ok(());
        }
    }

    let levels = services.cefr.levels().await.context("fetching CEFR levels")?;
    println!("\n📚 {} CEFR level(s):", levels.len());
    for level in levels {
        println!("   - {} {}", level.code, level.name);
    }

    info!("Done");
    Ok(())
}
