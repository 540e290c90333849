use std::time::{Duration, Instant};

use lexent_lib::{ApiClient, AppConfig, MemoryStore, RequestOptions};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    println!("🔧 Testing API connection...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("❌ Configuration invalid: {}", e);
            std::process::exit(1);
        }
    };

    println!("📊 API Configuration:");
    println!("  Base URL: {}", config.api_base_url);
    println!("  Timeout:  {} ms", config.request_timeout_ms);

    let url = match url::Url::parse(&config.api_base_url) {
        Ok(url) => url,
        Err(e) => {
            println!("❌ Base URL does not parse: {}", e);
            std::process::exit(1);
        }
    };
    let host = url.host_str().unwrap_or("localhost").to_string();
    let port = url.port_or_known_default().unwrap_or(80);

    println!("\n🔌 Testing TCP connection to {}:{}...", host, port);
    let connect = tokio::net::TcpStream::connect((host.as_str(), port));
    match tokio::time::timeout(Duration::from_secs(5), connect).await {
        Ok(Ok(_)) => println!("✅ TCP connection to {}:{} successful", host, port),
        Ok(Err(e)) => {
            println!("❌ TCP connection failed: {}", e);
            std::process::exit(1);
        }
        Err(_) => {
            println!("❌ TCP connection timed out");
            std::process::exit(1);
        }
    }

    println!("\n🌐 Requesting /api/cefr-levels without credentials...");
    let client = ApiClient::new(&config, std::sync::Arc::new(MemoryStore::new()));
    let started = Instant::now();
    match client
        .request("/api/cefr-levels", RequestOptions::new().anonymous())
        .await
    {
        Ok(_) => println!("✅ API answered in {:?}", started.elapsed()),
        Err(e) if e.is_unauthorized() => {
            println!("✅ API reachable in {:?} (401 without a token, as expected)", started.elapsed())
        }
        Err(e) if e.is_timeout() => {
            println!("❌ Request timed out after {:?}", started.elapsed());
            std::process::exit(1);
        }
        Err(e) => {
            println!("❌ Request failed: {}", e);
            std::process::exit(1);
        }
    }

    println!("\n🎉 API connection test completed");
}
