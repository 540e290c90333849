use std::env;
use std::fs;
use std::path::Path;

// Settings that are baked into the binary as compile-time defaults.
// Runtime LEXENT_* variables still take precedence (see src/config.rs).
const EMBEDDED_KEYS: &[&str] = &[
    "LEXENT_API_BASE_URL",
    "LEXENT_REQUEST_TIMEOUT_MS",
    "LEXENT_DEFAULT_RETRIES",
];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    for key in EMBEDDED_KEYS {
        println!("cargo:rerun-if-env-changed={}", key);
    }

    if let Err(e) = dotenvy::dotenv() {
        println!("cargo:warning=BUILD.RS: No .env loaded ({}). Using system environment variables.", e);
    }

    // A parent .env is shared with the web frontend checkout.
    let parent_env = Path::new("../.env");
    if parent_env.exists() {
        if let Ok(contents) = fs::read_to_string(parent_env) {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let key = key.trim();
                    if !EMBEDDED_KEYS.contains(&key) || env::var(key).is_ok() {
                        continue;
                    }
                    let value = match value.find('#') {
                        Some(comment_pos) => value[..comment_pos].trim(),
                        None => value.trim(),
                    };
                    env::set_var(key, value);
                }
            }
        }
    }

    for key in EMBEDDED_KEYS {
        match env::var(key) {
            Ok(value) => {
                println!("cargo:rustc-env={}={}", key, value);
                println!("cargo:warning=Embedded {} ({})", key, value);
            }
            Err(_) => println!("cargo:warning={} not found in environment during build", key),
        }
    }
}
