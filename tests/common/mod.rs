#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use lexent_lib::storage::{self, MemoryStore, SessionStore};
use lexent_lib::models::{Role, User};
use lexent_lib::ApiClient;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server");
    });
    format!("http://{}", addr)
}

pub fn student(id: u64) -> User {
    User {
        id,
        name: "Ayu".into(),
        email: "ayu@example.com".into(),
        role: Role::Student,
        cefr_level: Some("A2".into()),
    }
}

/// Client against `base` with a logged-in student in a fresh memory store.
pub fn logged_in_client(base: &str) -> (ApiClient, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    storage::save_login(store.as_ref(), "test-token", &student(7)).expect("seed store");
    let dyn_store: Arc<dyn SessionStore> = store.clone();
    (ApiClient::with_base_url(base, dyn_store), store)
}
