use log::warn;
use serde_json::json;

use crate::api::{ApiClient, Method, RequestOptions};
use crate::cache::{ListCache, CLASSES};
use crate::error::Result;
use crate::models::{Kelas, KelasInput, User};

use super::{delete, with_json};

/// Classes ("kelas"): lecturer CRUD plus student join-by-code.
#[derive(Clone)]
pub struct ClassService {
    client: ApiClient,
    cache: ListCache,
}

impl ClassService {
    pub fn new(client: ApiClient) -> Self {
        let cache = ListCache::new(client.store().clone());
        Self { client, cache }
    }

    /// Fetches the caller's classes and refreshes the local mirror.
    pub async fn list(&self) -> Result<Vec<Kelas>> {
        let classes: Vec<Kelas> = self.client.json("/api/kelas", RequestOptions::new()).await?;
        if let Err(e) = self.cache.write(CLASSES, &classes) {
            warn!("Could not mirror class list: {}", e);
        }
        Ok(classes)
    }

    /// Last list seen from the server, for rendering before the fetch completes.
    pub fn cached(&self) -> Option<Vec<Kelas>> {
        self.cache.read(CLASSES)
    }

    pub async fn get(&self, id: u64) -> Result<Kelas> {
        self.client
            .json(&format!("/api/kelas/{}", id), RequestOptions::new())
            .await
    }

    pub async fn create(&self, kelas: &KelasInput) -> Result<Kelas> {
        self.client
            .json("/api/kelas", with_json(Method::Post, kelas)?)
            .await
    }

    pub async fn update(&self, id: u64, kelas: &KelasInput) -> Result<Kelas> {
        self.client
            .json(&format!("/api/kelas/{}", id), with_json(Method::Put, kelas)?)
            .await
    }

    pub async fn delete(&self, id: u64) -> Result<()> {
        self.client
            .request(&format!("/api/kelas/{}", id), delete())
            .await?;
        Ok(())
    }

    pub async fn join(&self, code: &str) -> Result<Kelas> {
        let options = RequestOptions::new()
            .method(Method::Post)
            .json(json!({ "code": code.trim() }));
        self.client.json("/api/kelas/join", options).await
    }

    pub async fn members(&self, id: u64) -> Result<Vec<User>> {
        self.client
            .json(&format!("/api/kelas/{}/members", id), RequestOptions::new())
            .await
    }
}
