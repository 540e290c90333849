use crate::api::{ApiClient, Method, RequestOptions};
use crate::error::Result;
use crate::models::{CefrLevel, CefrLevelInput};

use super::{delete, with_json};

#[derive(Clone)]
pub struct CefrService {
    client: ApiClient,
}

impl CefrService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn levels(&self) -> Result<Vec<CefrLevel>> {
        self.client.json("/api/cefr-levels", RequestOptions::new()).await
    }

    pub async fn create(&self, level: &CefrLevelInput) -> Result<CefrLevel> {
        self.client
            .json("/api/cefr-levels", with_json(Method::Post, level)?)
            .await
    }

    pub async fn update(&self, id: u64, level: &CefrLevelInput) -> Result<CefrLevel> {
        self.client
            .json(&format!("/api/cefr-levels/{}", id), with_json(Method::Put, level)?)
            .await
    }

    pub async fn delete(&self, id: u64) -> Result<()> {
        self.client
            .request(&format!("/api/cefr-levels/{}", id), delete())
            .await?;
        Ok(())
    }
}
