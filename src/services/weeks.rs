use log::warn;

use crate::api::{ApiClient, FormData, Method, RequestOptions};
use crate::cache::{ListCache, MATERIALS};
use crate::error::Result;
use crate::models::{Material, Week, WeekInput};

use super::{delete, with_json};

#[derive(Clone)]
pub struct WeekService {
    client: ApiClient,
    cache: ListCache,
}

impl WeekService {
    pub fn new(client: ApiClient) -> Self {
        let cache = ListCache::new(client.store().clone());
        Self { client, cache }
    }

    pub async fn list(&self, kelas_id: u64) -> Result<Vec<Week>> {
        let options = RequestOptions::new().query("kelas_id", kelas_id);
        self.client.json("/api/weeks", options).await
    }

    pub async fn create(&self, week: &WeekInput) -> Result<Week> {
        self.client
            .json("/api/weeks", with_json(Method::Post, week)?)
            .await
    }

    pub async fn update(&self, id: u64, week: &WeekInput) -> Result<Week> {
        self.client
            .json(&format!("/api/weeks/{}", id), with_json(Method::Put, week)?)
            .await
    }

    pub async fn delete(&self, id: u64) -> Result<()> {
        self.client
            .request(&format!("/api/weeks/{}", id), delete())
            .await?;
        Ok(())
    }

    pub async fn materials(&self, week_id: u64) -> Result<Vec<Material>> {
        let materials: Vec<Material> = self
            .client
            .json(&format!("/api/weeks/{}/materials", week_id), RequestOptions::new())
            .await?;
        if let Err(e) = self.cache.write(&materials_key(week_id), &materials) {
            warn!("Could not mirror materials of week {}: {}", week_id, e);
        }
        Ok(materials)
    }

    pub fn cached_materials(&self, week_id: u64) -> Option<Vec<Material>> {
        self.cache.read(&materials_key(week_id))
    }

    /// Uploads an attachment. `form` must carry the file part; `title` is added here.
    pub async fn upload_material(&self, week_id: u64, title: &str, form: FormData) -> Result<Material> {
        let options = RequestOptions::new()
            .method(Method::Post)
            .form(form.text("title", title));
        self.client
            .json(&format!("/api/weeks/{}/materials", week_id), options)
            .await
    }

    pub async fn delete_material(&self, week_id: u64, material_id: u64) -> Result<()> {
        self.client
            .request(
                &format!("/api/weeks/{}/materials/{}", week_id, material_id),
                delete(),
            )
            .await?;
        Ok(())
    }
}

fn materials_key(week_id: u64) -> String {
    format!("{}:{}", MATERIALS, week_id)
}
