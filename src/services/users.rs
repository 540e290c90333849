use crate::api::{ApiClient, Method, RequestOptions};
use crate::error::Result;
use crate::models::{NewUser, Role, User};

use super::{delete, with_json};

/// Admin user management.
#[derive(Clone)]
pub struct UserService {
    client: ApiClient,
}

impl UserService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, role: Option<Role>, search: Option<&str>) -> Result<Vec<User>> {
        let options = RequestOptions::new()
            .query("role", role.map(|r| r.as_str()))
            .query("search", search.filter(|s| !s.trim().is_empty()));
        self.client.json("/api/users", options).await
    }

    pub async fn get(&self, id: u64) -> Result<User> {
        self.client
            .json(&format!("/api/users/{}", id), RequestOptions::new())
            .await
    }

    pub async fn create(&self, user: &NewUser) -> Result<User> {
        self.client
            .json("/api/users", with_json(Method::Post, user)?)
            .await
    }

    pub async fn update(&self, id: u64, user: &NewUser) -> Result<User> {
        self.client
            .json(&format!("/api/users/{}", id), with_json(Method::Put, user)?)
            .await
    }

    pub async fn delete(&self, id: u64) -> Result<()> {
        self.client
            .request(&format!("/api/users/{}", id), delete())
            .await?;
        Ok(())
    }
}
