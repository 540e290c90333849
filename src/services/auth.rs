use log::{info, warn};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::{ApiClient, Method, RequestOptions};
use crate::beacon::spawn_detached;
use crate::error::Result;
use crate::models::User;
use crate::storage;

#[derive(Debug, Clone, Serialize, Validate)]
pub struct LoginForm {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct RegisterForm {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub password_confirmation: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    token: Option<String>,
    user: User,
}

#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Validates locally, then exchanges credentials for a token and stores it with the user blob.
    pub async fn login(&self, form: &LoginForm) -> Result<User> {
        form.validate()?;

        let options = RequestOptions::new()
            .method(Method::Post)
            .anonymous()
            .json(serde_json::to_value(form)?);
        let response: AuthResponse = self.client.json("/login", options).await?;

        match response.token {
            Some(token) => {
                storage::save_login(self.client.store().as_ref(), &token, &response.user)?;
                info!("Logged in as {} ({})", response.user.email, response.user.role.as_str());
            }
            None => warn!("Login response for {} carried no token", response.user.email),
        }
        Ok(response.user)
    }

    /// Registers a student account. When the backend logs the new user in
    /// directly, the returned token is stored as well.
    pub async fn register(&self, form: &RegisterForm) -> Result<User> {
        form.validate()?;

        let options = RequestOptions::new()
            .method(Method::Post)
            .anonymous()
            .json(serde_json::to_value(form)?);
        let response: AuthResponse = self.client.json("/register", options).await?;

        if let Some(token) = &response.token {
            storage::save_login(self.client.store().as_ref(), token, &response.user)?;
        }
        info!("Registered {}", response.user.email);
        Ok(response.user)
    }

    /// Clears the local session unconditionally; the server-side revoke is best-effort.
    pub fn logout(&self) -> Result<()> {
        let token = storage::stored_token(self.client.store().as_ref());
        storage::clear_login(self.client.store().as_ref())?;

        if let Some(token) = token {
            let client = self.client.clone();
            spawn_detached("POST /logout".to_string(), async move {
                let options = RequestOptions::new()
                    .method(Method::Post)
                    .bearer(token)
                    .retries(0);
                client.request("/logout", options).await.map(|_| ())
            });
        }
        info!("Logged out");
        Ok(())
    }

    pub fn current_user(&self) -> Option<User> {
        storage::stored_user(self.client.store().as_ref())
    }

    pub fn is_logged_in(&self) -> bool {
        storage::stored_token(self.client.store().as_ref()).is_some()
    }
}
