use std::sync::Arc;

use log::debug;
use once_cell::sync::Lazy;

use crate::models::Role;
use crate::storage::{self, SessionStore};

pub const LOGIN_PATH: &str = "/login";
pub const PLACEMENT_PATH: &str = "/student/placement";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(String),
}

struct Rule {
    prefix: &'static str,
    role: Option<Role>,
}

// First match wins; `None` marks a public area.
static RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        Rule { prefix: "/login", role: None },
        Rule { prefix: "/register", role: None },
        Rule { prefix: "/admin", role: Some(Role::Admin) },
        Rule { prefix: "/lecturer", role: Some(Role::Lecturer) },
        Rule { prefix: "/student", role: Some(Role::Student) },
    ]
});

/// Path-based access checks driven by the stored token and user blob.
#[derive(Clone)]
pub struct RouteGuard {
    store: Arc<dyn SessionStore>,
}

impl RouteGuard {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn check(&self, path: &str) -> Access {
        let route = path.split(['?', '#']).next().unwrap_or_default();
        let Some(required) = required_role(route) else {
            return Access::Allow;
        };

        let user = match (
            storage::stored_token(self.store.as_ref()),
            storage::stored_user(self.store.as_ref()),
        ) {
            (Some(_), Some(user)) => user,
            _ => {
                debug!("No session for {}, redirecting to login", path);
                return Access::Redirect(format!(
                    "{}?redirect={}",
                    LOGIN_PATH,
                    urlencoding::encode(path)
                ));
            }
        };

        if user.role != required {
            debug!("{} is not allowed for role {}", path, user.role.as_str());
            return Access::Redirect(user.role.dashboard_path().to_string());
        }

        // Students see course content only once placement has assigned a CEFR level.
        if required == Role::Student
            && user.cefr_level.as_deref().map_or(true, str::is_empty)
            && !is_under(route, PLACEMENT_PATH)
        {
            return Access::Redirect(PLACEMENT_PATH.to_string());
        }

        Access::Allow
    }
}

fn required_role(route: &str) -> Option<Role> {
    RULES
        .iter()
        .find(|rule| is_under(route, rule.prefix))
        .and_then(|rule| rule.role)
}

fn is_under(route: &str, prefix: &str) -> bool {
    route == prefix
        || route
            .strip_prefix(prefix)
            .map_or(false, |rest| rest.starts_with('/'))
}
