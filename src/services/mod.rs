//! Typed wrappers over the backend's REST resources.
//!
//! Every call goes through [`ApiClient`] and therefore carries the stored
//! bearer token unless stated otherwise (login and register are anonymous).

pub mod assignments;
pub mod auth;
pub mod cefr;
pub mod classes;
pub mod placement;
pub mod quizzes;
pub mod users;
pub mod weeks;

pub use assignments::AssignmentService;
pub use auth::{AuthService, LoginForm, RegisterForm};
pub use cefr::CefrService;
pub use classes::ClassService;
pub use placement::PlacementService;
pub use quizzes::QuizService;
pub use users::UserService;
pub use weeks::WeekService;

use serde::Serialize;

use crate::api::{ApiClient, Method, RequestOptions};
use crate::error::Result;

/// One handle per resource, all sharing the same client and store.
#[derive(Clone)]
pub struct Services {
    pub auth: AuthService,
    pub users: UserService,
    pub classes: ClassService,
    pub weeks: WeekService,
    pub assignments: AssignmentService,
    pub quizzes: QuizService,
    pub cefr: CefrService,
    pub placement: PlacementService,
}

impl Services {
    pub fn new(client: ApiClient) -> Self {
        Self {
            auth: AuthService::new(client.clone()),
            users: UserService::new(client.clone()),
            classes: ClassService::new(client.clone()),
            weeks: WeekService::new(client.clone()),
            assignments: AssignmentService::new(client.clone()),
            quizzes: QuizService::new(client.clone()),
            cefr: CefrService::new(client.clone()),
            placement: PlacementService::new(client),
        }
    }
}

pub(crate) fn with_json<T: Serialize>(method: Method, body: &T) -> Result<RequestOptions> {
    Ok(RequestOptions::new()
        .method(method)
        .json(serde_json::to_value(body)?))
}

pub(crate) fn delete() -> RequestOptions {
    RequestOptions::new().method(Method::Delete)
}
