pub mod client;
pub mod request;
pub mod response;

pub use client::{ApiClient, DEFAULT_RETRY_AFTER};
pub use request::{build_url, join_url, serialize_query, Auth, FormData, Method, RequestBody, RequestOptions};
pub use response::ResponseBody;
