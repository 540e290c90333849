use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use url::form_urlencoded;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Which credential goes into the `Authorization` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Auth {
    /// Whatever token the session store currently holds (if any).
    #[default]
    Stored,
    Bearer(String),
    Anonymous,
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Text(String),
    /// Raw bytes, sent without a content type unless the caller sets one.
    Bytes(Vec<u8>),
    Form(FormData),
}

#[derive(Debug, Clone)]
enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        bytes: Vec<u8>,
        mime: Option<String>,
    },
}

/// Multipart payload kept as plain data so a retry can rebuild the form.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    parts: Vec<FormPart>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        mime: Option<&str>,
    ) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            bytes,
            mime: mime.map(str::to_string),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn to_multipart(&self) -> Result<Form, reqwest::Error> {
        let mut form = Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    file_name,
                    bytes,
                    mime,
                } => {
                    let mut file = Part::bytes(bytes.clone()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        file = file.mime_str(mime)?;
                    }
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

/// Per-call options. Unset `timeout`/`retries` fall back to the client defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<RequestBody>,
    pub auth: Auth,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, Value)>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    pub fn bytes(mut self, body: Vec<u8>) -> Self {
        self.body = Some(RequestBody::Bytes(body));
        self
    }

    pub fn form(mut self, form: FormData) -> Self {
        self.body = Some(RequestBody::Form(form));
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.auth = Auth::Bearer(token.into());
        self
    }

    pub fn anonymous(mut self) -> Self {
        self.auth = Auth::Anonymous;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds a query parameter. `null` is dropped; arrays expand into repeated keys.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// Joins base and path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

pub fn serialize_query(query: &[(String, Value)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in query {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|item| !item.is_null()) {
                    serializer.append_pair(key, &scalar_to_string(item));
                }
            }
            other => {
                serializer.append_pair(key, &scalar_to_string(other));
            }
        }
    }
    serializer.finish()
}

pub fn build_url(base: &str, path: &str, query: &[(String, Value)]) -> String {
    let mut url = join_url(base, path);
    let query = serialize_query(query);
    if !query.is_empty() {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&query);
    }
    url
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
