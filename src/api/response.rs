use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Normalized response payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResponseBody {
    /// 204 No Content.
    #[default]
    Empty,
    /// JSON content type. A body that fails to parse becomes `Value::Null`.
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub(crate) async fn read(response: reqwest::Response) -> Result<Self, reqwest::Error> {
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(ResponseBody::Empty);
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(is_json_content_type)
            .unwrap_or(false);

        let text = response.text().await?;
        if is_json {
            Ok(ResponseBody::Json(serde_json::from_str(&text).unwrap_or(Value::Null)))
        } else {
            Ok(ResponseBody::Text(text))
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            ResponseBody::Empty => Value::Null,
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
        }
    }

    /// The backend's human-readable `message` field, if the body carries one.
    pub fn message(&self) -> Option<&str> {
        self.as_json()?.get("message")?.as_str()
    }

    /// Decodes the payload, unwrapping a top-level `data` envelope when present.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        match self.into_json() {
            Value::Object(map) if map.contains_key("data") => {
                match serde_json::from_value(map["data"].clone()) {
                    Ok(decoded) => Ok(decoded),
                    Err(envelope_err) => {
                        serde_json::from_value(Value::Object(map)).map_err(|_| envelope_err)
                    }
                }
            }
            other => serde_json::from_value(other),
        }
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}
