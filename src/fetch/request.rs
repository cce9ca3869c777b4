use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::HttpError;
use crate::Operation;
use crate::ParseError;
use crate::Result;
use crate::Variables;

/// Wire form of an operation execution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    #[serde(skip)]
    pub request_id: String,
    pub operation_name: String,
    pub query: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub variables: Variables,
}

impl GraphQlRequest {
    pub fn from_operation(
        operation: &Operation,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            operation_name: operation.name.clone(),
            query: operation.document.clone(),
            variables: operation.variables.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

/// Entry of the `errors` array of a GraphQL response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<ErrorLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl GraphQlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: None,
        }
    }
}

/// Parsed GraphQL response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
    #[serde(default)]
    pub extensions: Option<Map<String, Value>>,
}

impl GraphQlResponse {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Raw transport output
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(
        status: u16,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(
        status: u16,
        body: &Value,
    ) -> Self {
        Self::new(status, body.to_string()).header("content-type", "application/json")
    }

    pub fn header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Turns transport output into a GraphQL response.
///
/// Non-2xx statuses become [`HttpError`], keeping the body only when
/// `expose_body` is set. A 2xx body that is not JSON, or carries neither
/// `data` nor `errors`, is a [`ParseError`].
pub fn parse_response_body(
    response: HttpResponse,
    expose_body: bool,
) -> Result<GraphQlResponse> {
    if !(200..300).contains(&response.status) {
        let body = expose_body.then(|| String::from_utf8_lossy(&response.body).into_owned());
        return Err(HttpError {
            status_code: response.status,
            headers: response.headers,
            body,
        }
        .into());
    }

    let parsed: GraphQlResponse = serde_json::from_slice(&response.body).map_err(ParseError::Json)?;
    if parsed.data.is_none() && parsed.errors.is_empty() {
        return Err(ParseError::Malformed("response has neither data nor errors".into()).into());
    }
    Ok(parsed)
}
