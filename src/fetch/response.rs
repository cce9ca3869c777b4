use serde_json::Map;
use serde_json::Value;

use super::GraphQlError;
use super::GraphQlResponse;
use crate::Error;
use crate::Operation;

/// Outcome of one attempted source.
///
/// A response carries either data (possibly with GraphQL errors) or the
/// `exception` that made its attempt fail.
#[derive(Debug)]
pub struct Response {
    pub request_id: String,
    pub operation_name: String,
    pub data: Option<Map<String, Value>>,
    pub errors: Vec<GraphQlError>,
    pub extensions: Option<Map<String, Value>>,
    pub exception: Option<Error>,
    pub is_from_cache: bool,
}

impl Response {
    pub(crate) fn from_cache(
        operation: &Operation,
        request_id: &str,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            request_id: request_id.to_string(),
            operation_name: operation.name.clone(),
            data: Some(data),
            errors: Vec::new(),
            extensions: None,
            exception: None,
            is_from_cache: true,
        }
    }

    pub(crate) fn from_network(
        operation: &Operation,
        request_id: &str,
        response: GraphQlResponse,
    ) -> Self {
        Self {
            request_id: request_id.to_string(),
            operation_name: operation.name.clone(),
            data: response.data,
            errors: response.errors,
            extensions: response.extensions,
            exception: None,
            is_from_cache: false,
        }
    }

    pub(crate) fn failure(
        operation: &Operation,
        request_id: &str,
        is_from_cache: bool,
        exception: Error,
    ) -> Self {
        Self {
            request_id: request_id.to_string(),
            operation_name: operation.name.clone(),
            data: None,
            errors: Vec::new(),
            extensions: None,
            exception: Some(exception),
            is_from_cache,
        }
    }

    /// The attempt produced a response (GraphQL errors included)
    pub fn is_success(&self) -> bool {
        self.exception.is_none()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Turns a failed response into its error
    pub fn into_result(mut self) -> crate::Result<Self> {
        match self.exception.take() {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}
