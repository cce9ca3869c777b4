use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::GraphQlRequest;
use super::HttpResponse;
use crate::Result;

/// Sends operations to the server.
///
/// Transport failures are reported as [`NetworkError`](crate::NetworkError);
/// HTTP statuses and bodies are interpreted by the orchestrator with
/// [`parse_response_body`](super::parse_response_body).
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NetworkTransport: Send + Sync + 'static {
    async fn execute(
        &self,
        request: GraphQlRequest,
    ) -> Result<HttpResponse>;
}
