use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, warn};

use super::generation_client::{
    ChatTurn, FragmentStream, GenerationClient, GenerationError, GenerationRequest,
};

pub const DEFAULT_HANDLER_URL: &str = "http://localhost:3000/api/chat";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RouteHandlerRequest<'a> {
    messages: &'a [ChatTurn],
    selected_model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<RouteHandlerData<'a>>,
}

#[derive(Debug, Serialize)]
struct RouteHandlerData<'a> {
    images: &'a [String],
}

/// Client for a server-side chat route that proxies to the model and
/// streams the reply back as plain UTF-8 text.
pub struct RouteHandlerClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RouteHandlerClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_body(request: &GenerationRequest) -> RouteHandlerRequest<'_> {
        RouteHandlerRequest {
            messages: &request.turns,
            selected_model: &request.model,
            data: (!request.images.is_empty()).then_some(RouteHandlerData {
                images: &request.images,
            }),
        }
    }
}

#[async_trait]
impl GenerationClient for RouteHandlerClient {
    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, GenerationError> {
        debug!(endpoint = %self.endpoint, model = %request.model, "Posting to chat route");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&Self::build_body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Chat route returned an error");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // The body is the reply itself; chunks go through untouched and the
        // reconciler deals with split characters.
        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(GenerationError::Request)
        });

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "chat route"
    }
}
