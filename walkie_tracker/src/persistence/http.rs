use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use walkie_lib::walk::{ApiErrorBody, FinishWalkRequest, PetId, StartWalkRequest, StartWalkResponse, WalkId};

use crate::config::TrackerConfig;

use super::{PersistenceError, WalkPersistence};

/// `WalkPersistence` over the backend's REST API.
#[derive(Clone)]
pub struct HttpWalkApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpWalkApi {
    pub fn new(config: &TrackerConfig) -> Result<Self, PersistenceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| PersistenceError::Network(err.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, PersistenceError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(error) => error.error,
            Err(_) if !body.trim().is_empty() => body.trim().to_string(),
            Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };

        Err(PersistenceError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl WalkPersistence for HttpWalkApi {
    async fn start_walk(&self, pet_id: PetId) -> Result<WalkId, PersistenceError> {
        let url = format!("{}/walks/start", self.base_url);
        let response = self.send(self.client.post(url).json(&StartWalkRequest { pet_id })).await?;

        let body: StartWalkResponse = response
            .json()
            .await
            .map_err(|err| PersistenceError::Decode(err.to_string()))?;

        tracing::debug!("Backend registered walk {} for pet {}", body.walk.id, pet_id);
        Ok(body.walk.id)
    }

    async fn finish_walk(&self, walk_id: WalkId, request: &FinishWalkRequest) -> Result<(), PersistenceError> {
        let url = format!("{}/walks/finish/{}", self.base_url, walk_id);
        self.send(self.client.put(url).json(request)).await?;

        tracing::debug!("Backend accepted finish of walk {} ({} points)", walk_id, request.route_data.len());
        Ok(())
    }
}

fn classify(err: reqwest::Error) -> PersistenceError {
    if err.is_timeout() {
        PersistenceError::Timeout
    } else {
        PersistenceError::Network(err.to_string())
    }
}
