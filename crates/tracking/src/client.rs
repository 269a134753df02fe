//! HTTP implementation of [`TrackingService`] for the IMS REST API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use ims_artifacts_model::{
    ImagePatch, ImageRecord, JobPatch, JobRecord, NewImage, NewRecipe, RecipePatch, RecipeRecord,
};

use crate::error::TrackingError;
use crate::service::TrackingService;
use crate::settings::{HttpRetryPolicy, TrackingSettings};

/// Longest response body kept in error messages.
const MAX_ERROR_BODY_LEN: usize = 4096;

/// IMS REST client.
#[derive(Debug, Clone)]
pub struct ImsClient {
    base_url: String,
    http: reqwest::Client,
    retry: HttpRetryPolicy,
}

impl ImsClient {
    /// Build a client from settings.
    pub fn new(settings: TrackingSettings) -> Result<Self, TrackingError> {
        let mut headers = HeaderMap::new();
        if let Some(ref token) = settings.bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                TrackingError::InvalidConfig {
                    message: format!("invalid bearer token: {}", e),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout)
            .build()
            .map_err(|e| TrackingError::InvalidConfig {
                message: e.to_string(),
            })?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            http,
            retry: settings.retry,
        })
    }

    /// Service root this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url: String = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(segment);
        }
        url
    }

    async fn get<T: DeserializeOwned>(&self, url: String) -> Result<T, TrackingError> {
        let bytes: Vec<u8> = self.execute(Method::GET, &url, None).await?;
        decode(url, &bytes)
    }

    async fn send<B, T>(&self, method: Method, url: String, body: &B) -> Result<T, TrackingError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let payload: serde_json::Value =
            serde_json::to_value(body).map_err(|e| TrackingError::InvalidConfig {
                message: format!("unserializable request body: {}", e),
            })?;
        let bytes: Vec<u8> = self.execute(method, &url, Some(payload)).await?;
        decode(url, &bytes)
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        payload: Option<serde_json::Value>,
    ) -> Result<Vec<u8>, TrackingError> {
        log::info!("{} {}", method, url);
        if let Some(ref payload) = payload {
            log::debug!("{} {} body={}", method, url, payload);
        }

        let mut retry: u32 = 0;
        loop {
            match self.send_once(&method, url, payload.as_ref()).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) => {
                    if retry >= self.retry.max_retries || !self.retry.is_retryable(&method, &err) {
                        return Err(err);
                    }
                    retry += 1;
                    let delay = self.retry.backoff_for(retry);
                    log::warn!(
                        "{} {} failed (retry {} of {}, next in {:?}): {}",
                        method,
                        url,
                        retry,
                        self.retry.max_retries,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<Vec<u8>, TrackingError> {
        let mut request = self.http.request(method.clone(), url);
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|e| TrackingError::Http {
            method: method.to_string(),
            url: url.to_string(),
            message: e.to_string(),
            connect: e.is_connect(),
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| TrackingError::Http {
            method: method.to_string(),
            url: url.to_string(),
            message: e.to_string(),
            connect: false,
        })?;
        log::debug!("{} {} -> {}: {}", method, url, status, String::from_utf8_lossy(&bytes));

        if !status.is_success() {
            return Err(TrackingError::Status {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body: truncate_body(&bytes),
            });
        }

        Ok(bytes.to_vec())
    }
}

fn truncate_body(bytes: &[u8]) -> String {
    let mut body: String = String::from_utf8_lossy(bytes).to_string();
    if body.len() > MAX_ERROR_BODY_LEN {
        let mut end: usize = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }
    body
}

fn decode<T: DeserializeOwned>(url: String, bytes: &[u8]) -> Result<T, TrackingError> {
    serde_json::from_slice(bytes).map_err(|e| TrackingError::Decode {
        url,
        message: e.to_string(),
    })
}

#[async_trait]
impl TrackingService for ImsClient {
    async fn create_image(&self, image: &NewImage) -> Result<ImageRecord, TrackingError> {
        self.send(Method::POST, self.url(&["images"]), image).await
    }

    async fn list_images(&self) -> Result<Vec<ImageRecord>, TrackingError> {
        self.get(self.url(&["images"])).await
    }

    async fn get_image(&self, id: &str) -> Result<ImageRecord, TrackingError> {
        self.get(self.url(&["images", id])).await
    }

    async fn patch_image(
        &self,
        id: &str,
        patch: &ImagePatch,
    ) -> Result<ImageRecord, TrackingError> {
        self.send(Method::PATCH, self.url(&["images", id]), patch).await
    }

    async fn delete_image(&self, id: &str) -> Result<(), TrackingError> {
        self.execute(Method::DELETE, &self.url(&["images", id]), None)
            .await
            .map(|_| ())
    }

    async fn create_recipe(&self, recipe: &NewRecipe) -> Result<RecipeRecord, TrackingError> {
        self.send(Method::POST, self.url(&["recipes"]), recipe).await
    }

    async fn list_recipes(&self) -> Result<Vec<RecipeRecord>, TrackingError> {
        self.get(self.url(&["recipes"])).await
    }

    async fn patch_recipe(
        &self,
        id: &str,
        patch: &RecipePatch,
    ) -> Result<RecipeRecord, TrackingError> {
        self.send(Method::PATCH, self.url(&["recipes", id]), patch).await
    }

    async fn delete_recipe(&self, id: &str) -> Result<(), TrackingError> {
        self.execute(Method::DELETE, &self.url(&["recipes", id]), None)
            .await
            .map(|_| ())
    }

    async fn patch_job(&self, id: &str, patch: &JobPatch) -> Result<JobRecord, TrackingError> {
        self.send(Method::PATCH, self.url(&["jobs", id]), patch).await
    }
}
