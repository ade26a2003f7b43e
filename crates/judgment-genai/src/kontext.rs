//! Flux Kontext image editing client.
//!
//! An edit is asynchronous on the service side: the photo and prompt are
//! submitted, the returned request id is polled until the result is `Ready`,
//! and the finished image is downloaded from the signed sample URL.

use std::time::Duration;

use async_trait::async_trait;
use judgment_orchestrator::{
    Image, ImageFormat, TransformConfig, TransformRequest, TransformResponse, Transformer,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::GenAiError;

const SERVICE: &str = "Kontext";

/// Client for the Flux Kontext editing API.
#[derive(Clone)]
pub struct FluxKontextClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl std::fmt::Debug for FluxKontextClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FluxKontextClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    prompt: &'a str,
    input_image: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    result: Option<PollResult>,
}

#[derive(Debug, Deserialize)]
struct PollResult {
    sample: String,
}

impl FluxKontextClient {
    /// Creates a client from the transform settings.
    #[must_use]
    pub fn from_config(config: &TransformConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_poll_attempts: config.max_poll_attempts,
        }
    }

    /// Submits an edit and returns the request id.
    async fn submit(&self, prompt: &str, image: &Image) -> Result<String, GenAiError> {
        let url = format!("{}/{}", self.base_url, self.model);
        debug!(%url, bytes = image.len(), "Submitting Kontext edit");

        let response = self
            .client
            .post(url)
            .header("accept", "application/json")
            .header("x-key", &self.api_key)
            .json(&SubmitRequest {
                prompt,
                input_image: image.to_base64(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenAiError::from_response(SERVICE, response).await);
        }
        let body: SubmitResponse = response.json().await?;
        Ok(body.id)
    }

    /// Polls until the edit is ready and returns the sample URL.
    async fn poll(&self, id: &str) -> Result<String, GenAiError> {
        let url = format!("{}/get_result", self.base_url);

        for attempt in 1..=self.max_poll_attempts {
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(&url)
                .query(&[("id", id)])
                .header("accept", "application/json")
                .header("x-key", &self.api_key)
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(GenAiError::from_response(SERVICE, response).await);
            }

            let body: PollResponse = response.json().await?;
            match body.status.as_str() {
                "Ready" => {
                    return body
                        .result
                        .map(|result| result.sample)
                        .ok_or(GenAiError::EmptyResponse("Kontext result has no sample URL"));
                }
                "Processing" | "Queued" => {
                    debug!(id, attempt, status = %body.status, "Kontext edit not ready");
                }
                _ => return Err(GenAiError::UnexpectedStatus(body.status)),
            }
        }

        Err(GenAiError::PollTimeout {
            attempts: self.max_poll_attempts,
        })
    }

    /// Downloads the finished image.
    async fn download(&self, url: &str) -> Result<Image, GenAiError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GenAiError::from_response(SERVICE, response).await);
        }

        let format = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(ImageFormat::from_mime)
            .unwrap_or(ImageFormat::Jpeg);
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(GenAiError::EmptyResponse("Kontext sample image is empty"));
        }
        Ok(Image::new(format, bytes.to_vec()))
    }

    async fn edit(&self, request: &TransformRequest) -> Result<Image, GenAiError> {
        let id = self.submit(&request.prompt, &request.image).await?;
        debug!(%id, "Kontext edit queued");
        let sample = self.poll(&id).await?;
        self.download(&sample).await
    }
}

/// Text shown next to the edited photo.
fn describe(request: &TransformRequest) -> String {
    let mut description = format!(
        "The user's photo was transformed based on the {} theme.",
        request.theme
    );
    if let Some(guidance) = &request.guidance {
        description.push_str(&format!(" The specific theme description was: {guidance}."));
    }
    description
}

#[async_trait]
impl Transformer for FluxKontextClient {
    async fn transform(
        &self,
        request: TransformRequest,
    ) -> judgment_orchestrator::Result<TransformResponse> {
        match self.edit(&request).await {
            Ok(image) => {
                info!(
                    question = request.question_number,
                    theme = %request.theme,
                    bytes = image.len(),
                    "Kontext edit complete"
                );
                Ok(TransformResponse {
                    image,
                    description: describe(&request),
                })
            }
            Err(e) => {
                warn!(question = request.question_number, error = %e, "Kontext edit failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use judgment_orchestrator::{GenerationErrorKind, JudgmentError, Protocol};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer, max_poll_attempts: u32) -> FluxKontextClient {
        let config = TransformConfig {
            base_url: format!("{}/v1/", server.uri()),
            poll_interval_ms: 1,
            max_poll_attempts,
            ..TransformConfig::default()
        };
        FluxKontextClient::from_config(&config, "test-key")
    }

    fn request(guidance: Option<&str>) -> TransformRequest {
        TransformRequest {
            image: Image::new(ImageFormat::Png, vec![1, 2, 3]),
            choice: Protocol::Chaos,
            theme: "Chaos".to_string(),
            question_number: 2,
            guidance: guidance.map(ToString::to_string),
            prompt: "edit the background".to_string(),
        }
    }

    async fn mount_submit(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/flux-kontext-pro"))
            .and(header("x-key", "test-key"))
            .and(body_partial_json(json!({
                "prompt": "edit the background",
                "input_image": "AQID"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "req-1" })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_transform_polls_until_ready_and_downloads() {
        let server = MockServer::start().await;
        mount_submit(&server).await;

        Mock::given(method("GET"))
            .and(path("/v1/get_result"))
            .and(query_param("id", "req-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Processing" })))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/get_result"))
            .and(query_param("id", "req-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "Ready",
                "result": { "sample": format!("{}/samples/out.png", server.uri()) }
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/samples/out.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![9, 9, 9, 9], "image/png"))
            .mount(&server)
            .await;

        let response = client(&server, 10)
            .transform(request(Some("neon static")))
            .await
            .unwrap();

        assert_eq!(response.image.format(), ImageFormat::Png);
        assert_eq!(response.image.bytes(), &[9, 9, 9, 9]);
        assert_eq!(
            response.description,
            "The user's photo was transformed based on the Chaos theme. \
             The specific theme description was: neon static."
        );
    }

    #[tokio::test]
    async fn test_unexpected_status_fails() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/get_result"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Content Moderated" })))
            .mount(&server)
            .await;

        let err = client(&server, 10).transform(request(None)).await.unwrap_err();
        assert!(matches!(
            err,
            JudgmentError::Generation { kind: GenerationErrorKind::InvalidResponse, ref message, .. }
                if message.contains("Content Moderated")
        ));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_polls() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/get_result"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Queued" })))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server, 3).transform(request(None)).await.unwrap_err();
        assert!(err.to_string().contains("no Kontext result after 3 polls"));
    }

    #[tokio::test]
    async fn test_submit_rejected_key_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/flux-kontext-pro"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = client(&server, 3).transform(request(None)).await.unwrap_err();
        assert!(matches!(
            err,
            JudgmentError::Generation { kind: GenerationErrorKind::Authentication, .. }
        ));
        assert!(err.user_message().contains("HTTP 403: bad key"));
    }

    #[tokio::test]
    async fn test_ready_without_sample_is_invalid_response() {
        let server = MockServer::start().await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/get_result"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Ready" })))
            .mount(&server)
            .await;

        let err = client(&server, 3).transform(request(None)).await.unwrap_err();
        assert!(matches!(
            err,
            JudgmentError::Generation { kind: GenerationErrorKind::InvalidResponse, .. }
        ));
    }
}
