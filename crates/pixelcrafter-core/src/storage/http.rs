//! REST client for the project backend.
//!
//! Requests are blocking (`ureq`) and run inside the returned future, the same
//! way the file-backed stores do their IO.

use super::{
    ApiError, ApiResult, AuthResponse, BoxFuture, ChatHistory, ChatReply, ChatRequest, ErrorBody,
    ImageUpload, LoginRequest, ProjectApi, RegisterRequest, UploadResponse,
};
use crate::config::ClientConfig;
use crate::project::{NewProject, Project, User};
use serde::de::DeserializeOwned;

/// Backend reached over HTTP.
pub struct HttpApi {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpApi {
    pub fn new(config: &ClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self { base_url: config.api_base_url.trim_end_matches('/').to_string(), agent }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Decode a success body, or turn an error status into [`ApiError::Status`]
/// carrying the server's `detail`.
fn read_json<T: DeserializeOwned>(result: Result<ureq::Response, ureq::Error>) -> ApiResult<T> {
    match result {
        Ok(response) => response
            .into_json::<T>()
            .map_err(|e| ApiError::Decode(e.to_string())),
        Err(ureq::Error::Status(status, response)) => {
            let detail = response
                .into_json::<ErrorBody>()
                .map(|body| body.message())
                .unwrap_or_else(|_| format!("Request failed with status {}", status));
            Err(ApiError::Status { status, detail })
        }
        Err(ureq::Error::Transport(transport)) => Err(ApiError::Network(transport.to_string())),
    }
}

/// Single-part `multipart/form-data` body with the file under field `file`.
fn multipart_body(boundary: &str, upload: &ImageUpload) -> Vec<u8> {
    let filename = upload.filename.replace(['"', '\r', '\n'], "_");
    let mut body = Vec::with_capacity(upload.bytes.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: {}\r\n\r\n",
            upload.content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(&upload.bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

impl ProjectApi for HttpApi {
    fn login(&self, request: &LoginRequest) -> BoxFuture<'_, ApiResult<AuthResponse>> {
        let request = request.clone();
        Box::pin(async move {
            read_json(self.agent.post(&self.url("/auth/login")).send_json(&request))
        })
    }

    fn register(&self, request: &RegisterRequest) -> BoxFuture<'_, ApiResult<AuthResponse>> {
        let request = request.clone();
        Box::pin(async move {
            read_json(self.agent.post(&self.url("/auth/register")).send_json(&request))
        })
    }

    fn me(&self, token: &str) -> BoxFuture<'_, ApiResult<User>> {
        let auth = bearer(token);
        Box::pin(async move {
            read_json(self.agent.get(&self.url("/auth/me")).set("Authorization", &auth).call())
        })
    }

    fn list_projects(&self, token: &str) -> BoxFuture<'_, ApiResult<Vec<Project>>> {
        let auth = bearer(token);
        Box::pin(async move {
            read_json(self.agent.get(&self.url("/projects")).set("Authorization", &auth).call())
        })
    }

    fn get_project(&self, token: &str, project_id: &str) -> BoxFuture<'_, ApiResult<Project>> {
        let auth = bearer(token);
        let url = self.url(&format!("/projects/{}", project_id));
        Box::pin(async move { read_json(self.agent.get(&url).set("Authorization", &auth).call()) })
    }

    fn create_project(&self, token: &str, project: &NewProject) -> BoxFuture<'_, ApiResult<Project>> {
        let auth = bearer(token);
        let project = project.clone();
        Box::pin(async move {
            read_json(
                self.agent
                    .post(&self.url("/projects"))
                    .set("Authorization", &auth)
                    .send_json(&project),
            )
        })
    }

    fn update_project(&self, token: &str, project: &Project) -> BoxFuture<'_, ApiResult<Project>> {
        let auth = bearer(token);
        let url = self.url(&format!("/projects/{}", project.id));
        let project = project.clone();
        Box::pin(async move {
            read_json(self.agent.put(&url).set("Authorization", &auth).send_json(&project))
        })
    }

    fn delete_project(&self, token: &str, project_id: &str) -> BoxFuture<'_, ApiResult<()>> {
        let auth = bearer(token);
        let url = self.url(&format!("/projects/{}", project_id));
        Box::pin(async move {
            read_json::<serde_json::Value>(self.agent.delete(&url).set("Authorization", &auth).call())
                .map(|_| ())
        })
    }

    fn upload_image(
        &self,
        token: &str,
        project_id: &str,
        upload: &ImageUpload,
    ) -> BoxFuture<'_, ApiResult<UploadResponse>> {
        let auth = bearer(token);
        let url = self.url(&format!("/projects/{}/upload-image", project_id));
        let boundary = format!("pixelcrafter-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_body(&boundary, upload);
        Box::pin(async move {
            read_json(
                self.agent
                    .post(&url)
                    .set("Authorization", &auth)
                    .set("Content-Type", &format!("multipart/form-data; boundary={}", boundary))
                    .send_bytes(&body),
            )
        })
    }

    fn chat(&self, request: &ChatRequest) -> BoxFuture<'_, ApiResult<ChatReply>> {
        let request = request.clone();
        Box::pin(async move { read_json(self.agent.post(&self.url("/chat")).send_json(&request)) })
    }

    fn chat_history(&self, session_id: &str) -> BoxFuture<'_, ApiResult<ChatHistory>> {
        let url = self.url(&format!("/chat/history/{}", session_id));
        Box::pin(async move { read_json(self.agent.get(&url).call()) })
    }
}
