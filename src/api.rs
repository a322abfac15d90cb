use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Credentials;
use crate::error::ApiError;
use crate::payload::CoursePayload;

const TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: Option<String>,
}

/// Entry of `GET /api/admin/courses`.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminCourse {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
}

/// Entry of `GET /api/data/courses`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataCourse {
    pub title: String,
    #[serde(default)]
    pub topics: Vec<DataTopic>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTopic {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub order_index: Option<i64>,
    #[serde(default)]
    pub study_items: Vec<serde_json::Value>,
}

pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn http_client() -> Result<Client, ApiError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(TIMEOUT_SECS))
        .build()?)
}

/// Map non-success responses to errors, keeping the body for the operator.
fn check(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        let body = resp.text().unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

/// Bearer-token client for the admin endpoints.
pub struct AdminClient {
    http: Client,
    base_url: String,
    credentials: Credentials,
    token: Option<String>,
}

impl AdminClient {
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, ApiError> {
        Ok(AdminClient {
            http: http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            token: None,
        })
    }

    pub fn login(&mut self) -> Result<(), ApiError> {
        let url = endpoint(&self.base_url, "/api/auth/login");
        info!("Logging in at {}", url);
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "username": self.credentials.username,
                "password": self.credentials.password,
            }))
            .send()?;
        let body: LoginResponse = check(resp)?.json()?;
        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::MissingToken)?;
        self.token = Some(token);
        Ok(())
    }

    /// Send an authorized request, logging in again once on a 401.
    fn send<F>(&mut self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        if self.token.is_none() {
            self.login()?;
        }
        for attempt in 0..2 {
            let token = self.token.clone().unwrap_or_default();
            let resp = build(&self.http).bearer_auth(&token).send()?;
            match check(resp) {
                Err(ApiError::Unauthorized) if attempt == 0 => {
                    warn!("Token rejected, logging in again");
                    self.login()?;
                }
                other => return other,
            }
        }
        Err(ApiError::Unauthorized)
    }

    pub fn list_courses(&mut self) -> Result<Vec<AdminCourse>, ApiError> {
        let url = endpoint(&self.base_url, "/api/admin/courses");
        Ok(self.send(|c| c.get(&url))?.json()?)
    }

    pub fn delete_course(&mut self, id: i64) -> Result<(), ApiError> {
        let url = endpoint(&self.base_url, &format!("/api/admin/courses/{}", id));
        self.send(|c| c.delete(&url))?;
        Ok(())
    }

    /// Import one course; returns the server's JSON reply.
    pub fn import_course(&mut self, payload: &CoursePayload) -> Result<serde_json::Value, ApiError> {
        let url = endpoint(&self.base_url, "/api/admin/anki/import");
        info!(
            course = %payload.course_name,
            items = payload.items.len(),
            "Importing course"
        );
        let resp = self.send(|c| c.post(&url).json(payload))?;
        let text = resp.text()?;
        Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
    }
}

/// `GET /api/data/courses` on the read-only data API.
pub fn fetch_data_courses(data_url: &str) -> Result<Vec<DataCourse>, ApiError> {
    let url = endpoint(data_url, "/api/data/courses");
    info!("Fetching {}", url);
    let resp = http_client()?.get(&url).send()?;
    Ok(check(resp)?.json()?)
}
