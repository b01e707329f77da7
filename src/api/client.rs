use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use tokio::sync::RwLock;

const REST_PREFIX: &str = "/rest/v1";
const STORAGE_PREFIX: &str = "/storage/v1";
const JSON_CONTENT_TYPE: &str = "application/json";
const PREFER: HeaderName = HeaderName::from_static("prefer");
const APIKEY: HeaderName = HeaderName::from_static("apikey");
pub(crate) const RETURN_REPRESENTATION: &str = "return=representation";

/// Thin HTTP layer over the hosted backend: a PostgREST-style table API
/// plus an object storage API, both authorised with the anonymous key.
pub struct SupabaseClient {
    http: reqwest::Client,
    config: Arc<RwLock<AppConfig>>,
}

impl SupabaseClient {
    pub fn new(config: Arc<RwLock<AppConfig>>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("MyMusic/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &Arc<RwLock<AppConfig>> {
        &self.config
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) async fn rest_url(&self, table: &str) -> String {
        let config = self.config.read().await;
        endpoint(&config.supabase_url, &format!("{}/{}", REST_PREFIX, table))
    }

    pub(crate) async fn storage_url(&self, path: &str) -> String {
        let config = self.config.read().await;
        endpoint(&config.supabase_url, &format!("{}{}", STORAGE_PREFIX, path))
    }

    async fn auth_headers(&self) -> AppResult<HeaderMap> {
        let config = self.config.read().await;
        let key = config.supabase_anon_key.trim();
        if key.is_empty() {
            return Err(AppError::Config("Backend anon key is not configured".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(
            APIKEY,
            HeaderValue::from_str(key).map_err(|e| AppError::Config(e.to_string()))?,
        );
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| AppError::Config(e.to_string()))?,
        );
        Ok(headers)
    }

    pub async fn get_with_query(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> AppResult<reqwest::Response> {
        let headers = self.auth_headers().await?;
        log::debug!("GET {} {:?}", url, query);
        let response = self
            .http
            .get(url)
            .headers(headers)
            .query(query)
            .send()
            .await?;
        self.check_response(response).await
    }

    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        prefer: Option<&'static str>,
    ) -> AppResult<reqwest::Response> {
        let mut headers = self.auth_headers().await?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        if let Some(prefer) = prefer {
            headers.insert(PREFER, HeaderValue::from_static(prefer));
        }
        log::debug!("POST {}", url);

        let response = self
            .http
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await?;
        self.check_response(response).await
    }

    pub async fn post_bytes(
        &self,
        url: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> AppResult<reqwest::Response> {
        let mut headers = self.auth_headers().await?;
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(content_type).map_err(|e| AppError::InvalidInput(e.to_string()))?,
        );
        log::debug!("POST {} ({} bytes, {})", url, bytes.len(), content_type);

        let response = self
            .http
            .post(url)
            .headers(headers)
            .body(bytes)
            .send()
            .await?;
        self.check_response(response).await
    }

    pub async fn delete_with_query(
        &self,
        url: &str,
        query: &[(&str, &str)],
        prefer: Option<&'static str>,
    ) -> AppResult<reqwest::Response> {
        let mut headers = self.auth_headers().await?;
        if let Some(prefer) = prefer {
            headers.insert(PREFER, HeaderValue::from_static(prefer));
        }
        log::debug!("DELETE {} {:?}", url, query);

        let response = self
            .http
            .delete(url)
            .headers(headers)
            .query(query)
            .send()
            .await?;
        self.check_response(response).await
    }

    async fn check_response(&self, response: reqwest::Response) -> AppResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Err(AppError::NotFound(format!("{}", response.url().path())))
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".into());
            Err(AppError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Join the configured base URL and an API path without doubling slashes.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        assert_eq!(
            endpoint("https://x.supabase.co/", "/rest/v1/songs"),
            "https://x.supabase.co/rest/v1/songs"
        );
        assert_eq!(
            endpoint("https://x.supabase.co", "storage/v1/object/audio/a.mp3"),
            "https://x.supabase.co/storage/v1/object/audio/a.mp3"
        );
    }

    #[tokio::test]
    async fn urls_follow_configured_base() {
        let config = AppConfig {
            supabase_url: "https://demo.supabase.co/".into(),
            supabase_anon_key: "anon".into(),
            ..AppConfig::default()
        };
        let client = SupabaseClient::new(Arc::new(RwLock::new(config))).unwrap();
        assert_eq!(
            client.rest_url("songs").await,
            "https://demo.supabase.co/rest/v1/songs"
        );
        assert_eq!(
            client.storage_url("/object/public/images/k.png").await,
            "https://demo.supabase.co/storage/v1/object/public/images/k.png"
        );
    }

    #[tokio::test]
    async fn requests_without_key_fail_before_sending() {
        let config = AppConfig {
            supabase_url: "https://demo.supabase.co".into(),
            ..AppConfig::default()
        };
        let client = SupabaseClient::new(Arc::new(RwLock::new(config))).unwrap();
        let url = client.rest_url("songs").await;
        let err = client.get_with_query(&url, &[]).await.unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}
