use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use shelf_protocol::{
    Credentials, NewProduct, Product, ProductId, ProductUpdate, RefreshRequest, TokenPair,
    UserProfile,
};
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "https://api.escuelajs.co/api/v1";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base url {0:?}")]
    InvalidBaseUrl(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream answered {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("login response carried no access token")]
    MissingToken,
    #[error("could not decode upstream response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

/// The external product service. Every call is a single request; nothing is
/// retried and no timeout is applied beyond the transport default.
#[async_trait]
pub trait ProductApi: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, ApiError>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
    async fn profile(&self, access_token: &str) -> Result<UserProfile, ApiError>;
    async fn list_products(&self, access_token: &str) -> Result<Vec<Product>, ApiError>;
    /// Any 2xx confirms the write. The echoed product is returned when the
    /// body parses as one.
    async fn create_product(
        &self,
        access_token: &str,
        product: &NewProduct,
    ) -> Result<Option<Product>, ApiError>;
    async fn update_product(
        &self,
        access_token: &str,
        id: &ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, ApiError>;
    async fn delete_product(&self, access_token: &str, id: &ProductId) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, ApiError> {
        // Url::join drops the last segment unless the base ends with '/'.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base =
            Url::parse(&normalized).map_err(|_| ApiError::InvalidBaseUrl(base_url.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|_| ApiError::InvalidBaseUrl(format!("{}{}", self.base, path)))?;
        Ok(self.http.request(method, url))
    }

    fn authed(
        &self,
        method: Method,
        path: &str,
        access_token: &str,
    ) -> Result<RequestBuilder, ApiError> {
        Ok(self.request(method, path)?.bearer_auth(access_token))
    }
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { status, body })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = check(response).await?.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Like [`decode`], but an unreadable body after a 2xx is not an error.
async fn decode_echo<T: DeserializeOwned>(response: Response) -> Result<Option<T>, ApiError> {
    let response = check(response).await?;
    let Ok(bytes) = response.bytes().await else {
        return Ok(None);
    };
    Ok(serde_json::from_slice(&bytes).ok())
}

#[async_trait]
impl ProductApi for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, ApiError> {
        let response = self
            .request(Method::POST, "auth/login")?
            .json(credentials)
            .send()
            .await?;
        let pair: TokenPair = decode(response).await?;
        if !pair.has_access_token() {
            return Err(ApiError::MissingToken);
        }
        Ok(pair)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        let response = self
            .request(Method::POST, "auth/refresh-token")?
            .json(&body)
            .send()
            .await?;
        let pair: TokenPair = decode(response).await?;
        if !pair.has_access_token() {
            return Err(ApiError::MissingToken);
        }
        Ok(pair)
    }

    async fn profile(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        let response = self
            .authed(Method::GET, "auth/profile", access_token)?
            .send()
            .await?;
        decode(response).await
    }

    async fn list_products(&self, access_token: &str) -> Result<Vec<Product>, ApiError> {
        let response = self
            .authed(Method::GET, "products", access_token)?
            .send()
            .await?;
        decode(response).await
    }

    async fn create_product(
        &self,
        access_token: &str,
        product: &NewProduct,
    ) -> Result<Option<Product>, ApiError> {
        let response = self
            .authed(Method::POST, "products", access_token)?
            .json(product)
            .send()
            .await?;
        decode_echo(response).await
    }

    async fn update_product(
        &self,
        access_token: &str,
        id: &ProductId,
        update: &ProductUpdate,
    ) -> Result<Option<Product>, ApiError> {
        let response = self
            .authed(Method::PUT, &format!("products/{id}"), access_token)?
            .json(update)
            .send()
            .await?;
        decode_echo(response).await
    }

    async fn delete_product(&self, access_token: &str, id: &ProductId) -> Result<(), ApiError> {
        let response = self
            .authed(Method::DELETE, &format!("products/{id}"), access_token)?
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
