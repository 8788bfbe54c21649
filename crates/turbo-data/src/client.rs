//! The reconciliation client: authoritative profile and favorites data.

use crate::http::{HttpRequest, HttpResponse, Method, Transport};
use crate::wire::{FavoriteItem, FavoriteToggle, FavoritesResponse, ProfileResponse, ServerProfile, ToggleRequest};
use crate::RemoteError;
use async_trait::async_trait;
use std::collections::BTreeSet;
use turbo_cache::Credential;

/// Attempts made for idempotent reads.
const MAX_FETCH_ATTEMPTS: u32 = 2;

/// Remote source of truth for profile and favorites data.
///
/// `fetch_profile` and `fetch_favorites` are idempotent and may be retried.
#[async_trait]
pub trait ReconciliationClient: Send + Sync {
    /// Fetch the authoritative profile for the credential's user.
    async fn fetch_profile(&self, credential: &Credential) -> Result<ServerProfile, RemoteError>;

    /// Fetch the ids of the user's favorited products.
    async fn fetch_favorites(&self, credential: &Credential) -> Result<BTreeSet<String>, RemoteError>;

    /// Toggle a favorite server-side and return the new state.
    async fn toggle_favorite(
        &self,
        credential: &Credential,
        product_id: &str,
    ) -> Result<FavoriteToggle, RemoteError>;
}

/// [`ReconciliationClient`] speaking JSON over HTTP.
pub struct HttpReconciliationClient<T> {
    base_url: String,
    transport: T,
}

impl<T: Transport> HttpReconciliationClient<T> {
    /// Create a client rooted at `base_url`.
    pub fn new(base_url: impl Into<String>, transport: T) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
        }
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str, credential: &Credential) -> HttpRequest {
        HttpRequest::new(method, self.url(path))
            .bearer_auth(credential.token())
            .accept("application/json")
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, RemoteError> {
        tracing::debug!(method = request.method.as_str(), url = %request.url, "remote request");
        self.transport.send(request).await?.error_for_status()
    }

    /// Send an idempotent request, retrying once on a retryable failure.
    async fn send_idempotent(&self, request: HttpRequest) -> Result<HttpResponse, RemoteError> {
        let mut attempt = 1;
        loop {
            match self.send(request.clone()).await {
                Err(e) if e.is_retryable() && attempt < MAX_FETCH_ATTEMPTS => {
                    tracing::warn!(url = %request.url, attempt, error = %e, "retrying remote read");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl<T: Transport> ReconciliationClient for HttpReconciliationClient<T> {
    async fn fetch_profile(&self, credential: &Credential) -> Result<ServerProfile, RemoteError> {
        let request = self.request(Method::Get, "/api/auth/profile", credential);
        let response = self.send_idempotent(request).await?;
        Ok(response.json::<ProfileResponse>()?.into_profile())
    }

    async fn fetch_favorites(&self, credential: &Credential) -> Result<BTreeSet<String>, RemoteError> {
        let request = self.request(Method::Get, "/api/favorites", credential);
        let response = self.send_idempotent(request).await?;
        let body: FavoritesResponse = response.json()?;
        Ok(body.favorites.into_iter().map(FavoriteItem::into_id).collect())
    }

    async fn toggle_favorite(
        &self,
        credential: &Credential,
        product_id: &str,
    ) -> Result<FavoriteToggle, RemoteError> {
        let request = self
            .request(Method::Post, "/api/favorites/toggle", credential)
            .json(&ToggleRequest { product_id })?;
        self.send(request).await?.json()
    }
}
