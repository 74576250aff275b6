//! Request-scoped caller context.
//!
//! A [`RequestContext`] carries the inbound credential and a once-per-request
//! slot for the resolved identity. Handlers receive it explicitly; nothing
//! about "who is calling" lives in process-wide state.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use service_core::error::AppError;
use service_core::middleware::tracing::RequestId;
use service_core::redaction::PRIVATE_TOKEN_HEADER;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::models::TokenSecret;
use crate::services::{IdentityError, ResolvedIdentity};
use crate::AppState;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    request_id: Option<String>,
    credential: Option<TokenSecret>,
    identity: Arc<OnceCell<ResolvedIdentity>>,
}

impl RequestContext {
    pub fn new(request_id: Option<String>, credential: Option<TokenSecret>) -> Self {
        Self {
            request_id,
            credential: credential.filter(|c| !c.is_empty()),
            identity: Arc::new(OnceCell::new()),
        }
    }

    /// Context for a caller presenting `token`.
    pub fn with_token(token: impl Into<TokenSecret>) -> Self {
        Self::new(None, Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build from request headers. `PRIVATE-TOKEN` wins over
    /// `Authorization: Bearer`.
    pub fn from_headers(headers: &HeaderMap, request_id: Option<String>) -> Self {
        let private_token = headers
            .get(PRIVATE_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|value| !value.is_empty());

        Self::new(request_id, private_token.or(bearer).map(TokenSecret::from))
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn credential(&self) -> Option<&TokenSecret> {
        self.credential.as_ref()
    }

    /// The identity already resolved for this request, if any.
    pub fn cached_identity(&self) -> Option<&ResolvedIdentity> {
        self.identity.get()
    }

    /// Resolve at most once per request; failures are not cached.
    pub async fn identity_or_init<F, Fut>(&self, init: F) -> Result<&ResolvedIdentity, IdentityError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResolvedIdentity, IdentityError>>,
    {
        self.identity.get_or_try_init(init).await
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<RequestContext>() {
            return Ok(ctx.clone());
        }

        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(|id| id.as_str().to_string());
        let ctx = RequestContext::from_headers(&parts.headers, request_id);

        // Later extractors on the same request share the cache.
        parts.extensions.insert(ctx.clone());
        Ok(ctx)
    }
}

/// Extractor for handlers that need an authenticated caller.
pub struct CurrentUser(pub ResolvedIdentity);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = match RequestContext::from_request_parts(parts, state).await {
            Ok(ctx) => ctx,
            Err(never) => match never {},
        };
        let identity = state.resolver.resolve(&ctx).await?;
        Ok(CurrentUser(identity))
    }
}
