use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;

use crate::error::AppError;
use crate::redaction::{PRIVATE_TOKEN_HEADER, SecretRedactor};

/// Masks registered secrets in every error response leaving the service.
///
/// Successful responses pass through untouched; a freshly issued token has to
/// reach its owner once.
pub async fn redact_error_response_middleware<S>(
    State(state): State<S>,
    req: Request,
    next: Next,
) -> Response
where
    S: AsRef<SecretRedactor> + Clone + Send + Sync + 'static,
{
    let mut response = next.run(req).await;
    response.headers_mut().remove(PRIVATE_TOKEN_HEADER);

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let redactor = state.as_ref();
    let (mut parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return AppError::InternalError(anyhow::anyhow!(
                "Failed to read response body: {}",
                e
            ))
            .into_response();
        }
    };

    let text = match std::str::from_utf8(&bytes) {
        Ok(text) => text,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };

    let redacted = redactor.redact(text).into_owned();
    if redacted.len() != bytes.len() {
        parts.headers.remove(header::CONTENT_LENGTH);
    }
    Response::from_parts(parts, Body::from(redacted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode, middleware::from_fn_with_state, routing::get};
    use tower::ServiceExt;

    #[derive(Clone)]
    struct TestState(SecretRedactor);

    impl AsRef<SecretRedactor> for TestState {
        fn as_ref(&self) -> &SecretRedactor {
            &self.0
        }
    }

    fn app(redactor: SecretRedactor) -> Router {
        let state = TestState(redactor);
        Router::new()
            .route(
                "/fail",
                get(|| async {
                    AppError::Conflict(anyhow::anyhow!("token abcde12345 already issued"))
                }),
            )
            .route("/ok", get(|| async { "abcde12345" }))
            .layer(from_fn_with_state(
                state.clone(),
                redact_error_response_middleware::<TestState>,
            ))
            .with_state(state)
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn error_payloads_are_masked() {
        let redactor = SecretRedactor::new();
        redactor.register("abcde12345");

        let (status, body) = get_body(app(redactor), "/fail").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.contains("abcde**********"));
        assert!(!body.contains("abcde12345"));
    }

    #[tokio::test]
    async fn successful_payloads_pass_through() {
        let redactor = SecretRedactor::new();
        redactor.register("abcde12345");

        let (status, body) = get_body(app(redactor), "/ok").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "abcde12345");
    }
}
