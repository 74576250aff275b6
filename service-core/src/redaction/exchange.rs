use serde::Serialize;

use super::SecretRedactor;

/// Header carrying the caller's personal access token.
pub const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// One request/response pair captured for generated API documentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordedExchange {
    pub method: String,
    pub path: String,
    pub request_headers: Vec<(String, String)>,
    pub request_body: String,
    pub status: u16,
    pub response_headers: Vec<(String, String)>,
    pub response_body: String,
}

impl RecordedExchange {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn request_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request_headers.push((name.into(), value.into()));
        self
    }

    pub fn request_body(mut self, body: impl Into<String>) -> Self {
        self.request_body = body.into();
        self
    }

    pub fn response(mut self, status: u16, body: impl Into<String>) -> Self {
        self.status = status;
        self.response_body = body.into();
        self
    }

    pub fn response_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response_headers.push((name.into(), value.into()));
        self
    }
}

fn is_credential_header(name: &str) -> bool {
    name.eq_ignore_ascii_case(PRIVATE_TOKEN_HEADER) || name.eq_ignore_ascii_case(AUTHORIZATION_HEADER)
}

impl SecretRedactor {
    /// Prepare a captured exchange for publication.
    ///
    /// Credential headers are dropped entirely; every other header value,
    /// the path and both bodies are redacted.
    pub fn sanitize_exchange(&self, exchange: RecordedExchange) -> RecordedExchange {
        let clean_headers = |headers: Vec<(String, String)>| {
            headers
                .into_iter()
                .filter(|(name, _)| !is_credential_header(name))
                .map(|(name, value)| {
                    let value = self.redact(&value).into_owned();
                    (name, value)
                })
                .collect()
        };

        RecordedExchange {
            method: exchange.method,
            path: self.redact(&exchange.path).into_owned(),
            request_headers: clean_headers(exchange.request_headers),
            request_body: self.redact(&exchange.request_body).into_owned(),
            status: exchange.status,
            response_headers: clean_headers(exchange.response_headers),
            response_body: self.redact(&exchange.response_body).into_owned(),
        }
    }
}
