//! Cookie-carried session identity.
//!
//! Requests without a valid `dbbot_sid` cookie get a fresh UUID, which is returned to
//! the browser with `Set-Cookie`.

use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "dbbot_sid";

/// The caller's session id, inserted as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reads the session id from the `Cookie` headers. Values that are not UUIDs are ignored.
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
        .map(|id| SessionId(id.to_string()))
}

pub async fn session_layer(mut req: Request, next: Next) -> Response {
    let (session, minted) = match session_from_headers(req.headers()) {
        Some(session) => (session, false),
        None => (SessionId(Uuid::new_v4().to_string()), true),
    };
    if minted {
        debug!("Minted session {}", session.as_str());
    }
    req.extensions_mut().insert(session.clone());

    let mut response = next.run(req).await;
    if minted {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, session.as_str());
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!("Failed to set session cookie: {}", e),
        }
    }
    response
}
