//! Bearer-token auth for the HTTP API (spec §6). The real deployment wires
//! a `TokenVerifier` backed by its user/role store (out of scope per §1);
//! this crate ships a shared-secret verifier so the route table is
//! independently runnable and testable.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> bool;
}

/// Accepts exactly one shared secret. A `None` secret disables auth
/// entirely, useful for local development and the integration tests in
/// §11.2 that talk to a bare control plane.
pub struct SharedSecretVerifier {
    secret: Option<String>,
}

impl SharedSecretVerifier {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret }
    }
}

impl TokenVerifier for SharedSecretVerifier {
    fn verify(&self, token: &str) -> bool {
        match &self.secret {
            Some(secret) => token == secret,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_secret_accepts_anything() {
        let verifier = SharedSecretVerifier::new(None);
        assert!(verifier.verify("anything"));
        assert!(verifier.verify(""));
    }

    #[test]
    fn secret_requires_exact_match() {
        let verifier = SharedSecretVerifier::new(Some("s3cr3t".to_string()));
        assert!(verifier.verify("s3cr3t"));
        assert!(!verifier.verify("wrong"));
        assert!(!verifier.verify(""));
    }
}

pub async fn require_bearer_token(
    State(verifier): State<Arc<dyn TokenVerifier>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match token {
        Some(token) if verifier.verify(token) => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
