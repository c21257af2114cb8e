//! Bearer-token authentication.
//!
//! Every request resolves to a stable external subject. In dev-bypass mode
//! (`AUTH_DISABLED`) a deterministic synthetic subject is injected and no
//! verification occurs; otherwise tokens are RS256 JWTs validated against the
//! tenant's JWKS with issuer and audience checks.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::state::AppState;

/// Synthetic subject injected when verification is disabled.
pub const DEV_SUBJECT: &str = "dev|local-user";

/// Placeholder privilege signal for the match quota. Deliberately a header,
/// not persisted subscription state.
pub const PRO_MEMBER_HEADER: &str = "x-pro-member";

/// Claims the core relies on.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Token verification seam, chosen once at boot.
#[derive(Clone)]
pub enum Authenticator {
    /// Dev bypass: every request is the same synthetic local user.
    Disabled,
    Auth0(Auth0Verifier),
}

impl Authenticator {
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.auth_disabled {
            warn!("AUTH_DISABLED is set; all requests run as {DEV_SUBJECT}");
            return Ok(Authenticator::Disabled);
        }
        let issuer = config
            .auth0_issuer_base_url
            .clone()
            .or_else(|| config.auth0_domain.as_ref().map(|d| format!("https://{d}")))
            .context("AUTH0_ISSUER_BASE_URL or AUTH0_DOMAIN is required unless AUTH_DISABLED")?;
        let audience = config
            .auth0_audience
            .clone()
            .context("AUTH0_AUDIENCE is required unless AUTH_DISABLED")?;
        Ok(Authenticator::Auth0(Auth0Verifier::new(issuer, audience)))
    }

    /// Verifies a bearer token and returns its claims. In bypass mode the
    /// token (or its absence) is ignored.
    pub async fn verify(&self, token: Option<&str>) -> Result<Claims, AppError> {
        match self {
            Authenticator::Disabled => Ok(Claims {
                sub: DEV_SUBJECT.to_string(),
                email: None,
            }),
            Authenticator::Auth0(verifier) => {
                let token = token.ok_or(AppError::Unauthorized)?;
                verifier.verify(token).await
            }
        }
    }
}

/// RS256 verifier with a lazily-filled JWKS key cache.
#[derive(Clone)]
pub struct Auth0Verifier {
    client: reqwest::Client,
    jwks_url: String,
    issuer: String,
    audience: String,
    keys: Arc<RwLock<HashMap<String, DecodingKey>>>,
}

impl Auth0Verifier {
    pub fn new(issuer_base_url: String, audience: String) -> Self {
        let base = issuer_base_url.trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            jwks_url: format!("{base}/.well-known/jwks.json"),
            issuer: format!("{base}/"),
            audience,
            keys: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let header = decode_header(token).map_err(|_| AppError::Unauthorized)?;
        let kid = header.kid.ok_or(AppError::Unauthorized)?;

        let key = match self.cached_key(&kid).await {
            Some(key) => key,
            None => self.refresh_keys(&kid).await?,
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        let data = decode::<Claims>(token, &key, &validation).map_err(|e| {
            debug!("token rejected: {e}");
            AppError::Unauthorized
        })?;
        Ok(data.claims)
    }

    async fn cached_key(&self, kid: &str) -> Option<DecodingKey> {
        self.keys.read().await.get(kid).cloned()
    }

    async fn refresh_keys(&self, kid: &str) -> Result<DecodingKey, AppError> {
        let jwks: JwkSet = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWKS fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWKS parse failed: {e}")))?;

        let mut keys = self.keys.write().await;
        for jwk in &jwks.keys {
            if let (Some(id), Ok(key)) = (jwk.common.key_id.clone(), DecodingKey::from_jwk(jwk)) {
                keys.insert(id, key);
            }
        }
        keys.get(kid).cloned().ok_or(AppError::Unauthorized)
    }
}

/// The authenticated caller: verified subject resolved to its user row
/// (created on first sight), plus the pro-member placeholder flag.
pub struct AuthUser {
    pub user: UserRow,
    pub pro_member: bool,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = state.auth.verify(bearer_token(parts)).await?;
        let user = state
            .repos
            .users
            .ensure_user(&claims.sub, claims.email.as_deref())
            .await?;

        let pro_member = parts
            .headers
            .get(PRO_MEMBER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v == "1")
            .unwrap_or(false);

        Ok(AuthUser { user, pro_member })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(auth_header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/resumes");
        if let Some(value) = auth_header {
            builder = builder.header("authorization", value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extraction() {
        let p = parts(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&p), Some("abc.def.ghi"));
    }

    #[test]
    fn test_missing_header_yields_no_token() {
        assert_eq!(bearer_token(&parts(None)), None);
    }

    #[test]
    fn test_non_bearer_scheme_is_rejected() {
        assert_eq!(bearer_token(&parts(Some("Basic dXNlcjpwdw=="))), None);
    }

    #[tokio::test]
    async fn test_disabled_authenticator_injects_synthetic_subject() {
        let auth = Authenticator::Disabled;
        let claims = auth.verify(None).await.unwrap();
        assert_eq!(claims.sub, DEV_SUBJECT);

        // Any presented token is ignored in bypass mode.
        let claims = auth.verify(Some("whatever")).await.unwrap();
        assert_eq!(claims.sub, DEV_SUBJECT);
    }
}
