//! Security schemes.
//!
//! A scheme pairs a credential-extraction rule with an [`Authenticate`]
//! implementation. Schemes resolve like dependencies: once per invocation,
//! memoized under the scheme name, before any ordinary provider runs. The
//! framework owns extraction and the error semantics; the authenticator
//! only judges the extracted credential.

use std::sync::Arc;

use serde_json::Value;

use crate::errors::ApiError;
use crate::request::Request;

/// Where the credential lives in the request.
#[derive(Debug, Clone)]
pub enum CredentialRule {
    ApiKeyHeader(String),
    ApiKeyQuery(String),
    ApiKeyCookie(String),
    /// `Authorization: Bearer <token>`, scheme matched case-insensitively.
    Bearer,
}

enum Extraction {
    Found(String),
    Missing,
    /// Authorization header present but not a usable bearer credential.
    MalformedBearer,
}

impl CredentialRule {
    fn extract(&self, req: &Request) -> Extraction {
        match self {
            CredentialRule::ApiKeyHeader(name) => match req.header_first(name) {
                Some(value) if !value.is_empty() => Extraction::Found(value.to_string()),
                _ => Extraction::Missing,
            },
            CredentialRule::ApiKeyQuery(name) => match req.query_first(name) {
                Some(value) if !value.is_empty() => Extraction::Found(value.to_string()),
                _ => Extraction::Missing,
            },
            CredentialRule::ApiKeyCookie(name) => match req.cookie(name) {
                Some(value) if !value.is_empty() => Extraction::Found(value.to_string()),
                _ => Extraction::Missing,
            },
            CredentialRule::Bearer => {
                let Some(raw) = req.header_first("authorization") else {
                    return Extraction::Missing;
                };
                match raw.split_once(' ') {
                    Some((scheme, token))
                        if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() =>
                    {
                        Extraction::Found(token.trim().to_string())
                    }
                    _ => Extraction::MalformedBearer,
                }
            }
        }
    }
}

/// Raised by an authenticator to reject a presented credential.
#[derive(Debug, Clone)]
pub struct AuthRejection {
    pub status: u16,
    pub detail: String,
    pub www_authenticate: Option<String>,
}

impl AuthRejection {
    /// 401 with a `WWW-Authenticate: Bearer` challenge.
    #[must_use]
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        AuthRejection {
            status: 401,
            detail: detail.into(),
            www_authenticate: Some("Bearer".to_string()),
        }
    }

    /// 403 for a credential that is understood but not acceptable.
    #[must_use]
    pub fn forbidden(detail: impl Into<String>) -> Self {
        AuthRejection {
            status: 403,
            detail: detail.into(),
            www_authenticate: None,
        }
    }
}

/// Judges an extracted credential and produces the claims to bind.
pub trait Authenticate: Send + Sync + 'static {
    fn authenticate(&self, req: &Request, credential: &str) -> Result<Value, AuthRejection>;
}

struct FnAuthenticator<F>(F);

impl<F> Authenticate for FnAuthenticator<F>
where
    F: Fn(&Request, &str) -> Result<Value, AuthRejection> + Send + Sync + 'static,
{
    fn authenticate(&self, req: &Request, credential: &str) -> Result<Value, AuthRejection> {
        (self.0)(req, credential)
    }
}

/// Wrap a closure as an authenticator.
pub fn authenticate_fn<F>(f: F) -> Arc<dyn Authenticate>
where
    F: Fn(&Request, &str) -> Result<Value, AuthRejection> + Send + Sync + 'static,
{
    Arc::new(FnAuthenticator(f))
}

pub struct SecurityScheme {
    name: String,
    rule: CredentialRule,
    authenticator: Arc<dyn Authenticate>,
    optional: bool,
}

impl std::fmt::Debug for SecurityScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityScheme")
            .field("name", &self.name)
            .field("rule", &self.rule)
            .field("optional", &self.optional)
            .finish_non_exhaustive()
    }
}

impl SecurityScheme {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        rule: CredentialRule,
        authenticator: Arc<dyn Authenticate>,
    ) -> Self {
        SecurityScheme {
            name: name.into(),
            rule,
            authenticator,
            optional: false,
        }
    }

    #[must_use]
    pub fn bearer(name: impl Into<String>, authenticator: Arc<dyn Authenticate>) -> Self {
        Self::new(name, CredentialRule::Bearer, authenticator)
    }

    #[must_use]
    pub fn api_key_header(
        name: impl Into<String>,
        header: impl Into<String>,
        authenticator: Arc<dyn Authenticate>,
    ) -> Self {
        Self::new(
            name,
            CredentialRule::ApiKeyHeader(header.into()),
            authenticator,
        )
    }

    #[must_use]
    pub fn api_key_query(
        name: impl Into<String>,
        param: impl Into<String>,
        authenticator: Arc<dyn Authenticate>,
    ) -> Self {
        Self::new(
            name,
            CredentialRule::ApiKeyQuery(param.into()),
            authenticator,
        )
    }

    #[must_use]
    pub fn api_key_cookie(
        name: impl Into<String>,
        cookie: impl Into<String>,
        authenticator: Arc<dyn Authenticate>,
    ) -> Self {
        Self::new(
            name,
            CredentialRule::ApiKeyCookie(cookie.into()),
            authenticator,
        )
    }

    /// Absent credential binds `null` instead of rejecting the request.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn rule(&self) -> &CredentialRule {
        &self.rule
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Extract and authenticate for one request.
    pub(crate) fn resolve(&self, req: &Request) -> Result<Value, ApiError> {
        match self.rule.extract(req) {
            Extraction::Found(credential) => self
                .authenticator
                .authenticate(req, &credential)
                .map_err(|rej| ApiError::Authentication {
                    scheme: self.name.clone(),
                    status: rej.status,
                    detail: rej.detail,
                    www_authenticate: rej.www_authenticate,
                }),
            Extraction::Missing if self.optional => Ok(Value::Null),
            Extraction::Missing => Err(ApiError::Authentication {
                scheme: self.name.clone(),
                status: 403,
                detail: "Not authenticated".to_string(),
                www_authenticate: None,
            }),
            Extraction::MalformedBearer => Err(ApiError::Authentication {
                scheme: self.name.clone(),
                status: 401,
                detail: "Invalid authentication credentials".to_string(),
                www_authenticate: Some("Bearer".to_string()),
            }),
        }
    }
}

/// Check claims against required scopes. Accepts either a `scopes` array
/// or a space-separated `scope` string, mirroring common token shapes.
pub(crate) fn scopes_satisfied(claims: &Value, required: &[String]) -> bool {
    if required.is_empty() {
        return true;
    }
    let granted: Vec<&str> = match (claims.get("scopes"), claims.get("scope")) {
        (Some(Value::Array(items)), _) => items.iter().filter_map(Value::as_str).collect(),
        (_, Some(Value::String(joined))) => joined.split_whitespace().collect(),
        _ => Vec::new(),
    };
    required.iter().all(|want| granted.contains(&want.as_str()))
}
