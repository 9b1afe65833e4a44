// /server/src/auth.rs
use crate::{error::AppError, state::AppState};
use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: i64,
}

/// Identity of whoever sent the current request.
#[derive(Debug, Clone)]
pub enum Caller {
    Anonymous,
    User(Claims),
}

impl Caller {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Caller::Anonymous => None,
            Caller::User(claims) => Some(claims.sub),
        }
    }

    pub fn require_user(&self) -> Result<&Claims, AppError> {
        match self {
            Caller::Anonymous => Err(AppError::AuthenticationRequired),
            Caller::User(claims) => Ok(claims),
        }
    }
}

/// Resolves the caller for every API request. Requests without an
/// `Authorization` header continue as anonymous; a header that is present
/// but not a valid bearer token is rejected.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let caller = match req.headers().get("Authorization") {
        None => Caller::Anonymous,
        Some(header) => {
            let token = header
                .to_str()
                .ok()
                .and_then(|value| value.strip_prefix("Bearer "))
                .ok_or(AppError::AuthenticationRequired)?;
            Caller::User(decode_token(token, &state.config.jwt_secret)?)
        }
    };

    if let Caller::User(claims) = &caller {
        tracing::debug!("Request from user {} ({})", claims.sub, claims.username);
    }

    req.extensions_mut().insert(caller);

    Ok(next.run(req).await)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Signs claims with the shared secret. Tokens are normally minted by the
/// identity provider that shares `JWT_SECRET` with this service.
pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, AppError> {
    Ok(encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}
