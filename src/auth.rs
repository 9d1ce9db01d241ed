// src/auth.rs
use crate::config::Config;
use crate::error::WatchError;
use crate::models::Claims;
use actix_web::{
    FromRequest, HttpRequest,
    dev::Payload,
    http::header::AUTHORIZATION,
    web,
};
#[cfg(test)]
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode};
#[cfg(test)]
use jsonwebtoken::{EncodingKey, Header, encode};
use std::future::{Ready, ready};
use uuid::Uuid;

const ACCESS_TOKEN_COOKIE: &str = "accessToken";

/// Owner established by a valid access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

impl FromRequest for AuthenticatedUser {
    type Error = WatchError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, WatchError> {
    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| WatchError::internal("Config missing from app data"))?;

    let token = token_from_request(req).ok_or_else(|| WatchError::unauthorized("Unauthorized request"))?;

    let owner = verify_token(&token, &config.jwt_secret).map_err(|e| {
        tracing::debug!("Rejected access token: {}", e);
        WatchError::unauthorized("Invalid access token")
    })?;

    Ok(AuthenticatedUser(owner))
}

// Cookie wins over the Authorization header
fn token_from_request(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(ACCESS_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }

    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

pub fn verify_token(token: &str, secret: &str) -> Result<Uuid, WatchError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|e| WatchError::unauthorized(e.to_string()))?;

    Uuid::parse_str(&data.claims.sub).map_err(|e| WatchError::unauthorized(e.to_string()))
}

/// Real tokens come from the auth service; this mints them for tests.
#[cfg(test)]
pub fn issue_token(owner: Uuid, secret: &str, ttl: Duration) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: owner.to_string(),
        exp: (Utc::now() + ttl).timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))
}
