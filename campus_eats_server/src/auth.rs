//! JWT principal extraction.
//!
//! The auth service (registration, OTP, login) lives outside this server; it issues HS256 access
//! tokens with the shared `CE_JWT_SECRET`. This module verifies those tokens and hands the
//! resolved [`Principal`] to the engine, which trusts it without re-validating credentials.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use campus_eats_engine::{
    db_types::{Principal, Role},
    order_objects::PayerInfo,
};
use ce_common::Secret;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, ServerError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The principal's user id.
    pub sub: i64,
    pub role: Role,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

impl JwtClaims {
    pub fn principal(&self) -> Principal {
        Principal::new(self.sub, self.role)
    }

    /// The payer details forwarded to the gateway checkout, with the fallbacks the mobile app
    /// relies on when a profile is sparse.
    pub fn payer_info(&self) -> PayerInfo {
        let name = self.name.clone().unwrap_or_default();
        let mut parts = name.split_whitespace();
        let first_name = parts.next().unwrap_or("Campus").to_string();
        let last_name = {
            let rest = parts.collect::<Vec<_>>().join(" ");
            if rest.is_empty() { "Customer".to_string() } else { rest }
        };
        let email = self
            .email
            .clone()
            .or_else(|| self.phone.as_ref().map(|p| format!("{p}@campuseats.et")))
            .unwrap_or_else(|| format!("user-{}@campuseats.et", self.sub));
        PayerInfo { email, first_name, last_name, phone: self.phone.clone() }
    }
}

/// Signs and verifies access tokens with the configured shared secret.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(secret: &Secret<String>) -> Self {
        let bytes = secret.reveal().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            validation: Validation::default(),
        }
    }

    /// Issues an access token for the given principal. Used by the auth boundary and by tests;
    /// this server itself only verifies.
    pub fn issue_token(
        &self,
        principal: Principal,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
        validity: Option<Duration>,
    ) -> Result<String, AuthError> {
        let validity = validity.unwrap_or_else(|| Duration::hours(24));
        let claims = JwtClaims {
            sub: principal.id,
            role: principal.role,
            name,
            email,
            phone,
            exp: (Utc::now() + validity).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::ValidationError(e.to_string()))
    }

    pub fn verify_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::ValidationError(e.to_string()))?;
        Ok(data.claims)
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let result = extract_claims(req);
        ready(result)
    }
}

fn extract_claims(req: &HttpRequest) -> Result<JwtClaims, ServerError> {
    let issuer = req
        .app_data::<web::Data<TokenIssuer>>()
        .ok_or_else(|| ServerError::InitializeError("Token issuer is not configured".to_string()))?;
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::AuthenticationError(AuthError::MissingToken))?;
    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        ServerError::AuthenticationError(AuthError::PoorlyFormattedToken("expected a Bearer token".to_string()))
    })?;
    let claims = issuer.verify_token(token)?;
    Ok(claims)
}
