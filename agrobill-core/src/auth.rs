use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::AppState;
use crate::error::AppError;

/// Subject of the verified token, stored in request extensions.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub String);

/// Claims expected inside the JWT. Tokens are issued elsewhere.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Checks an HS256 bearer token and returns its claims.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256))
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            AppError::Unauthorized
        })
}

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Middleware to validate a Bearer JWT in the `Authorization` header.
///
/// Passes every request through when no `JWT_SECRET` is configured.
pub async fn jwt_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let secret = match state.config.jwt_secret.as_deref() {
        Some(secret) => secret,
        None => return Ok(next.run(req).await),
    };

    let token = bearer_token(&req).ok_or(AppError::Unauthorized)?;
    let claims = verify_token(token, secret)?;

    req.extensions_mut().insert(CurrentUser(claims.sub));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp: usize) -> String {
        let claims = Claims {
            sub: "clerk-7".to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
            .expect("encode")
    }

    fn far_future() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn test_verify_token_accepts_valid_signature() {
        let claims = verify_token(&token("s3cret", far_future()), "s3cret").expect("valid");
        assert_eq!(claims.sub, "clerk-7");
    }

    #[test]
    fn test_verify_token_rejects_wrong_secret_and_expiry() {
        assert!(matches!(
            verify_token(&token("other", far_future()), "s3cret"),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            verify_token(&token("s3cret", 1), "s3cret"),
            Err(AppError::Unauthorized)
        ));
    }
}
