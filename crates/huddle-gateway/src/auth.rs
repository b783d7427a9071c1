use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::warn;

use huddle_db::Database;
use huddle_types::api::Claims;

/// The authenticated owner of a connection.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
}

/// Every variant closes the handshake with 4403; the split exists for logs.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("unknown or inactive user")]
    InactiveUser,
    #[error("storage unavailable")]
    Storage(#[from] anyhow::Error),
}

/// Resolve the `token` query parameter of a WebSocket handshake to a user.
///
/// The token is an HMAC-signed bearer (HS256); signature and expiry checks
/// happen inside the jsonwebtoken decode. The subject must resolve to an
/// active user row. This is the only place the core authenticates.
pub fn authenticate(
    db: &Database,
    jwt_secret: &str,
    token: Option<&str>,
) -> Result<Identity, AuthError> {
    let token = token.ok_or(AuthError::MissingToken)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        warn!("token rejected: {e}");
        AuthError::InvalidToken
    })?;

    let user = db
        .get_user(token_data.claims.sub)?
        .ok_or(AuthError::InactiveUser)?;
    if !user.is_active {
        return Err(AuthError::InactiveUser);
    }

    Ok(Identity {
        user_id: user.id,
        username: user.username,
    })
}
