//! Live access tokens.
//!
//! Tokens are opaque strings minted by the authentication service and written
//! to the shared key-value store. The live API only resolves them to a user.

use serde::{Deserialize, Serialize};

use bazaar_common::id::prefix;

use crate::db::kv::KeyValueStore;
use crate::error::ApiError;

/// Access token TTL in seconds (1 hour).
pub const ACCESS_TTL_SECS: u64 = 3600;

/// Data stored alongside an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessData {
    pub user_id: String,
}

/// Generate an opaque random token with the given prefix.
pub fn generate_opaque_token(prefix: &str, bytes: usize) -> String {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use rand::Rng;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill(&mut buf[..]);
    format!("{}_{}", prefix, URL_SAFE_NO_PAD.encode(&buf))
}

pub fn generate_access_token() -> String {
    generate_opaque_token(prefix::TOKEN, 32)
}

fn access_key(token: &str) -> String {
    format!("live:at:{token}")
}

/// Store a token for `data.user_id`. Called by the auth service (and tests).
pub async fn store_access_token(
    kv: &dyn KeyValueStore,
    token: &str,
    data: &AccessData,
) -> Result<(), ApiError> {
    let value = serde_json::to_string(data)?;
    kv.set_ex(&access_key(token), &value, ACCESS_TTL_SECS).await
}

pub async fn lookup_access_token(
    kv: &dyn KeyValueStore,
    token: &str,
) -> Result<Option<AccessData>, ApiError> {
    match kv.get(&access_key(token)).await? {
        Some(v) => {
            let data: AccessData =
                serde_json::from_str(&v).map_err(|_| ApiError::internal("corrupt token data"))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}

/// Mint and store a token for `user_id`, returning it.
pub async fn issue_access_token(kv: &dyn KeyValueStore, user_id: &str) -> Result<String, ApiError> {
    let token = generate_access_token();
    store_access_token(
        kv,
        &token,
        &AccessData {
            user_id: user_id.to_string(),
        },
    )
    .await?;
    Ok(token)
}
