use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use chrono::{Utc, TimeZone};
use serde_json::Value;
use tracing::debug;
use shared_models::auth::{JwtClaims, User};

type HmacSha256 = Hmac<Sha256>;

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        "Invalid signature encoding".to_string()
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_json = URL_SAFE_NO_PAD.decode(claims_b64)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| "Invalid claims encoding".to_string())?;

    let claims: JwtClaims = serde_json::from_str(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        "Invalid claims format".to_string()
    })?;

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let created_at = claims.iat
        .and_then(|timestamp| Utc.timestamp_opt(timestamp as i64, 0).single());

    let username = claims.user_metadata.as_ref().and_then(username_from_metadata);
    // Supabase stamps `role: authenticated` on every session; the hospital
    // role lives in app_metadata.
    let role = claims.app_metadata
        .as_ref()
        .and_then(|m| m.get("role"))
        .and_then(Value::as_str)
        .map(str::to_owned)
        .or(claims.role);

    let user = User {
        id: claims.sub,
        email: claims.email,
        username,
        role,
        metadata: claims.user_metadata,
        created_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}

fn username_from_metadata(metadata: &Value) -> Option<String> {
    ["username", "user_name"]
        .iter()
        .filter_map(|key| metadata.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestUser};

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn test_valid_token_carries_username_and_role() {
        let user = TestUser::patient("alice@example.com").with_username("alice");
        let token = JwtTestUtils::create_test_token(&user, SECRET, Some(1));

        let validated = validate_token(&token, SECRET).expect("token should validate");
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.username.as_deref(), Some("alice"));
        assert_eq!(validated.role.as_deref(), Some("patient"));
    }

    #[test]
    fn test_app_metadata_role_wins_over_session_role() {
        let user = TestUser::doctor("doc@hospital.test");
        let token = JwtTestUtils::create_supabase_token(&user, SECRET);

        let validated = validate_token(&token, SECRET).expect("token should validate");
        assert_eq!(validated.role.as_deref(), Some("doctor"));
        assert!(validated.has_role(shared_models::auth::Role::Doctor));
    }

    #[test]
    fn test_rejects_bad_tokens() {
        let user = TestUser::default();
        let expired = validate_token(&JwtTestUtils::create_expired_token(&user, SECRET), SECRET);
        assert_eq!(expired.err().as_deref(), Some("Token expired"));
        assert!(validate_token(&JwtTestUtils::create_invalid_signature_token(&user), SECRET).is_err());
        assert!(validate_token(&JwtTestUtils::create_malformed_token(), SECRET).is_err());
        assert!(validate_token("a.b", SECRET).is_err());
    }
}
