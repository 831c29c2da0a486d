//! Web authentication: bcrypt password hashing, JWT issuance/verification,
//! and the per-email failed-login rate limiter (§4.1, §5, §7).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use conduit_core::config::{FAILED_LOGIN_MAX_ATTEMPTS, FAILED_LOGIN_WINDOW_SECS};
use conduit_core::time::now_rfc3339;

use crate::error::{IdentityError, Result};
use crate::types::{WebRole, WebUser};
use crate::users;

const BCRYPT_COST: u32 = 12;

pub fn hash_password(plain: &str) -> Result<String> {
    bcrypt::hash(plain, BCRYPT_COST).map_err(|e| IdentityError::Token(e.to_string()))
}

/// Minimum length 8, and must contain upper, lower, and digit (§4.1 change_password).
pub fn validate_password_strength(plain: &str) -> Result<()> {
    if plain.len() < 8 {
        return Err(IdentityError::InvalidInput(
            "password must be at least 8 characters".into(),
        ));
    }
    let has_upper = plain.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = plain.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = plain.chars().any(|c| c.is_ascii_digit());
    if !(has_upper && has_lower && has_digit) {
        return Err(IdentityError::InvalidInput(
            "password must contain an uppercase letter, a lowercase letter, and a digit".into(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn issue_token(jwt_secret: &str, lifetime_secs: i64, email: &str, role: WebRole) -> Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: email.to_string(),
        role: role.as_str().to_string(),
        iat: now,
        exp: now + lifetime_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| IdentityError::Token(e.to_string()))
}

/// Pure function of the token and the current signing secret (§4.1).
pub fn verify_token(jwt_secret: &str, token: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| IdentityError::Token(e.to_string()))?;
    Ok(data.claims)
}

/// Records a failed login attempt and returns `Err(RateLimited)` if this
/// email has hit `FAILED_LOGIN_MAX_ATTEMPTS` within the rolling window.
fn record_failed_login_and_check(conn: &rusqlite::Connection, email: &str) -> Result<()> {
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO failed_logins (email, attempted_at) VALUES (?1, ?2)",
        params![email, now],
    )?;

    let window_start = chrono::Utc::now() - chrono::Duration::seconds(FAILED_LOGIN_WINDOW_SECS);
    let window_start_str = window_start.to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM failed_logins WHERE email = ?1 AND attempted_at >= ?2",
        params![email, window_start_str],
        |r| r.get(0),
    )?;

    if count as u32 > FAILED_LOGIN_MAX_ATTEMPTS {
        warn!(email, count, "rate limit exceeded");
        return Err(IdentityError::RateLimited);
    }
    Ok(())
}

fn clear_failed_logins(conn: &rusqlite::Connection, email: &str) -> Result<()> {
    conn.execute("DELETE FROM failed_logins WHERE email = ?1", params![email])?;
    Ok(())
}

/// `login(email, password)` per §4.1. Constant-time-ish: we always run
/// bcrypt verify even against a dummy hash when the account is unknown, so
/// account existence is not revealed through timing.
pub fn login(
    conn: &rusqlite::Connection,
    jwt_secret: &str,
    token_lifetime_secs: i64,
    email: &str,
    password: &str,
) -> Result<(String, WebUser)> {
    // Rate limit check happens before we touch bcrypt so a flood of
    // attempts against one email doesn't also become a CPU amplification
    // attack; the window is still recorded per attempt below.
    let window_start = chrono::Utc::now() - chrono::Duration::seconds(FAILED_LOGIN_WINDOW_SECS);
    let window_start_str = window_start.to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let recent: i64 = conn.query_row(
        "SELECT COUNT(*) FROM failed_logins WHERE email = ?1 AND attempted_at >= ?2",
        params![email, window_start_str],
        |r| r.get(0),
    )?;
    if recent as u32 >= FAILED_LOGIN_MAX_ATTEMPTS {
        return Err(IdentityError::RateLimited);
    }

    let user = users::get_web_user(conn, email)?;

    const DUMMY_HASH: &str = "$2b$12$CIm/Z4/uv0rrpypwPsF8O.T3qLL7z8V.5FfBOzXoi2xIJvLyf/G1C";
    let hash = user
        .as_ref()
        .map(|u| u.password_hash.as_str())
        .unwrap_or(DUMMY_HASH);
    let matches = bcrypt::verify(password, hash).unwrap_or(false);

    let Some(user) = user else {
        record_failed_login_and_check(conn, email)?;
        return Err(IdentityError::InvalidCredentials);
    };

    if !matches {
        record_failed_login_and_check(conn, email)?;
        return Err(IdentityError::InvalidCredentials);
    }

    if !user.enabled {
        return Err(IdentityError::AccountDisabled);
    }

    clear_failed_logins(conn, email)?;
    users::touch_last_login(conn, email)?;
    let token = issue_token(jwt_secret, token_lifetime_secs, email, user.role)?;
    info!(email, "login succeeded");
    Ok((token, user))
}

/// `change_password` per §4.1: requires the current password, enforces
/// strength, rehashes with a fresh salt, clears `require_password_change`.
pub fn change_password(
    conn: &rusqlite::Connection,
    email: &str,
    current_password: &str,
    new_password: &str,
) -> Result<()> {
    let user = users::get_web_user(conn, email)?.ok_or_else(|| IdentityError::NotFound(email.into()))?;
    if !bcrypt::verify(current_password, &user.password_hash).unwrap_or(false) {
        return Err(IdentityError::InvalidCredentials);
    }
    validate_password_strength(new_password)?;
    let hash = hash_password(new_password)?;
    users::set_password_hash(conn, email, &hash)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_test_db;
    use crate::users::create_web_user;

    #[test]
    fn login_succeeds_with_correct_password() {
        let conn = open_test_db();
        let hash = hash_password("Secr3tpass").unwrap();
        create_web_user(&conn, "alice@example.com", &hash, WebRole::User).unwrap();

        let (token, user) = login(&conn, "secret", 3600, "alice@example.com", "Secr3tpass").unwrap();
        assert!(!token.is_empty());
        assert_eq!(user.email, "alice@example.com");

        let claims = verify_token("secret", &token).unwrap();
        assert_eq!(claims.sub, "alice@example.com");
    }

    #[test]
    fn login_fails_with_wrong_password_and_rate_limits() {
        let conn = open_test_db();
        let hash = hash_password("Secr3tpass").unwrap();
        create_web_user(&conn, "bob@example.com", &hash, WebRole::User).unwrap();

        for _ in 0..FAILED_LOGIN_MAX_ATTEMPTS {
            let result = login(&conn, "secret", 3600, "bob@example.com", "wrong");
            assert!(matches!(result, Err(IdentityError::InvalidCredentials)));
        }

        let result = login(&conn, "secret", 3600, "bob@example.com", "wrong");
        assert!(matches!(result, Err(IdentityError::RateLimited)));
    }

    #[test]
    fn password_strength_rules() {
        assert!(validate_password_strength("short1A").is_err());
        assert!(validate_password_strength("alllowercase1").is_err());
        assert!(validate_password_strength("GoodPass1").is_ok());
    }
}
