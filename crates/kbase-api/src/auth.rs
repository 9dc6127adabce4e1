use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{debug, info};
use uuid::Uuid;

use kbase_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest, UserResponse};
use kbase_types::models::{Role, normalize_email};

use crate::convert;
use crate::error::{ApiError, ApiJson};
use crate::otp::verify_ticket;
use crate::password::{MIN_PASSWORD_LEN, hash_password, verify_password};
use crate::state::{AppState, AuthSettings, db_call};

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);
    if name.is_empty() {
        return Err(ApiError::validation("Name is required"));
    }
    validate_email(&email)?;
    validate_password(&req.password)?;

    match req.verification_token.as_deref() {
        Some(ticket) => {
            if verify_ticket(&state.auth.jwt_secret, ticket)? != email {
                return Err(ApiError::validation("Verification token does not match this email"));
            }
        }
        None if state.auth.require_email_verification => {
            return Err(ApiError::validation("Email verification is required before registering"));
        }
        None => {}
    }

    let lookup = email.clone();
    if db_call(&state, move |db| db.email_registered(&lookup)).await? {
        return Err(ApiError::EmailInUse);
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();
    let role = req.role;

    let (uid, em, nm) = (user_id.to_string(), email.clone(), name.clone());
    let created = db_call(&state, move |db| {
        db.create_user(&uid, &em, &password_hash, &nm, role, chrono::Utc::now())
    })
    .await?;
    // Lost a race with a concurrent registration of the same email.
    if !created {
        return Err(ApiError::EmailInUse);
    }

    info!("Registered {} as {}", email, role);

    let token = create_token(&state.auth, user_id, &email, role)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserResponse { id: user_id, email, name, role },
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);

    let lookup = email.clone();
    let user = db_call(&state, move |db| db.get_user_by_email(&lookup))
        .await?
        .ok_or_else(|| {
            debug!("Login for unknown email {}", email);
            ApiError::InvalidCredentials
        })?;

    // Verify password
    if !verify_password(&req.password, &user.password)? {
        debug!("Password mismatch for {}", user.email);
        return Err(ApiError::InvalidCredentials);
    }

    let user = convert::user(&user)?;
    let token = create_token(&state.auth, user.id, &user.email, user.role)?;

    Ok(Json(AuthResponse { token, user }))
}

/// The caller's stored profile.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    let user = db_call(&state, move |db| db.get_user_by_id(&id))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    Ok(Json(convert::user(&user)?))
}

pub fn validate_email(email: &str) -> Result<(), ApiError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ApiError::validation("A valid email is required")),
    }
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn create_token(
    settings: &AuthSettings,
    user_id: Uuid,
    email: &str,
    role: Role,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role,
        exp: (chrono::Utc::now() + settings.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    #[test]
    fn token_round_trips_claims() {
        let settings = AuthSettings::default();
        let id = Uuid::new_v4();
        let token = create_token(&settings, id, "a@corp.io", Role::Admin).unwrap();

        let claims = decode_token(&settings.jwt_secret, &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, Role::Admin);

        assert!(matches!(decode_token("other-secret", &token), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let settings = AuthSettings { token_ttl: chrono::Duration::hours(-2), ..Default::default() };
        let token = create_token(&settings, Uuid::new_v4(), "a@corp.io", Role::Employee).unwrap();
        assert!(decode_token(&settings.jwt_secret, &token).is_err());
    }

    #[test]
    fn input_validation() {
        assert!(validate_email("a@b").is_ok());
        assert!(validate_email("ab").is_err());
        assert!(validate_email("@b").is_err());
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
    }
}
