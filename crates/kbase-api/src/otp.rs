use axum::{Json, extract::State, response::IntoResponse};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use tracing::{error, info};

use kbase_db::PasswordReset;
use kbase_types::api::{MessageResponse, SendOtpRequest, VerificationClaims, VerifyOtpRequest, VerifyRegisterResponse};
use kbase_types::models::{OtpPurpose, normalize_email};

use crate::auth::{validate_email, validate_password};
use crate::error::{ApiError, ApiJson};
use crate::mail::{forgot_otp_email, register_otp_email};
use crate::password::hash_password;
use crate::state::{AppState, db_call};

const TICKET_PURPOSE: &str = "email-verification";
const TICKET_TTL_MINUTES: i64 = 15;

/// Uniform six-digit code, never with a leading zero.
pub fn generate_code() -> String {
    rand::rng().random_range(100_000..=999_999).to_string()
}

/// Issue a code for (email, purpose) and mail it. Returns the code for callers
/// that need it outside the mailbox (tests, tooling).
pub async fn send_otp(state: &AppState, email: &str, purpose: OtpPurpose) -> Result<String, ApiError> {
    let email = normalize_email(email);
    validate_email(&email)?;

    let lookup = email.clone();
    let registered = db_call(state, move |db| db.email_registered(&lookup)).await?;
    match purpose {
        OtpPurpose::Register if registered => return Err(ApiError::AlreadyRegistered),
        OtpPurpose::Forgot if !registered => return Err(ApiError::NotRegistered),
        _ => {}
    }

    let code = generate_code();
    let now = chrono::Utc::now();
    let expires_at = now + state.auth.otp_ttl;

    let (em, cd) = (email.clone(), code.clone());
    db_call(state, move |db| db.issue_otp(&em, &cd, purpose, expires_at, now)).await?;

    let (subject, html) = match purpose {
        OtpPurpose::Register => ("Verify Your Email", register_otp_email(&code, &email)),
        OtpPurpose::Forgot => ("Reset Password OTP", forgot_otp_email(&code, &email)),
    };
    state.mailer.send(&email, subject, &html).await.map_err(|e| {
        error!("Failed to mail {} OTP to {}: {:#}", purpose, email, e);
        ApiError::Internal(e)
    })?;

    info!("Issued {} OTP for {}", purpose, email);
    Ok(code)
}

/// Consume a register code. On success returns the verification ticket.
pub async fn verify_register(state: &AppState, email: &str, code: &str) -> Result<String, ApiError> {
    let email = normalize_email(email);
    let (em, cd) = (email.clone(), code.trim().to_string());
    let valid = db_call(state, move |db| {
        db.consume_otp(&em, &cd, OtpPurpose::Register, chrono::Utc::now())
    })
    .await?;

    if !valid {
        return Err(ApiError::InvalidOrExpiredOtp);
    }
    Ok(issue_ticket(&state.auth.jwt_secret, &email)?)
}

/// Consume a forgot code and set the new password.
pub async fn reset_password(
    state: &AppState,
    email: &str,
    code: &str,
    new_password: Option<&str>,
) -> Result<(), ApiError> {
    let new_password = new_password.ok_or_else(|| ApiError::validation("New password is required"))?;
    validate_password(new_password)?;

    let email = normalize_email(email);
    let password_hash = hash_password(new_password)?;
    let (em, cd) = (email.clone(), code.trim().to_string());
    let outcome = db_call(state, move |db| {
        db.reset_password_with_otp(&em, &cd, &password_hash, chrono::Utc::now())
    })
    .await?;

    match outcome {
        PasswordReset::Updated => {
            info!("Password reset for {}", email);
            Ok(())
        }
        PasswordReset::InvalidCode => Err(ApiError::InvalidOrExpiredOtp),
        PasswordReset::UnknownUser => Err(ApiError::NotRegistered),
    }
}

pub fn issue_ticket(secret: &str, email: &str) -> anyhow::Result<String> {
    let claims = VerificationClaims {
        sub: email.to_string(),
        purpose: TICKET_PURPOSE.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::minutes(TICKET_TTL_MINUTES)).timestamp() as usize,
    };
    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}

/// Returns the verified email named by a ticket.
pub fn verify_ticket(secret: &str, ticket: &str) -> Result<String, ApiError> {
    let invalid = || ApiError::validation("Invalid or expired verification token");
    let data = decode::<VerificationClaims>(
        ticket,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| invalid())?;

    if data.claims.purpose != TICKET_PURPOSE {
        return Err(invalid());
    }
    Ok(data.claims.sub)
}

// -- Handlers --

pub async fn send_register_otp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SendOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    send_otp(&state, &req.email, OtpPurpose::Register).await?;
    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

pub async fn verify_register_otp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let verification_token = verify_register(&state, &req.email, &req.code).await?;
    Ok(Json(VerifyRegisterResponse {
        message: "OTP verified".into(),
        verification_token,
    }))
}

pub async fn send_forgot_otp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SendOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    send_otp(&state, &req.email, OtpPurpose::Forgot).await?;
    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

pub async fn verify_forgot_otp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    reset_password(&state, &req.email, &req.code, req.new_password.as_deref()).await?;
    Ok(Json(MessageResponse::new("Password reset successfully")))
}
