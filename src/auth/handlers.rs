use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, MeResponse, PublicUser, RefreshRequest, SignupRequest},
        extractors::CurrentUser,
        jwt::JwtKeys,
        password::{check_strength, hash_password, verify_password},
        repo_types::User,
        roles::Role,
        services::{
            age_on, is_valid_email, is_valid_signup_phone, issue_tokens, load_profile,
            normalize_email, MINIMUM_SIGNUP_AGE,
        },
    },
    common::{clean, parse_date, today, ApiJson},
    error::{AppError, AppResult},
    members::repo::{self as member_repo, NewMember},
    state::AppState,
    trainers::{
        repo::{self as trainer_repo, NewTrainer},
        services::join_specialties,
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/me", get(get_me))
}

fn required(value: Option<String>, field: &str) -> AppResult<String> {
    clean(value).ok_or_else(|| AppError::validation(format!("{field} is required")))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let first_name = required(payload.first_name, "firstName")?;
    let last_name = required(payload.last_name, "lastName")?;
    let email = normalize_email(&required(payload.email, "email")?);
    let phone = required(payload.phone, "phone")?;
    let dob_raw = required(payload.date_of_birth, "dateOfBirth")?;
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::validation("password is required"))?;

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::validation("Invalid email address"));
    }
    check_strength(&password).map_err(AppError::validation)?;
    if !is_valid_signup_phone(&phone) {
        return Err(AppError::validation("Invalid phone number format"));
    }
    let dob = parse_date(&dob_raw)
        .map_err(|_| AppError::validation("Invalid date of birth format"))?;
    if age_on(dob, today()) < MINIMUM_SIGNUP_AGE {
        warn!(email = %email, "signup below minimum age");
        return Err(AppError::validation("You must be at least 16 years old"));
    }
    let role = Role::from_signup(payload.role.as_deref());
    if role == Role::Admin && !state.config.allow_admin_signup {
        warn!(email = %email, "admin self-signup refused");
        return Err(AppError::Forbidden(
            "Admin accounts cannot be created through signup".into(),
        ));
    }

    let mut tx = state.db.begin().await?;

    if User::email_taken(&mut tx, &email, None).await? {
        warn!(email = %email, "email already registered");
        return Err(AppError::conflict("User with this email already exists"));
    }

    let hash = hash_password(&password)?;
    let user_id = User::create(&mut tx, &email, &hash, role).await?;

    match role {
        Role::Member => {
            let member_id = member_repo::insert_member(
                &mut tx,
                &NewMember {
                    user_id,
                    first_name: Some(first_name),
                    last_name: Some(last_name),
                    dob: Some(dob),
                    gender: None,
                    emergency_contact: clean(payload.emergency_contact).or_else(|| Some(phone.clone())),
                },
            )
            .await?;
            member_repo::replace_phone(&mut tx, member_id, Some(&phone)).await?;
        }
        Role::Trainer => {
            let trainer_id = trainer_repo::insert_trainer(
                &mut tx,
                &NewTrainer {
                    user_id: Some(user_id),
                    first_name: Some(first_name),
                    last_name: Some(last_name),
                    specialization: join_specialties(&payload.specialties),
                    experience_years: payload.experience.unwrap_or(0).max(0),
                    bio: clean(payload.bio),
                    ..NewTrainer::default()
                },
            )
            .await?;
            trainer_repo::replace_phone(&mut tx, trainer_id, Some(&phone)).await?;
        }
        Role::Admin => {}
    }

    let profile = load_profile(&mut tx, user_id, role).await?;
    tx.commit().await?;

    let keys = JwtKeys::from_ref(&state);
    let tokens = issue_tokens(&keys, user_id, role, &email)?;

    info!(user_id = %user_id, email = %email, role = %role, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Account created successfully",
            token: tokens.access,
            refresh_token: tokens.refresh,
            user: PublicUser {
                id: user_id,
                email,
                role,
                profile,
            },
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (Some(email), Some(password)) = (clean(payload.email), payload.password.filter(|p| !p.is_empty())) else {
        return Err(AppError::validation("Email and password are required"));
    };
    let email = normalize_email(&email);

    let mut conn = state.db.acquire().await?;
    let invalid = || AppError::Unauthorized("Invalid email or password".into());

    let user = match User::find_by_email(&mut conn, &email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login unknown email");
            return Err(invalid());
        }
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }

    if !user.is_active {
        warn!(user_id = %user.id, "login on deactivated account");
        return Err(AppError::Unauthorized(
            "Account is deactivated. Please contact administrator.".into(),
        ));
    }

    let role: Role = user.role.parse().map_err(|_| AppError::forbidden())?;
    let profile = load_profile(&mut conn, user.id, role).await?;
    let keys = JwtKeys::from_ref(&state);
    let tokens = issue_tokens(&keys, user.id, role, &user.email)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        message: "Login successful",
        token: tokens.access,
        refresh_token: tokens.refresh,
        user: PublicUser {
            id: user.id,
            email: user.email,
            role,
            profile,
        },
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Unauthorized("Invalid or expired refresh token".into())
    })?;

    let mut conn = state.db.acquire().await?;
    let user = User::find_by_id(&mut conn, claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found or inactive".into()))?;

    let role: Role = user.role.parse().map_err(|_| AppError::forbidden())?;
    let profile = load_profile(&mut conn, user.id, role).await?;
    let tokens = issue_tokens(&keys, user.id, role, &user.email)?;

    Ok(Json(AuthResponse {
        message: "Token refreshed",
        token: tokens.access,
        refresh_token: tokens.refresh,
        user: PublicUser {
            id: user.id,
            email: user.email,
            role,
            profile,
        },
    }))
}

#[instrument(skip(state, user))]
pub async fn get_me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<MeResponse>> {
    let mut conn = state.db.acquire().await?;
    let profile = load_profile(&mut conn, user.user_id, user.role).await?;

    Ok(Json(MeResponse {
        user: PublicUser {
            id: user.user_id,
            email: user.email,
            role: user.role,
            profile,
        },
    }))
}

#[cfg(test)]
mod me_tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn me_response_serialization() {
        let response = MeResponse {
            user: PublicUser {
                id: Uuid::new_v4(),
                email: "test@example.com".to_string(),
                role: Role::Admin,
                profile: None,
            },
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["user"]["email"], "test@example.com");
        assert_eq!(json["user"]["role"], "ADMIN");
        assert!(json["user"]["profile"].is_null());
    }

    #[test]
    fn required_reports_field_name() {
        let err = required(Some("   ".into()), "firstName").unwrap_err();
        assert_eq!(err.to_string(), "firstName is required");
    }
}

#[cfg(test)]
mod signup_tests {
    use crate::{app::build_app, common::dates::format_date, common::today, state::AppState};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use time::Duration;
    use tower::ServiceExt;

    fn body(dob: &str, role: &str) -> String {
        serde_json::json!({
            "firstName": "Young",
            "lastName": "Lifter",
            "email": "young@gym.test",
            "phone": "555-123-4567",
            "dateOfBirth": dob,
            "password": "Str0ngPass",
            "role": role,
        })
        .to_string()
    }

    async fn post_signup(payload: String) -> (StatusCode, serde_json::Value) {
        let req = Request::post("/auth/signup")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .unwrap();
        let res = build_app(AppState::fake()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn under_sixteen_is_a_validation_error() {
        let dob = format_date(today() - Duration::days(365 * 10));
        let (status, json) = post_signup(body(&dob, "MEMBER")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "You must be at least 16 years old");
    }

    #[tokio::test]
    async fn admin_self_signup_is_refused_by_default() {
        let dob = format_date(today() - Duration::days(365 * 30));
        let (status, json) = post_signup(body(&dob, "admin")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["error"], "Admin accounts cannot be created through signup");
    }
}
