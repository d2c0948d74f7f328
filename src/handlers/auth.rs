use crate::handlers::internal_error;
use crate::identity::{self, IdentityError, NewUser};
use crate::schemas::{ApiResponse, AppState, ErrorResponse, FormPage, HomePage};
use crate::session::{self, LoggedInUser, Principal};
use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
    Form,
};
use model::entities::user;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

type HandlerError = (StatusCode, Json<ErrorResponse>);

const REGISTER_FIELDS: [&str; 4] = ["username", "email", "password", "confirm_password"];
const LOGIN_FIELDS: [&str; 2] = ["username", "password"];

/// Registration form (`application/x-www-form-urlencoded`)
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[serde(default)]
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Login form (`application/x-www-form-urlencoded`)
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn auth_error(status: StatusCode, message: &str, code: &str) -> HandlerError {
    (status, Json(ErrorResponse::new(message, code)))
}

fn invalid_form(details: impl std::fmt::Display) -> HandlerError {
    debug!("Rejecting form: {}", details);
    auth_error(
        StatusCode::BAD_REQUEST,
        &format!("Invalid form: {}", details),
        "INVALID_FORM",
    )
}

/// Start a session for `user` and send them to the landing page.
async fn login_and_redirect(state: &AppState, user: &user::Model) -> Result<Response, HandlerError> {
    let started = session::start(&state.db, &state.settings.session, user.id)
        .await
        .map_err(|e| internal_error("Starting session", "DATABASE_ERROR", e))?;
    let cookie = session::session_cookie(&state.settings.session, &started.id);
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/home")).into_response())
}

/// Registration form description
#[utoipa::path(
    get,
    path = "/register",
    tag = "auth",
    responses(
        (status = 200, description = "Registration form", body = ApiResponse<FormPage>),
        (status = 303, description = "Already logged in, redirect to /home")
    )
)]
#[instrument(skip(principal))]
pub async fn register_page(principal: Principal) -> Response {
    if principal.is_authenticated() {
        return Redirect::to("/home").into_response();
    }
    Json(ApiResponse::ok(
        FormPage::new("register", &REGISTER_FIELDS),
        "Register a new account",
    ))
    .into_response()
}

/// Register a new account and log it in
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Registered and logged in, redirect to /home"),
        (status = 400, description = "Malformed form or passwords do not match", body = ErrorResponse),
        (status = 409, description = "Username or email already in use", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, principal, form))]
pub async fn register(
    State(state): State<AppState>,
    principal: Principal,
    form: Result<Form<RegisterForm>, FormRejection>,
) -> Result<Response, HandlerError> {
    trace!("Entering register function");
    if principal.is_authenticated() {
        return Ok(Redirect::to("/home").into_response());
    }
    let Form(form) = form.map_err(invalid_form)?;

    if form.password != form.confirm_password {
        debug!("Passwords do not match for '{}'", form.username);
        return Err(auth_error(
            StatusCode::BAD_REQUEST,
            "Passwords do not match.",
            "PASSWORD_MISMATCH",
        ));
    }
    form.validate().map_err(invalid_form)?;

    let new_user = NewUser {
        username: &form.username,
        email: &form.email,
        password: &form.password,
        is_staff: false,
        is_superuser: false,
    };
    let created = match identity::create_user(&state.db, new_user).await {
        Ok(created) => created,
        Err(IdentityError::UsernameTaken) => {
            return Err(auth_error(
                StatusCode::CONFLICT,
                "Username already taken.",
                "USERNAME_TAKEN",
            ));
        }
        Err(IdentityError::EmailTaken) => {
            return Err(auth_error(
                StatusCode::CONFLICT,
                "Email already used.",
                "EMAIL_TAKEN",
            ));
        }
        Err(e) => return Err(internal_error("Creating user", "DATABASE_ERROR", e)),
    };

    info!("Registered user '{}' (ID {})", created.username, created.id);
    login_and_redirect(&state, &created).await
}

/// Login form description
#[utoipa::path(
    get,
    path = "/login",
    tag = "auth",
    responses(
        (status = 200, description = "Login form", body = ApiResponse<FormPage>),
        (status = 303, description = "Already logged in, redirect to /home")
    )
)]
#[instrument(skip(principal))]
pub async fn login_page(principal: Principal) -> Response {
    if principal.is_authenticated() {
        return Redirect::to("/home").into_response();
    }
    Json(ApiResponse::ok(FormPage::new("login", &LOGIN_FIELDS), "Log in")).into_response()
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Logged in, redirect to /home"),
        (status = 400, description = "Malformed form", body = ErrorResponse),
        (status = 401, description = "Invalid username or password", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, principal, form))]
pub async fn login(
    State(state): State<AppState>,
    principal: Principal,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Response, HandlerError> {
    trace!("Entering login function");
    if principal.is_authenticated() {
        return Ok(Redirect::to("/home").into_response());
    }
    let Form(form) = form.map_err(invalid_form)?;

    let authenticated = identity::authenticate(&state.db, &form.username, &form.password)
        .await
        .map_err(|e| internal_error("Authenticating user", "DATABASE_ERROR", e))?;
    match authenticated {
        Some(user) => {
            info!("User '{}' logged in", user.username);
            login_and_redirect(&state, &user).await
        }
        None => {
            warn!("Failed login attempt for '{}'", form.username);
            Err(auth_error(
                StatusCode::UNAUTHORIZED,
                "Invalid username or password",
                "INVALID_CREDENTIALS",
            ))
        }
    }
}

/// End the current session
#[utoipa::path(
    get,
    path = "/logout",
    tag = "auth",
    responses(
        (status = 303, description = "Session ended, redirect to /register"),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, principal))]
pub async fn logout(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Response, HandlerError> {
    if let Some(session_id) = &principal.session_id {
        session::destroy(&state.db, session_id)
            .await
            .map_err(|e| internal_error("Ending session", "DATABASE_ERROR", e))?;
    }
    if let Some(user) = &principal.user {
        info!("User '{}' logged out", user.username);
    }
    let cookie = session::clear_cookie(&state.settings.session);
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/register")).into_response())
}

/// Landing page of an authenticated user
#[utoipa::path(
    get,
    path = "/home",
    tag = "auth",
    responses(
        (status = 200, description = "Landing page", body = ApiResponse<HomePage>),
        (status = 303, description = "Not logged in, redirect to /login")
    )
)]
#[instrument(skip(current))]
pub async fn home(current: LoggedInUser) -> Json<ApiResponse<HomePage>> {
    let user = current.user;
    Json(ApiResponse::ok(
        HomePage {
            username: user.username,
            is_staff: user.is_staff,
        },
        "Welcome",
    ))
}
