use crate::handlers::internal_error;
use crate::schemas::{
    AdminDashboard, AdminUserRow, ApiResponse, AppState, ErrorResponse, FlashLevel, UploadRow,
};
use crate::session::{self, StaffUser};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Json, Redirect},
};
use model::entities::{upload_record, user};
use sea_orm::{EntityTrait, QueryOrder};
use tracing::{debug, info, instrument, trace, warn};

type HandlerError = (StatusCode, Json<ErrorResponse>);

const DASHBOARD_PATH: &str = "/custom_admin";

/// Admin dashboard: all users and all uploads, newest first
///
/// Drains the pending flash messages of the current session.
#[utoipa::path(
    get,
    path = "/custom_admin",
    tag = "admin",
    responses(
        (status = 200, description = "Dashboard", body = ApiResponse<AdminDashboard>),
        (status = 303, description = "Not logged in, redirect to /login"),
        (status = 403, description = "Not a staff user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, staff), fields(staff = %staff.user.username))]
pub async fn dashboard(
    State(state): State<AppState>,
    staff: StaffUser,
) -> Result<Json<ApiResponse<AdminDashboard>>, HandlerError> {
    trace!("Entering dashboard function");

    let users: Vec<AdminUserRow> = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(&state.db)
        .await
        .map_err(|e| internal_error("Listing users", "DATABASE_ERROR", e))?
        .into_iter()
        .map(AdminUserRow::from)
        .collect();

    let uploads: Vec<UploadRow> = upload_record::Entity::find()
        .find_also_related(user::Entity)
        .order_by_desc(upload_record::Column::CreatedAt)
        .order_by_desc(upload_record::Column::Id)
        .all(&state.db)
        .await
        .map_err(|e| internal_error("Listing uploads", "DATABASE_ERROR", e))?
        .into_iter()
        .map(|(record, owner)| UploadRow {
            id: record.id,
            username: owner.map(|u| u.username),
            image: state.storage.url(&record.image),
            predicted_class: record.predicted_class.label().to_string(),
            created_at: record.created_at,
        })
        .collect();

    let messages = session::take_flash(&state.db, &staff.session_id)
        .await
        .map_err(|e| internal_error("Reading messages", "DATABASE_ERROR", e))?;
    debug!(
        "Dashboard with {} users, {} uploads, {} messages",
        users.len(),
        uploads.len(),
        messages.len()
    );

    Ok(Json(ApiResponse::ok(
        AdminDashboard {
            users,
            uploads,
            messages,
        },
        "Admin dashboard",
    )))
}

/// Delete a user together with their uploads and sessions
///
/// The outcome is reported as a flash message on the dashboard. Superusers
/// are never deleted.
#[utoipa::path(
    post,
    path = "/delete-user/{user_id}",
    tag = "admin",
    params(
        ("user_id" = i32, Path, description = "ID of the user to delete")
    ),
    responses(
        (status = 303, description = "Redirect to /custom_admin"),
        (status = 403, description = "Not a staff user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, staff), fields(staff = %staff.user.username))]
pub async fn delete_user(
    State(state): State<AppState>,
    staff: StaffUser,
    Path(user_id): Path<i32>,
) -> Result<Redirect, HandlerError> {
    trace!("Entering delete_user function for ID: {}", user_id);

    let target = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await
        .map_err(|e| internal_error("Looking up user", "DATABASE_ERROR", e))?;

    let (level, text) = match target {
        None => {
            warn!("User with ID {} does not exist", user_id);
            (FlashLevel::Error, "User does not exist.")
        }
        Some(target) if target.is_superuser => {
            warn!("Refusing to delete superuser '{}'", target.username);
            (FlashLevel::Error, "Cannot delete superuser.")
        }
        Some(target) => {
            user::Entity::delete_by_id(target.id)
                .exec(&state.db)
                .await
                .map_err(|e| internal_error("Deleting user", "DATABASE_ERROR", e))?;
            info!("User '{}' (ID {}) deleted", target.username, target.id);
            (FlashLevel::Success, "User deleted successfully.")
        }
    };

    session::push_flash(&state.db, &staff.session_id, level, text)
        .await
        .map_err(|e| internal_error("Storing message", "DATABASE_ERROR", e))?;
    Ok(Redirect::to(DASHBOARD_PATH))
}
