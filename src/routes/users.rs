/// User routes
///
/// Listing and deletion over the user aggregate. Deletion is restricted to
/// CHEF via the role guard; the guard check is authorization on top of the
/// middleware's authentication.

use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{require_role, AuthenticatedUser};
use crate::domain::{Role, UserView};
use crate::error::{AppError, DatabaseError};

/// GET /users
pub async fn list_users(pool: web::Data<PgPool>) -> Result<HttpResponse, AppError> {
    let users = UserView::find_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(users))
}

/// GET /users/{id}
pub async fn get_user(
    path: web::Path<Uuid>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user = UserView::find_by_id(pool.get_ref(), path.into_inner())
        .await?
        .ok_or_else(|| AppError::Database(DatabaseError::NotFound("User not found".to_string())))?;

    Ok(HttpResponse::Ok().json(user))
}

/// DELETE /users/{id}
///
/// CHEF only. Deleting a user cascades to their membership row.
pub async fn delete_user(
    path: web::Path<Uuid>,
    identity: web::ReqData<AuthenticatedUser>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    require_role(&[Role::Chef], Some(&*identity))?;

    let user_id = path.into_inner();
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool.get_ref())
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Database(DatabaseError::NotFound(
            "User not found".to_string(),
        )));
    }

    tracing::info!(user_id = %user_id, deleted_by = %identity.id, "User deleted");
    Ok(HttpResponse::NoContent().finish())
}
