/// Food routes
///
/// Paginated listing of the food catalog shared by the caller's family.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::AuthenticatedUser;
use crate::domain::UserView;
use crate::error::{AppError, AuthError};

const DEFAULT_PAGE_SIZE: i64 = 15;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize)]
pub struct FoodListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Serialize)]
pub struct FoodItem {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Serialize)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

#[derive(Serialize)]
pub struct FoodListResponse {
    pub data: Vec<FoodItem>,
    pub pagination: Pagination,
}

/// GET /food?page=1&page_size=15
///
/// Lists the caller's family food catalog, paginated. The family is looked
/// up fresh from the caller's membership, not taken from the token, so a
/// recent family switch is reflected immediately.
///
/// # Errors
/// - 401: caller has no family
pub async fn list_food(
    query: web::Query<FoodListQuery>,
    identity: web::ReqData<AuthenticatedUser>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let user = UserView::find_by_id(pool.get_ref(), identity.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    let family_id = match user.family_id {
        Some(family_id) => family_id,
        None => {
            tracing::info!(user_id = %user.id, "Food listing without a family");
            return Err(AuthError::NoFamily.into());
        }
    };

    let rows = sqlx::query_as::<_, (i64, String, Option<String>, Option<String>)>(
        r#"
        SELECT id, name, description, category
        FROM foods
        WHERE family_id = $1
        ORDER BY name
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(family_id)
    .bind(page_size)
    .bind(page.saturating_sub(1).saturating_mul(page_size))
    .fetch_all(pool.get_ref())
    .await?;

    let total_count =
        sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM foods WHERE family_id = $1")
            .bind(family_id)
            .fetch_one(pool.get_ref())
            .await?
            .0;

    let data = rows
        .into_iter()
        .map(|(id, name, description, category)| FoodItem {
            id,
            name,
            description,
            category,
        })
        .collect();

    Ok(HttpResponse::Ok().json(FoodListResponse {
        data,
        pagination: Pagination {
            page,
            page_size,
            total_count,
            total_pages: (total_count + page_size - 1) / page_size,
        },
    }))
}
