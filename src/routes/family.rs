/// Family routes
///
/// Creating, founding and joining families. All routes require a valid
/// access token; the membership transaction manager does the writes.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::auth::AuthenticatedUser;
use crate::domain::{Family, Membership};
use crate::error::AppError;
use crate::membership;
use crate::validators::is_valid_family_name;

#[derive(Deserialize)]
pub struct CreateFamilyRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct JoinFamilyRequest {
    pub family_id: i64,
}

#[derive(Serialize)]
pub struct CreateJoinResponse {
    pub family: Family,
    pub member: Membership,
}

/// POST /family/create
///
/// Creates a family row only; the caller's membership is untouched.
pub async fn create(
    form: web::Json<CreateFamilyRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let name = is_valid_family_name(&form.name)?;
    let family = membership::create_family(pool.get_ref(), &name).await?;

    Ok(HttpResponse::Created().json(family))
}

/// POST /family/create-join
///
/// Atomically creates a family and makes the caller its CHEF, replacing any
/// previous membership. All-or-nothing: on failure the caller keeps their
/// prior membership.
pub async fn create_join(
    form: web::Json<CreateFamilyRequest>,
    identity: web::ReqData<AuthenticatedUser>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let name = is_valid_family_name(&form.name)?;
    let (family, member) =
        membership::create_and_join(pool.get_ref(), &name, identity.id).await?;

    Ok(HttpResponse::Created().json(CreateJoinResponse { family, member }))
}

/// POST /family/join
///
/// Atomically moves the caller into the given family as MEMBER. The caller's
/// role/family change becomes visible in access tokens on the next refresh.
pub async fn join(
    form: web::Json<JoinFamilyRequest>,
    identity: web::ReqData<AuthenticatedUser>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let member = membership::join(pool.get_ref(), form.family_id, identity.id).await?;

    Ok(HttpResponse::Created().json(member))
}
