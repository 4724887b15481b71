/// Membership transaction manager
///
/// The only writer of family/role state. A user belongs to at most one
/// family, so a membership is never updated in place: the old row is deleted
/// and the new one inserted inside a single transaction. All multi-step
/// writes run against one transactional handle and commit in one place;
/// dropping the transaction on an early return rolls everything back, which
/// is the only recovery mechanism. Every persistence failure surfaces as the
/// opaque `AppError::Membership` (generic 500 at the boundary, detail logged).

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{Family, Membership, Role};
use crate::error::AppError;

/// Creates a family row only; no user's membership state is touched.
pub async fn create_family(pool: &PgPool, name: &str) -> Result<Family, AppError> {
    tracing::info!(name = %name, "Creating new family");

    let mut tx = begin(pool).await?;
    let family = insert_family(&mut tx, name)
        .await
        .map_err(|e| membership_failure("create_family", e))?;
    commit(tx).await?;

    Ok(family)
}

/// Atomically creates a family and makes the user its CHEF, replacing any
/// existing membership. Either all three steps commit or none do; a failure
/// mid-sequence leaves the prior membership untouched.
pub async fn create_and_join(
    pool: &PgPool,
    name: &str,
    user_id: Uuid,
) -> Result<(Family, Membership), AppError> {
    tracing::info!(user_id = %user_id, name = %name, "User is creating its own family");

    let mut tx = begin(pool).await?;

    let result: Result<(Family, Membership), sqlx::Error> = async {
        let family = insert_family(&mut tx, name).await?;
        delete_membership(&mut tx, user_id).await?;
        let membership = insert_membership(&mut tx, user_id, family.id, Role::Chef).await?;
        Ok((family, membership))
    }
    .await;

    let (family, membership) = result.map_err(|e| membership_failure("create_and_join", e))?;
    commit(tx).await?;

    tracing::info!(user_id = %user_id, family_id = family.id, "User founded a family as CHEF");
    Ok((family, membership))
}

/// Atomically moves the user into the given family as MEMBER, replacing any
/// existing membership. Same all-or-nothing guarantee as `create_and_join`.
pub async fn join(pool: &PgPool, family_id: i64, user_id: Uuid) -> Result<Membership, AppError> {
    tracing::info!(user_id = %user_id, family_id = family_id, "User is joining a family");

    let mut tx = begin(pool).await?;

    let result: Result<Membership, sqlx::Error> = async {
        delete_membership(&mut tx, user_id).await?;
        insert_membership(&mut tx, user_id, family_id, Role::Member).await
    }
    .await;

    let membership = result.map_err(|e| membership_failure("join", e))?;
    commit(tx).await?;

    tracing::info!(user_id = %user_id, family_id = family_id, "User joined family");
    Ok(membership)
}

async fn begin(pool: &PgPool) -> Result<Transaction<'_, Postgres>, AppError> {
    pool.begin()
        .await
        .map_err(|e| membership_failure("begin", e))
}

async fn commit(tx: Transaction<'_, Postgres>) -> Result<(), AppError> {
    tx.commit()
        .await
        .map_err(|e| membership_failure("commit", e))
}

fn membership_failure(operation: &str, err: sqlx::Error) -> AppError {
    tracing::warn!(operation = operation, error = %err, "Membership transaction step failed");
    AppError::Membership(format!("{}: {}", operation, err))
}

async fn insert_family(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
) -> Result<Family, sqlx::Error> {
    let (id, created_at) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
        r#"
        INSERT INTO families (name, created_at)
        VALUES ($1, $2)
        RETURNING id, created_at
        "#,
    )
    .bind(name)
    .bind(Utc::now())
    .fetch_one(tx)
    .await?;

    Ok(Family {
        id,
        name: name.to_string(),
        created_at,
    })
}

async fn delete_membership(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM members WHERE user_id = $1")
        .bind(user_id)
        .execute(tx)
        .await?;

    Ok(())
}

async fn insert_membership(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    family_id: i64,
    role: Role,
) -> Result<Membership, sqlx::Error> {
    let (id, created_at) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
        r#"
        INSERT INTO members (user_id, family_id, role, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, created_at
        "#,
    )
    .bind(user_id)
    .bind(family_id)
    .bind(role.as_str())
    .bind(Utc::now())
    .fetch_one(tx)
    .await?;

    Ok(Membership {
        id,
        user_id,
        family_id,
        role,
        created_at,
    })
}
