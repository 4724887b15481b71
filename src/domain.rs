/// Domain model
///
/// Users, families and memberships as loaded aggregates. A user's role and
/// family are derived from the optional membership row exactly once, at load
/// time, and stored as plain fields on `UserView` - never recomputed lazily.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;

/// Family role carried by a membership.
///
/// CHEF is the founder/owner of a family, MEMBER a joined participant.
/// There is no hierarchy between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Chef,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Chef => "CHEF",
            Role::Member => "MEMBER",
        }
    }

    /// Parses a role column value. Anything but the two known labels is a
    /// data corruption, surfaced as an internal error.
    pub fn parse(value: &str) -> Result<Role, AppError> {
        match value {
            "CHEF" => Ok(Role::Chef),
            "MEMBER" => Ok(Role::Member),
            other => Err(AppError::Internal(format!("Unknown role in storage: {}", other))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Family {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The exclusive link between a user and a family.
/// A user has at most one membership row at any time.
#[derive(Debug, Clone, Serialize)]
pub struct Membership {
    pub id: i64,
    pub user_id: Uuid,
    pub family_id: i64,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// User aggregate as exposed to the rest of the application: the user row
/// joined with its optional membership, without the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub role: Option<Role>,
    pub family_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl UserView {
    /// Loads a user and its membership by id. `None` when the user is gone.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserView>, AppError> {
        let row = sqlx::query_as::<
            _,
            (Uuid, String, String, DateTime<Utc>, Option<i64>, Option<String>),
        >(
            r#"
            SELECT u.id, u.email, u.username, u.created_at, m.family_id, m.role
            FROM users u
            LEFT JOIN members m ON m.user_id = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.map(UserView::from_row).transpose()
    }

    pub async fn find_all(pool: &PgPool) -> Result<Vec<UserView>, AppError> {
        let rows = sqlx::query_as::<
            _,
            (Uuid, String, String, DateTime<Utc>, Option<i64>, Option<String>),
        >(
            r#"
            SELECT u.id, u.email, u.username, u.created_at, m.family_id, m.role
            FROM users u
            LEFT JOIN members m ON m.user_id = u.id
            ORDER BY u.created_at
            "#,
        )
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(UserView::from_row).collect()
    }

    fn from_row(
        row: (Uuid, String, String, DateTime<Utc>, Option<i64>, Option<String>),
    ) -> Result<UserView, AppError> {
        let (id, email, username, created_at, family_id, role) = row;
        let role = role.as_deref().map(Role::parse).transpose()?;

        Ok(UserView {
            id,
            email,
            username,
            role,
            family_id,
            created_at,
        })
    }

    pub fn has_family(&self) -> bool {
        self.role.is_some() && self.family_id.is_some()
    }
}

/// User aggregate plus the stored password hash, loaded only for credential
/// verification. The hash never leaves this struct.
pub struct UserWithSecret {
    pub user: UserView,
    pub password_hash: String,
}

impl UserWithSecret {
    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Option<UserWithSecret>, AppError> {
        let row = sqlx::query_as::<
            _,
            (Uuid, String, String, String, DateTime<Utc>, Option<i64>, Option<String>),
        >(
            r#"
            SELECT u.id, u.email, u.username, u.password_hash, u.created_at, m.family_id, m.role
            FROM users u
            LEFT JOIN members m ON m.user_id = u.id
            WHERE u.email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        row.map(|(id, email, username, password_hash, created_at, family_id, role)| {
            let role = role.as_deref().map(Role::parse).transpose()?;
            Ok(UserWithSecret {
                user: UserView {
                    id,
                    email,
                    username,
                    role,
                    family_id,
                    created_at,
                },
                password_hash,
            })
        })
        .transpose()
    }
}
