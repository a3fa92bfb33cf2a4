use mira_core::models::{normalize_email, Principal, Role};
use mira_core::AppError;
use sqlx::{PgConnection, PgPool, Postgres};
use uuid::Uuid;

use super::tenant;
use crate::db::transaction::with_transaction;

#[derive(Clone)]
pub struct PrincipalRepository {
    pool: PgPool,
}

impl PrincipalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Principal>, AppError> {
        sqlx::query_as::<Postgres, Principal>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, user_id = %id, "Failed to get user");
                AppError::Database(e)
            })
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AppError> {
        let mut conn = self.pool.acquire().await.map_err(AppError::Database)?;
        find_by_email(&mut conn, &normalize_email(email)).await
    }

    /// Return the principal for `email`, creating it (and its tenant) when
    /// absent. The tenant row is locked while members are counted, so two
    /// concurrent first signups cannot both become admin.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "upsert"))]
    pub async fn get_or_create(
        &self,
        email: &str,
        company_name: &str,
        domain: Option<&str>,
    ) -> Result<Principal, AppError> {
        let email = normalize_email(email);
        let company_name = company_name.to_string();
        let domain = domain.map(str::to_string);

        with_transaction(&self.pool, move |conn| {
            Box::pin(async move {
                if let Some(existing) = find_by_email(&mut *conn, &email).await? {
                    return Ok(existing);
                }

                let tenant =
                    tenant::get_or_create_in(&mut *conn, &company_name, domain.as_deref()).await?;

                sqlx::query("SELECT id FROM companies WHERE id = $1 FOR UPDATE")
                    .bind(tenant.id)
                    .execute(&mut *conn)
                    .await
                    .map_err(AppError::Database)?;

                let members: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE company_id = $1")
                        .bind(tenant.id)
                        .fetch_one(&mut *conn)
                        .await
                        .map_err(AppError::Database)?;

                let role = Role::for_new_member(members);

                let inserted = sqlx::query_as::<Postgres, Principal>(
                    r#"
                    INSERT INTO users (email, company_id, role)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (email) DO NOTHING
                    RETURNING *
                    "#,
                )
                .bind(&email)
                .bind(tenant.id)
                .bind(role.as_str())
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to create user");
                    AppError::Database(e)
                })?;

                match inserted {
                    Some(principal) => {
                        tracing::info!(
                            user_id = %principal.id,
                            tenant_id = %tenant.id,
                            role = %role,
                            "User created"
                        );
                        Ok(principal)
                    }
                    None => find_by_email(conn, &email).await?.ok_or_else(|| {
                        AppError::Internal("User vanished after concurrent insert".to_string())
                    }),
                }
            })
        })
        .await
    }

    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "select"))]
    pub async fn list_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<Principal>, AppError> {
        sqlx::query_as::<Postgres, Principal>(
            r#"
            SELECT * FROM users
            WHERE company_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, tenant_id = %tenant_id, "Failed to list users");
            AppError::Database(e)
        })
    }

    /// Change a principal's role. Authorization is the caller's concern.
    #[tracing::instrument(skip(self), fields(db.table = "users", db.operation = "update"))]
    pub async fn set_role(&self, id: Uuid, role: Role) -> Result<Principal, AppError> {
        let principal = sqlx::query_as::<Postgres, Principal>(
            r#"
            UPDATE users SET role = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %id, "Failed to set user role");
            AppError::Database(e)
        })?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        tracing::info!(user_id = %id, role = %role, "User role updated");
        Ok(principal)
    }
}

pub(crate) async fn find_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> Result<Option<Principal>, AppError> {
    sqlx::query_as::<Postgres, Principal>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to get user by email");
            AppError::Database(e)
        })
}
