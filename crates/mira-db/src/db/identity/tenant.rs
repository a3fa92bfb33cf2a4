use mira_core::models::Tenant;
use mira_core::AppError;
use sqlx::{PgConnection, PgPool, Postgres};
use uuid::Uuid;

#[derive(Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "companies", db.operation = "select"))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        sqlx::query_as::<Postgres, Tenant>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to get company");
                AppError::Database(e)
            })
    }

    #[tracing::instrument(skip(self), fields(db.table = "companies", db.operation = "select"))]
    pub async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>, AppError> {
        let mut conn = self.pool.acquire().await.map_err(AppError::Database)?;
        find_by_domain(&mut conn, domain).await
    }

    /// Look up by domain first, then by name; a tenant found by name
    /// without a domain gets the domain attached. Created when absent.
    #[tracing::instrument(skip(self), fields(db.table = "companies", db.operation = "upsert"))]
    pub async fn get_or_create(
        &self,
        name: &str,
        domain: Option<&str>,
    ) -> Result<Tenant, AppError> {
        let mut conn = self.pool.acquire().await.map_err(AppError::Database)?;
        get_or_create_in(&mut conn, name, domain).await
    }
}

pub(crate) async fn find_by_domain(
    conn: &mut PgConnection,
    domain: &str,
) -> Result<Option<Tenant>, AppError> {
    sqlx::query_as::<Postgres, Tenant>("SELECT * FROM companies WHERE domain = $1")
        .bind(domain)
        .fetch_optional(conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, domain = %domain, "Failed to get company by domain");
            AppError::Database(e)
        })
}

pub(crate) async fn get_or_create_in(
    conn: &mut PgConnection,
    name: &str,
    domain: Option<&str>,
) -> Result<Tenant, AppError> {
    if let Some(domain) = domain {
        if let Some(tenant) = find_by_domain(&mut *conn, domain).await? {
            return Ok(tenant);
        }
    }

    let by_name = sqlx::query_as::<Postgres, Tenant>(
        r#"
        SELECT * FROM companies
        WHERE name = $1
        ORDER BY created_at ASC
        LIMIT 1
        "#,
    )
    .bind(name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to get company by name");
        AppError::Database(e)
    })?;

    if let Some(tenant) = by_name {
        return match (tenant.domain.as_deref(), domain) {
            (None, Some(domain)) => attach_domain(conn, tenant.id, domain).await,
            _ => Ok(tenant),
        };
    }

    // A concurrent insert for the same domain wins; re-read it instead.
    let inserted = sqlx::query_as::<Postgres, Tenant>(
        r#"
        INSERT INTO companies (name, domain)
        VALUES ($1, $2)
        ON CONFLICT (domain) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(domain)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to create company");
        AppError::Database(e)
    })?;

    match inserted {
        Some(tenant) => {
            tracing::info!(tenant_id = %tenant.id, name = %name, "Company created");
            Ok(tenant)
        }
        None => {
            let domain = domain.unwrap_or_default();
            find_by_domain(conn, domain)
                .await?
                .ok_or_else(|| AppError::Internal(format!("Company for {} vanished", domain)))
        }
    }
}

async fn attach_domain(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    domain: &str,
) -> Result<Tenant, AppError> {
    let tenant = sqlx::query_as::<Postgres, Tenant>(
        r#"
        UPDATE companies SET domain = $2
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(tenant_id)
    .bind(domain)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, tenant_id = %tenant_id, "Failed to attach domain to company");
        AppError::Database(e)
    })?;

    tracing::info!(tenant_id = %tenant_id, domain = %domain, "Domain attached to company");
    Ok(tenant)
}
