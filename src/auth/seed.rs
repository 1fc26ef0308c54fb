use uuid::Uuid;

use crate::auth::hash_password;
use crate::db::Db;

/// Seeds the platform admin account. The admin authenticates through the
/// same session mechanism as everyone else; there is no separate credential
/// gate. Safe to call on every startup - existence is checked first.
pub async fn seed_accounts(pool: &Db) -> anyhow::Result<()> {
    seed_admin(pool).await?;

    Ok(())
}

async fn seed_admin(pool: &Db) -> anyhow::Result<()> {
    const ADMIN_EMAIL: &str = "superadmin@canchajujuy.com";
    const ADMIN_PASSWORD: &str = "SuperAdmin2024!";

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin' AND deleted_at IS NULL)",
    )
    .fetch_one(pool)
    .await?;

    if exists {
        return Ok(());
    }

    let hash = hash_password(ADMIN_PASSWORD)?;
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO users (id, email, full_name, password_hash, role, is_verified, is_active)
         VALUES (?, ?, 'Super Admin', ?, 'admin', 1, 1)",
    )
    .bind(id)
    .bind(ADMIN_EMAIL)
    .bind(hash)
    .execute(pool)
    .await?;
    tracing::info!(email = ADMIN_EMAIL, "Seeded platform admin account");

    Ok(())
}
