use sqlx::PgConnection;
use uuid::Uuid;

use crate::auth::{
    repo_types::{Identity, User},
    roles::Role,
};

impl User {
    pub async fn find_by_email(conn: &mut PgConnection, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.password_hash, r.name AS role, u.is_active, u.created_at
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE u.email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(conn)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.password_hash, r.name AS role, u.is_active, u.created_at
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE u.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(user)
    }

    pub async fn email_taken(
        conn: &mut PgConnection,
        email: &str,
        except: Option<Uuid>,
    ) -> anyhow::Result<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except)
        .fetch_one(conn)
        .await?;
        Ok(taken)
    }

    /// Inserts a user with the given role and returns its id.
    pub async fn create(
        conn: &mut PgConnection,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> anyhow::Result<Uuid> {
        let id: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO users (email, password_hash, role_id)
            SELECT $1, $2, r.id FROM roles r WHERE r.name = $3
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(role.db_name())
        .fetch_optional(conn)
        .await?;
        id.ok_or_else(|| anyhow::anyhow!("{} role not found", role.db_name()))
    }

    pub async fn set_email(conn: &mut PgConnection, id: Uuid, email: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET email = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(email)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

impl Identity {
    pub async fn load(conn: &mut PgConnection, user_id: Uuid) -> anyhow::Result<Option<Identity>> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT u.id AS user_id, u.email, u.is_active, r.name AS role,
                   m.id AS member_id, t.id AS trainer_id
            FROM users u
            JOIN roles r ON r.id = u.role_id
            LEFT JOIN members m ON m.user_id = u.id
            LEFT JOIN trainers t ON t.user_id = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
        Ok(identity)
    }
}
