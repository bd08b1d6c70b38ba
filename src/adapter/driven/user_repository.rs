use crate::adapter::database_error::DatabaseError;
use crate::adapter::driven::mysql_rows::user_from_row;
use crate::domain::model::{Role, User, UserId};
use crate::domain::port::{RepositoryError, UserRepository};
use async_trait::async_trait;
use sqlx::{MySql, Pool};

/// MySQLユーザーリポジトリ
pub struct MySqlUserRepository {
    pool: Pool<MySql>,
}

impl MySqlUserRepository {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for MySqlUserRepository {
    async fn save(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, role)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                email = VALUES(email),
                display_name = VALUES(display_name),
                role = VALUES(role)
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("ユーザーの保存に失敗しました", e))?;
        Ok(())
    }

    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, email, display_name, role FROM users WHERE id = ?")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("ユーザーの取得に失敗しました", e))?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_all(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query("SELECT id, email, display_name, role FROM users ORDER BY email")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("ユーザー一覧の取得に失敗しました", e))?;

        rows.iter().map(user_from_row).collect()
    }

    async fn update_role(&self, user_id: &UserId, role: Role) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("役割の更新に失敗しました", e))?;

        // MySQLは値が変わらない行をrows_affectedに数えないため、存在確認を別に行う
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        Ok(self.find_by_id(user_id).await?.is_some())
    }
}
