use crate::domain::port::RepositoryError;
use sqlx::mysql::MySqlDatabaseError;

/// MySQLがシリアライズ失敗・デッドロックで返すSQLSTATE
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

/// InnoDBのロック待ちタイムアウト（SQLSTATEはHY000なのでエラー番号で判定する）
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;

/// データベースエラー型
/// データベース操作で発生するエラーを表現する
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatabaseError {
    /// データベース接続エラー
    #[error("Database connection error: {0}")]
    ConnectionError(String),
    /// SQLクエリエラー
    #[error("Database query error: {0}")]
    QueryError(String),
    /// デッドロックやバージョン不一致（再試行で解消しうる）
    #[error("Database write conflict: {0}")]
    WriteConflict(String),
    /// マイグレーションエラー
    #[error("Migration error: {0}")]
    MigrationError(String),
}

impl DatabaseError {
    /// sqlxのエラーを分類する
    /// デッドロック・シリアライズ失敗・ロック待ちタイムアウトは再試行可能な競合として扱う
    pub fn from_sqlx(context: &str, err: sqlx::Error) -> Self {
        let is_conflict = err.as_database_error().is_some_and(|db| {
            let number = db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(MySqlDatabaseError::number);
            is_retryable(db.code().as_deref(), number)
        });

        if is_conflict {
            DatabaseError::WriteConflict(format!("{}: {}", context, err))
        } else {
            DatabaseError::QueryError(format!("{}: {}", context, err))
        }
    }
}

/// SQLSTATEとMySQLのエラー番号から再試行可能かを判定する
fn is_retryable(sqlstate: Option<&str>, number: Option<u16>) -> bool {
    sqlstate == Some(SQLSTATE_SERIALIZATION_FAILURE) || number == Some(ER_LOCK_WAIT_TIMEOUT)
}

/// DatabaseErrorからRepositoryErrorへの変換
impl From<DatabaseError> for RepositoryError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConnectionError(msg) => RepositoryError::ConnectionFailed(msg),
            DatabaseError::QueryError(msg) => RepositoryError::OperationFailed(msg),
            DatabaseError::WriteConflict(msg) => RepositoryError::Conflict(msg),
            DatabaseError::MigrationError(msg) => RepositoryError::OperationFailed(msg),
        }
    }
}
