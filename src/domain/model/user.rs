use crate::domain::error::DomainError;
use crate::domain::model::UserId;
use serde::{Deserialize, Serialize};

use std::fmt;

/// ユーザーの役割
/// 認可は呼び出し側の責務で、在庫エンジンは参照しない
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Customer => "customer",
        }
    }

    /// 文字列からRoleを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "customer" => Ok(Role::Customer),
            _ => Err(DomainError::InvalidValue(format!("無効な役割: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ユーザー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
}
