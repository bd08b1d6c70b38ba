use crate::domain::error::DomainError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// 商品の一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProductId(Uuid);

impl ProductId {
    /// 新しい一意のProductIdを生成
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// UUIDから ProductId を作成
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// 文字列からProductIdを作成
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }

    /// 内部のUUIDを取得
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

/// 注文の一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    /// 新しい一意のOrderIdを生成
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// UUIDから OrderId を作成
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// 文字列からOrderIdを作成
    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        let uuid = Uuid::parse_str(s)?;
        Ok(Self(uuid))
    }

    /// 内部のUUIDを取得
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

/// ユーザーの識別子
/// 認証基盤が払い出す不透明な文字列をそのまま保持する
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// 文字列からUserIdを作成
    /// 前後の空白を除いて空の場合はエラー
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidValue(
                "ユーザーIDは空にできません".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// 空文字列や未指定をNoneとして扱う変換
    pub fn parse_optional(value: Option<&str>) -> Option<Self> {
        value.and_then(|v| Self::new(v).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 単価として受け付ける小数点以下の桁数（`DECIMAL(12, 2)` に合わせる）
pub const MONEY_SCALE: u32 = 2;

/// 単価として受け付ける上限（`DECIMAL(12, 2)` の最大値）
pub const MONEY_MAX: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, MONEY_SCALE);

/// 金額を表す値オブジェクト
/// 単一通貨の10進数で、負の値は持たない
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// 10進数から作成
    /// 0以上 `MONEY_MAX` 以下、小数点以下 `MONEY_SCALE` 桁までを受け付ける
    pub fn new(amount: Decimal) -> Result<Self, DomainError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::InvalidValue(format!(
                "金額は0以上である必要があります: {}",
                amount
            )));
        }
        if amount > MONEY_MAX {
            return Err(DomainError::InvalidValue(format!(
                "金額は{}以下である必要があります: {}",
                MONEY_MAX, amount
            )));
        }
        if amount.normalize().scale() > MONEY_SCALE {
            return Err(DomainError::InvalidValue(format!(
                "金額は小数点以下{}桁までです: {}",
                MONEY_SCALE, amount
            )));
        }
        Ok(Self(amount))
    }

    /// 0円
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// 金額を取得
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// 金額を加算
    /// 合計は単価の上限を超えてもよいが、10進数の範囲を超えるとエラー
    pub fn add(&self, other: &Money) -> Result<Money, DomainError> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| overflow(self, "+", other))
    }

    /// 金額を乗算
    pub fn multiply(&self, factor: u32) -> Result<Money, DomainError> {
        self.0
            .checked_mul(Decimal::from(factor))
            .map(Money)
            .ok_or_else(|| overflow(self, "×", factor))
    }
}

fn overflow(lhs: &Money, op: &str, rhs: impl fmt::Display) -> DomainError {
    DomainError::InvalidValue(format!("金額の計算が桁あふれしました: {} {} {}", lhs, op, rhs))
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
