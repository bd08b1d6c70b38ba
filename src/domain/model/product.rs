use crate::domain::error::DomainError;
use crate::domain::model::{Money, ProductId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 在庫僅少とみなす利用可能在庫の割合（基準数量に対して）
pub const LOW_STOCK_RATIO: f64 = 0.2;

/// 手動数量調整の方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustDirection {
    /// 入庫（数量を増やす）
    Increase,
    /// 手動訂正（数量を減らす）
    Decrease,
}

/// 商品のメタデータ
/// 数量・予約数とは独立して更新される
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub name: String,
    pub description: String,
    /// 最新の仕入単価。未設定の場合はNone
    pub cost_price: Option<Money>,
    pub image_ref: Option<String>,
    pub purchase_location: String,
    /// 仕入日。初回入庫の台帳日付に使う
    pub purchase_date: DateTime<Utc>,
}

impl ProductDetails {
    /// 必須項目のバリデーション
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidValue(
                "商品名は空にできません".to_string(),
            ));
        }
        Ok(())
    }
}

/// 商品在庫レコード
///
/// `quantity` は手元にある実在庫、`reserved` は出荷待ちの注文に確保済みの数量。
/// 常に `0 <= reserved <= quantity` を満たし、利用可能数は `quantity - reserved`。
/// 数量を変更する操作はすべて在庫エンジンのトランザクション経由で行う。
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    id: ProductId,
    details: ProductDetails,
    quantity: u32,
    reserved: u32,
    initial_quantity: u32,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Product {
    /// 新しい商品を登録する
    /// 予約数は0、基準数量は登録時の数量
    pub fn register(
        id: ProductId,
        details: ProductDetails,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        details.validate()?;
        Ok(Self {
            id,
            details,
            quantity,
            reserved: 0,
            initial_quantity: quantity,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// 永続化されたデータから商品を再構築
    /// リポジトリでの使用を想定
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        id: ProductId,
        details: ProductDetails,
        quantity: u32,
        reserved: u32,
        initial_quantity: u32,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if reserved > quantity {
            return Err(DomainError::InvalidValue(format!(
                "予約数が在庫数を超えています: product={}, quantity={}, reserved={}",
                id, quantity, reserved
            )));
        }
        Ok(Self {
            id,
            details,
            quantity,
            reserved,
            initial_quantity,
            version,
            created_at,
            updated_at,
        })
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn details(&self) -> &ProductDetails {
        &self.details
    }

    pub fn name(&self) -> &str {
        &self.details.name
    }

    pub fn cost_price(&self) -> Option<Money> {
        self.details.cost_price
    }

    /// 手元の在庫数
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// 出荷待ち注文に確保済みの数量
    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    /// 在庫僅少判定の基準数量
    pub fn initial_quantity(&self) -> u32 {
        self.initial_quantity
    }

    /// 楽観的ロック用のバージョン
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 新規の予約・引当に使える数量
    pub fn available(&self) -> u32 {
        self.quantity - self.reserved
    }

    /// 在庫僅少かどうか
    /// 基準数量が0の商品は対象外
    pub fn is_low_stock(&self) -> bool {
        if self.initial_quantity == 0 {
            return false;
        }
        (self.available() as f64) / (self.initial_quantity as f64) < LOW_STOCK_RATIO
    }

    /// 指定数量が利用可能在庫の範囲内か確認する
    pub fn ensure_available(&self, requested: u32) -> Result<(), DomainError> {
        if requested == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        if self.available() < requested {
            return Err(DomainError::InsufficientStock {
                product_id: self.id,
                requested,
                available: self.available(),
            });
        }
        Ok(())
    }

    /// 入庫する
    pub fn restock(&mut self, delta: u32, now: DateTime<Utc>) -> Result<(), DomainError> {
        if delta == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        self.quantity = self.quantity.checked_add(delta).ok_or_else(|| {
            DomainError::InvalidValue(format!("在庫数が上限を超えます: {}", self.id))
        })?;
        self.updated_at = now;
        Ok(())
    }

    /// 手動で在庫を減らす（棚卸し訂正など）
    ///
    /// 在庫数は0で下げ止まる。予約済みの数量は減らせないため、
    /// 減算後の在庫数が予約数を下回る場合は在庫不足として失敗する。
    ///
    /// # Returns
    /// * 実際に減らした数量
    pub fn adjust_down(&mut self, delta: u32, now: DateTime<Utc>) -> Result<u32, DomainError> {
        if delta == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        let removed = delta.min(self.quantity);
        if self.quantity - removed < self.reserved {
            return Err(DomainError::InsufficientStock {
                product_id: self.id,
                requested: delta,
                available: self.available(),
            });
        }
        self.quantity -= removed;
        self.updated_at = now;
        Ok(removed)
    }

    /// 出荷注文のために在庫を予約する
    /// 在庫数は変わらず、利用可能数だけが減る
    pub fn reserve(&mut self, quantity: u32, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_available(quantity)?;
        self.reserved += quantity;
        self.updated_at = now;
        Ok(())
    }

    /// 店頭受け取りのために在庫を即時に払い出す
    pub fn withdraw(&mut self, quantity: u32, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.ensure_available(quantity)?;
        self.quantity -= quantity;
        self.updated_at = now;
        Ok(())
    }

    /// 出荷完了時に予約を確定的な在庫減に変換する
    ///
    /// 予約数・在庫数はいずれも0で下げ止まる。
    ///
    /// # Returns
    /// * 実際に減った在庫数
    pub fn fulfill_reservation(&mut self, quantity: u32, now: DateTime<Utc>) -> u32 {
        let removed = quantity.min(self.quantity);
        self.reserved = self.reserved.saturating_sub(quantity);
        self.quantity -= removed;
        // 予約と実在庫がずれていた場合でも不変条件を保つ
        self.reserved = self.reserved.min(self.quantity);
        self.updated_at = now;
        removed
    }

    /// メタデータを更新する
    /// 数量・予約数・基準数量には触れない
    pub fn update_details(
        &mut self,
        details: ProductDetails,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        details.validate()?;
        self.details = details;
        self.updated_at = now;
        Ok(())
    }

    /// コミット後のバージョンを反映したコピーを返す
    pub(crate) fn committed(mut self) -> Self {
        self.version += 1;
        self
    }
}
