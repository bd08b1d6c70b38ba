// ドメインモデル（エンティティと値オブジェクト）

mod value_objects;
mod product;
mod ledger;
mod order;
mod user;

pub use value_objects::{Money, OrderId, ProductId, UserId, MONEY_MAX, MONEY_SCALE};

pub use product::{AdjustDirection, Product, ProductDetails, LOW_STOCK_RATIO};
pub use ledger::{EntryType, LedgerEntry, LedgerSummary, MovementSource, ProductLedger};
pub use order::{
    CreatedSource, DeliveryMethod, Order, OrderContact, OrderDraft, OrderItem, OrderLineRequest,
    OrderParts, ShippingStatus, ShippingTransition, ShippingUpdate,
};
pub use user::{Role, User};
