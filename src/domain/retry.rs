use crate::domain::error::DomainError;
use std::time::Duration;

/// 在庫トランザクションの再試行ポリシー
/// 競合で中断されたトランザクションを指数バックオフで再実行する
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(10);
    pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(500);

    /// 新しい再試行ポリシーを作成
    ///
    /// # Arguments
    /// * `max_attempts` - 初回を含む最大試行回数（1以上）
    /// * `base_backoff` - 1回目の再試行前の待機時間
    /// * `max_backoff` - 待機時間の上限
    pub fn new(
        max_attempts: u32,
        base_backoff: Duration,
        max_backoff: Duration,
    ) -> Result<Self, DomainError> {
        if max_attempts == 0 {
            return Err(DomainError::InvalidValue(
                "最大試行回数は1以上である必要があります".to_string(),
            ));
        }
        if base_backoff > max_backoff {
            return Err(DomainError::InvalidValue(
                "バックオフの初期値が上限を超えています".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            base_backoff,
            max_backoff,
        })
    }

    /// 待機なしで再試行するポリシー
    pub fn immediate(max_attempts: u32) -> Result<Self, DomainError> {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `attempt` 回目の試行が競合した後の待機時間
    /// base × 2^(attempt-1) を上限で切り詰める
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_backoff: Self::DEFAULT_BASE_BACKOFF,
            max_backoff: Self::DEFAULT_MAX_BACKOFF,
        }
    }
}
