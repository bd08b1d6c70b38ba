use crate::application::ApplicationError;
use crate::domain::model::{Role, User, UserId};
use crate::domain::port::UserRepository;
use std::sync::Arc;

/// ユーザーサービス
/// 役割は在庫エンジンからは参照されない属性として扱う
pub struct UserService {
    user_repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self { user_repository }
    }

    /// ユーザーを登録する（初回ログイン時）
    /// 既に存在する場合はメールアドレスと表示名を更新し、役割は維持する
    pub async fn register_user(
        &self,
        user_id: UserId,
        email: String,
        display_name: Option<String>,
    ) -> Result<User, ApplicationError> {
        let role = self
            .user_repository
            .find_by_id(&user_id)
            .await?
            .map_or(Role::Customer, |existing| existing.role);

        let user = User {
            id: user_id,
            email,
            display_name,
            role,
        };
        self.user_repository.save(&user).await?;
        Ok(user)
    }

    /// すべてのユーザーをメールアドレス順で取得
    pub async fn get_users(&self) -> Result<Vec<User>, ApplicationError> {
        self.user_repository
            .find_all()
            .await
            .map_err(ApplicationError::from)
    }

    /// 役割を変更する
    ///
    /// # Returns
    /// * `Ok(())` - 変更成功
    /// * `Err(ApplicationError::NotFound)` - ユーザーが存在しない
    pub async fn set_user_role(&self, user_id: &UserId, role: Role) -> Result<(), ApplicationError> {
        if self.user_repository.update_role(user_id, role).await? {
            Ok(())
        } else {
            Err(ApplicationError::NotFound(format!(
                "ユーザーが見つかりません: {}",
                user_id
            )))
        }
    }
}
