use anyhow::Context as _;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, sea_query::OnConflict,
};
use uuid::Uuid;

use inkwell_site_schema::{passkeys, users};

use crate::domain::repository::{PasskeyRepository, UserRepository};
use crate::domain::types::{PasskeyRecord, SiteUser};
use crate::error::SiteError;

// ── User repository ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbUserRepository {
    pub db: DatabaseConnection,
}

impl UserRepository for DbUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<SiteUser>, SiteError> {
        let model = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await
            .context("find user by username")?;
        Ok(model.map(user_from_model))
    }

    async fn create(&self, user: &SiteUser) -> Result<SiteUser, SiteError> {
        users::Entity::insert(users::ActiveModel {
            id: Set(user.id),
            username: Set(user.username.clone()),
            created_at: Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::column(users::Column::Username)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await
        .context("insert user")?;

        // A concurrent registration may have won the insert; return whichever row exists.
        self.find_by_username(&user.username)
            .await?
            .ok_or_else(|| SiteError::Internal(anyhow::anyhow!("user vanished after insert")))
    }
}

fn user_from_model(m: users::Model) -> SiteUser {
    SiteUser {
        id: m.id,
        username: m.username,
    }
}

// ── Passkey repository ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DbPasskeyRepository {
    pub db: DatabaseConnection,
}

impl PasskeyRepository for DbPasskeyRepository {
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<PasskeyRecord>, SiteError> {
        let models = passkeys::Entity::find()
            .filter(passkeys::Column::UserId.eq(user_id))
            .order_by_asc(passkeys::Column::CreatedAt)
            .all(&self.db)
            .await
            .context("list passkeys")?;
        Ok(models.into_iter().map(passkey_from_model).collect())
    }

    async fn create(&self, record: &PasskeyRecord) -> Result<(), SiteError> {
        passkeys::ActiveModel {
            credential_id: Set(record.credential_id.clone()),
            user_id: Set(record.user_id),
            credential: Set(record.credential.clone()),
            created_at: Set(record.created_at),
        }
        .insert(&self.db)
        .await
        .context("insert passkey")?;
        Ok(())
    }

    async fn update_credential(
        &self,
        credential_id: &[u8],
        credential: &[u8],
    ) -> Result<(), SiteError> {
        passkeys::ActiveModel {
            credential_id: Set(credential_id.to_vec()),
            credential: Set(credential.to_vec()),
            ..Default::default()
        }
        .update(&self.db)
        .await
        .context("update passkey credential")?;
        Ok(())
    }
}

fn passkey_from_model(m: passkeys::Model) -> PasskeyRecord {
    PasskeyRecord {
        credential_id: m.credential_id,
        user_id: m.user_id,
        credential: m.credential,
        created_at: m.created_at,
    }
}
