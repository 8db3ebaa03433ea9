use sqlx::Row;

use procura_core::domain::notification::{Notification, NotificationId, NotificationKind};
use procura_core::domain::user::UserId;

use super::{parse_datetime, NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_notification(row: &sqlx::sqlite::SqliteRow) -> Result<Notification, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let kind_str: String =
        row.try_get("kind").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let body: String = row.try_get("body").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let entity_type: String =
        row.try_get("entity_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let entity_id: String =
        row.try_get("entity_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let read: bool = row.try_get("read").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let kind = NotificationKind::parse(&kind_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown notification kind `{kind_str}`"))
    })?;

    Ok(Notification {
        id: NotificationId(id),
        user_id: UserId(user_id),
        kind,
        title,
        body,
        entity_type,
        entity_id,
        read,
        created_at: parse_datetime(&created_at_str),
    })
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, user_id, kind, title, body, entity_type, entity_id, read, created_at
             FROM notifications WHERE user_id = ?
             ORDER BY created_at DESC, id ASC",
        )
        .bind(&user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_notification).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, notification: Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, title, body, entity_type, entity_id,
                                        read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET read = excluded.read",
        )
        .bind(&notification.id.0)
        .bind(&notification.user_id.0)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.entity_type)
        .bind(&notification.entity_id)
        .bind(notification.read)
        .bind(notification.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
