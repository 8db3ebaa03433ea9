use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "users",
        "approval_rules",
        "requisitions",
        "approval_steps",
        "quotes",
        "quote_comparisons",
        "purchase_orders",
        "negotiations",
        "notifications",
        "idx_purchase_orders_quote_id",
        "idx_approval_rules_active_level",
        "idx_requisitions_requester_id",
        "idx_requisitions_status",
        "idx_approval_steps_requisition_id",
        "idx_approval_steps_approver_status",
        "idx_quotes_requisition_id",
        "idx_quote_comparisons_requisition_id",
        "idx_negotiations_quote_id",
        "idx_notifications_user_id",
    ];

    #[tokio::test]
    async fn migrations_create_all_managed_objects() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master
                 WHERE type IN ('table', 'index') AND name = ?",
            )
            .bind(object)
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|_| panic!("check object {object}"))
            .get::<i64, _>("count");

            assert_eq!(count, 1, "missing schema object `{object}`");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run is a no-op");
    }
}
