use anyhow::Result;
use sqlx::PgPool;

use crate::domain::RegisteredMeter;

/// Fetch up to `limit` active meters together with their owner's user type.
pub async fn active_meters(pool: &PgPool, limit: i64) -> Result<Vec<RegisteredMeter>> {
    let rows = sqlx::query_as::<_, RegisteredMeter>(
        r#"
        SELECT
            sm.meter_id,
            sm.meter_type::TEXT AS meter_type,
            sm.location,
            u.user_type::TEXT AS user_type
        FROM smart_meters sm
        JOIN users u ON sm.user_id = u.id
        WHERE sm.status = 'Active'
        ORDER BY sm.meter_id
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
