use crate::models::DbSessionEvent;
use eyre::Result;
use sqlx::{Pool, Postgres};
use tutorcall_core::models::session_event::SessionEvent;

pub async fn append_session_event(
    pool: &Pool<Postgres>,
    event: &SessionEvent,
) -> Result<DbSessionEvent> {
    let row = sqlx::query_as::<_, DbSessionEvent>(
        r#"
        INSERT INTO session_events (session_id, user_id, type, created_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, session_id, user_id, type AS event_type, created_at
        "#,
    )
    .bind(event.session_id)
    .bind(event.user_id)
    .bind(event.event_type.as_str())
    .bind(event.created_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// The full log of one session in the order it was observed.
pub async fn get_session_events(
    pool: &Pool<Postgres>,
    session_id: i64,
) -> Result<Vec<DbSessionEvent>> {
    let rows = sqlx::query_as::<_, DbSessionEvent>(
        r#"
        SELECT id, session_id, user_id, type AS event_type, created_at
        FROM session_events
        WHERE session_id = $1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
