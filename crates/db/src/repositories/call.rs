use crate::models::{DbCall, DbPopulatedMember};
use chrono::Utc;
use eyre::Result;
use sqlx::{PgConnection, Pool, Postgres};
use tutorcall_core::models::{call::CallType, interval::Interval};

const CALL_COLUMNS: &str =
    "id, type AS call_type, scheduled_start, scheduled_end, ratified, canceled, created_at";

/// Inserts the call and all of its members in one transaction.
pub async fn create_call(
    pool: &Pool<Postgres>,
    call_type: CallType,
    scheduled: &Interval,
    member_ids: &[i64],
) -> Result<DbCall> {
    let mut tx = pool.begin().await?;

    let call = insert_call(&mut tx, call_type, scheduled).await?;
    insert_members(&mut tx, call.id, member_ids).await?;

    tx.commit().await?;

    tracing::debug!(
        "Created call: id={}, type={}, members={:?}",
        call.id, call.call_type, member_ids
    );
    Ok(call)
}

pub(crate) async fn insert_call(
    conn: &mut PgConnection,
    call_type: CallType,
    scheduled: &Interval,
) -> Result<DbCall> {
    let call = sqlx::query_as::<_, DbCall>(&format!(
        r#"
        INSERT INTO calls (type, scheduled_start, scheduled_end, ratified, canceled, created_at)
        VALUES ($1, $2, $3, FALSE, FALSE, $4)
        RETURNING {}
        "#,
        CALL_COLUMNS
    ))
    .bind(call_type.as_str())
    .bind(scheduled.start())
    .bind(scheduled.end())
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;

    Ok(call)
}

pub(crate) async fn insert_members(
    conn: &mut PgConnection,
    call_id: i64,
    member_ids: &[i64],
) -> Result<()> {
    for user_id in member_ids {
        sqlx::query(
            r#"
            INSERT INTO call_members (call_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (call_id, user_id) DO NOTHING
            "#,
        )
        .bind(call_id)
        .bind(*user_id)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

pub async fn get_call_by_id(pool: &Pool<Postgres>, id: i64) -> Result<Option<DbCall>> {
    let call = sqlx::query_as::<_, DbCall>(&format!(
        "SELECT {} FROM calls WHERE id = $1",
        CALL_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(call)
}

pub async fn is_member(pool: &Pool<Postgres>, call_id: i64, user_id: i64) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM call_members WHERE call_id = $1 AND user_id = $2
        )
        "#,
    )
    .bind(call_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Adds a member if missing. Returns whether a row was written.
pub async fn add_member(pool: &Pool<Postgres>, call_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO call_members (call_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (call_id, user_id) DO NOTHING
        "#,
    )
    .bind(call_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_member_ids(pool: &Pool<Postgres>, call_id: i64) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT user_id FROM call_members
        WHERE call_id = $1
        ORDER BY user_id ASC
        "#,
    )
    .bind(call_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Identity data for the given members of a call. Ids that are not members are skipped.
pub async fn get_populated_members(
    pool: &Pool<Postgres>,
    call_id: i64,
    user_ids: &[i64],
) -> Result<Vec<DbPopulatedMember>> {
    let members = sqlx::query_as::<_, DbPopulatedMember>(
        r#"
        SELECT call_members.call_id, users.id AS user_id, users.name, users.image, users.role
        FROM users
        JOIN call_members ON call_members.user_id = users.id
        WHERE call_members.call_id = $1 AND users.id = ANY($2)
        ORDER BY users.id ASC
        "#,
    )
    .bind(call_id)
    .bind(user_ids)
    .fetch_all(pool)
    .await?;

    Ok(members)
}

pub async fn mark_ratified(pool: &Pool<Postgres>, call_id: i64) -> Result<()> {
    sqlx::query("UPDATE calls SET ratified = TRUE WHERE id = $1")
        .bind(call_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub(crate) async fn cancel_calls(conn: &mut PgConnection, call_ids: &[i64]) -> Result<()> {
    if call_ids.is_empty() {
        return Ok(());
    }

    sqlx::query("UPDATE calls SET canceled = TRUE WHERE id = ANY($1)")
        .bind(call_ids)
        .execute(conn)
        .await?;

    Ok(())
}
