use eyre::Result;
use sqlx::{Executor, Pool, Postgres};
use tracing::info;

pub async fn initialize_database(pool: &Pool<Postgres>) -> Result<()> {
    info!("Initializing database schema...");

    // Create users table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            image VARCHAR(1024) NULL,
            role VARCHAR(32) NOT NULL,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create availability_slots table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS availability_slots (
            id BIGSERIAL PRIMARY KEY,
            owner_id BIGINT NOT NULL REFERENCES users(id),
            start_time TIMESTAMP WITH TIME ZONE NOT NULL,
            end_time TIMESTAMP WITH TIME ZONE NOT NULL,
            deleted BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            CONSTRAINT valid_slot_range CHECK (end_time > start_time)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create calls table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calls (
            id BIGSERIAL PRIMARY KEY,
            type VARCHAR(16) NOT NULL CHECK (type IN ('lesson', 'interview')),
            scheduled_start TIMESTAMP WITH TIME ZONE NOT NULL,
            scheduled_end TIMESTAMP WITH TIME ZONE NOT NULL,
            ratified BOOLEAN NOT NULL DEFAULT FALSE,
            canceled BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
            CONSTRAINT valid_call_range CHECK (scheduled_end > scheduled_start)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create call_members table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS call_members (
            call_id BIGINT NOT NULL REFERENCES calls(id),
            user_id BIGINT NOT NULL REFERENCES users(id),
            PRIMARY KEY (call_id, user_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create bookings table (lessons and interviews occupying a slot)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bookings (
            id BIGSERIAL PRIMARY KEY,
            slot_id BIGINT NOT NULL REFERENCES availability_slots(id),
            call_id BIGINT NOT NULL REFERENCES calls(id),
            start_time TIMESTAMP WITH TIME ZONE NOT NULL,
            end_time TIMESTAMP WITH TIME ZONE NOT NULL,
            canceled BOOLEAN NOT NULL DEFAULT FALSE,
            CONSTRAINT valid_booking_range CHECK (end_time > start_time)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create session_events table (append-only)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_events (
            id BIGSERIAL PRIMARY KEY,
            session_id BIGINT NOT NULL REFERENCES calls(id),
            user_id BIGINT NOT NULL REFERENCES users(id),
            type VARCHAR(16) NOT NULL CHECK (type IN ('joined', 'left')),
            created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes (several statements, so this goes through the simple query protocol)
    pool.execute(
        r#"
        CREATE INDEX IF NOT EXISTS idx_availability_slots_owner_id ON availability_slots(owner_id);
        CREATE INDEX IF NOT EXISTS idx_call_members_user_id ON call_members(user_id);
        CREATE INDEX IF NOT EXISTS idx_bookings_slot_id ON bookings(slot_id);
        CREATE INDEX IF NOT EXISTS idx_bookings_call_id ON bookings(call_id);
        CREATE INDEX IF NOT EXISTS idx_session_events_session_id ON session_events(session_id, created_at);
        "#,
    )
    .await?;

    info!("Database schema initialized successfully.");
    Ok(())
}
