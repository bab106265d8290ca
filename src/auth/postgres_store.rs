use crate::{
    error::{
        InvalidChronoDateTimeSnafu, InvalidDateTimeSnafu, MakeQuerySnafu, RosterError,
        RmpSerdeDecodeSnafu, RmpSerdeEncodeSnafu,
    },
    state::RosterState,
};
use async_trait::async_trait;
use axum_login::tower_sessions::{
    ExpiredDeletion, SessionStore,
    cookie::time::OffsetDateTime,
    session::{Id, Record},
    session_store::Error as SSError,
};
use chrono::{DateTime, Utc};
use snafu::{OptionExt, ResultExt};
use sqlx::PgConnection;

#[derive(sqlx::FromRow)]
struct SessionRow {
    data: Vec<u8>,
    expiry_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PostgresSessionStore {
    state: RosterState,
}

impl PostgresSessionStore {
    pub const fn new(state: RosterState) -> Self {
        Self { state }
    }
}

fn to_chrono(odt: OffsetDateTime) -> Result<DateTime<Utc>, RosterError> {
    DateTime::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
        .context(InvalidDateTimeSnafu { odt })
}

fn to_offset(utc_dt: DateTime<Utc>) -> Result<OffsetDateTime, RosterError> {
    OffsetDateTime::from_unix_timestamp(utc_dt.timestamp())
        .context(InvalidChronoDateTimeSnafu { utc_dt })
}

impl PostgresSessionStore {
    async fn id_exists(id: Id, conn: &mut PgConnection) -> Result<bool, RosterError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM public.sessions WHERE id = $1)")
            .bind(id.to_string())
            .fetch_one(conn)
            .await
            .context(MakeQuerySnafu)
    }

    async fn save_session(record: &Record, conn: &mut PgConnection) -> Result<(), RosterError> {
        let expiry_date = to_chrono(record.expiry_date)?;
        let serialised_data = rmp_serde::to_vec(&record.data).context(RmpSerdeEncodeSnafu)?;

        sqlx::query("INSERT INTO public.sessions (id, data, expiry_date) VALUES ($1, $2, $3) ON CONFLICT (id) DO UPDATE SET data = excluded.data, expiry_date = excluded.expiry_date")
            .bind(record.id.to_string())
            .bind(serialised_data)
            .bind(expiry_date)
            .execute(conn)
            .await
            .context(MakeQuerySnafu)?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn create(&self, session_record: &mut Record) -> Result<(), SSError> {
        let mut connection = self
            .state
            .get_connection()
            .await
            .map_err(|e| SSError::Backend(e.to_string()))?;

        while Self::id_exists(session_record.id, &mut connection)
            .await
            .map_err(|e| SSError::Backend(e.to_string()))?
        {
            session_record.id = Id::default();
        }

        Self::save_session(session_record, &mut connection)
            .await
            .map_err(|e| SSError::Encode(e.to_string()))
    }

    async fn save(&self, session_record: &Record) -> Result<(), SSError> {
        let mut connection = self
            .state
            .get_connection()
            .await
            .map_err(|e| SSError::Backend(e.to_string()))?;

        Self::save_session(session_record, &mut connection)
            .await
            .map_err(|e| SSError::Encode(e.to_string()))
    }

    async fn load(&self, session_id: &Id) -> Result<Option<Record>, SSError> {
        let mut connection = self
            .state
            .get_connection()
            .await
            .map_err(|e| SSError::Backend(e.to_string()))?;

        let Some(row) = sqlx::query_as::<_, SessionRow>(
            "SELECT data, expiry_date FROM public.sessions WHERE id = $1",
        )
        .bind(session_id.to_string())
        .fetch_optional(&mut *connection)
        .await
        .context(MakeQuerySnafu)
        .map_err(|e| SSError::Decode(e.to_string()))?
        else {
            return Ok(None);
        };

        let data = rmp_serde::from_slice(&row.data)
            .context(RmpSerdeDecodeSnafu)
            .map_err(|e| SSError::Decode(e.to_string()))?;
        let expiry_date = to_offset(row.expiry_date).map_err(|e| SSError::Decode(e.to_string()))?;

        Ok(Some(Record {
            id: *session_id,
            data,
            expiry_date,
        }))
    }

    async fn delete(&self, session_id: &Id) -> Result<(), SSError> {
        let mut connection = self
            .state
            .get_connection()
            .await
            .map_err(|e| SSError::Backend(e.to_string()))?;

        sqlx::query("DELETE FROM public.sessions WHERE id = $1")
            .bind(session_id.to_string())
            .execute(&mut *connection)
            .await
            .context(MakeQuerySnafu)
            .map_err(|e| SSError::Backend(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ExpiredDeletion for PostgresSessionStore {
    async fn delete_expired(&self) -> Result<(), SSError> {
        let mut connection = self
            .state
            .get_connection()
            .await
            .map_err(|e| SSError::Backend(e.to_string()))?;

        let result = sqlx::query("DELETE FROM public.sessions WHERE expiry_date < now()")
            .execute(&mut *connection)
            .await
            .context(MakeQuerySnafu)
            .map_err(|e| SSError::Backend(e.to_string()))?;
        debug!(removed = result.rows_affected(), "Cleared expired sessions");

        Ok(())
    }
}
