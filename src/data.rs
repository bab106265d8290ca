use crate::{
    data::student::{Student, StudentForm},
    error::RosterResult,
    query::SortKey,
};
use async_trait::async_trait;
use serde::Deserialize;

pub mod grade;
pub mod student;
pub mod user;

#[derive(Deserialize)]
pub struct IdForm {
    pub id: i32,
}

/// Storage accessor for student records.
///
/// Postgres is the only production implementation ([`student::PgStudentStore`]), the trait exists
/// so the services can be driven without a database.
#[async_trait]
pub trait StudentStore: Send + Sync {
    /// Inserts a validated form, returning the record with its server-assigned id and timestamps.
    async fn insert(&self, form: &StudentForm) -> RosterResult<Student>;
    /// Overwrites every field and refreshes `updated_at`. `None` if the id doesn't exist.
    async fn update(&self, id: i32, form: &StudentForm) -> RosterResult<Option<Student>>;
    async fn find_by_id(&self, id: i32) -> RosterResult<Option<Student>>;
    /// Every record, ordered by last name then first name.
    async fn find_all(&self) -> RosterResult<Vec<Student>>;
    async fn find_sorted(
        &self,
        sort: SortKey,
        descending: bool,
        offset: i64,
        limit: i64,
    ) -> RosterResult<Vec<Student>>;
    async fn count(&self) -> RosterResult<i64>;
    async fn exists(&self, id: i32) -> RosterResult<bool>;
    /// Hard delete, returns whether a row was removed.
    async fn delete(&self, id: i32) -> RosterResult<bool>;
}
