#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use roster::{
    data::{
        StudentStore,
        student::{Student, StudentForm},
    },
    error::RosterResult,
    events::EventBus,
    query::{SortKey, StudentQuery},
    service::StudentService,
};
use std::sync::Arc;

fn by_name(students: &mut [Student]) {
    students.sort_by(|a, b| {
        a.last_name
            .cmp(&b.last_name)
            .then_with(|| a.first_name.cmp(&b.first_name))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Keeps students in a `Vec`, handing out ids and timestamps the way Postgres would.
#[derive(Debug, Default)]
pub struct MemoryStudentStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    students: Vec<Student>,
    next_id: i32,
    ticks: i64,
}

impl MemoryInner {
    //every write gets a strictly later timestamp so created_at orderings are deterministic
    fn tick(&mut self) -> NaiveDateTime {
        self.ticks += 1;
        base_time() + Duration::seconds(self.ticks)
    }
}

pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

#[async_trait]
impl StudentStore for MemoryStudentStore {
    async fn insert(&self, form: &StudentForm) -> RosterResult<Student> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let at = inner.tick();

        let student = Student {
            id: inner.next_id,
            first_name: form.first_name.clone(),
            last_name: form.last_name.clone(),
            age: form.age,
            grade: form.grade.clone(),
            created_at: at,
            updated_at: at,
        };
        inner.students.push(student.clone());
        Ok(student)
    }

    async fn update(&self, id: i32, form: &StudentForm) -> RosterResult<Option<Student>> {
        let mut inner = self.inner.lock();
        let at = inner.tick();

        Ok(inner.students.iter_mut().find(|s| s.id == id).map(|s| {
            s.first_name.clone_from(&form.first_name);
            s.last_name.clone_from(&form.last_name);
            s.age = form.age;
            s.grade.clone_from(&form.grade);
            s.updated_at = at;
            s.clone()
        }))
    }

    async fn find_by_id(&self, id: i32) -> RosterResult<Option<Student>> {
        Ok(self.inner.lock().students.iter().find(|s| s.id == id).cloned())
    }

    async fn find_all(&self) -> RosterResult<Vec<Student>> {
        let mut students = self.inner.lock().students.clone();
        by_name(&mut students);
        Ok(students)
    }

    async fn find_sorted(
        &self,
        sort: SortKey,
        descending: bool,
        offset: i64,
        limit: i64,
    ) -> RosterResult<Vec<Student>> {
        let mut students = self.inner.lock().students.clone();
        by_name(&mut students);
        StudentQuery {
            sort,
            descending,
            ..StudentQuery::default()
        }
        .sort(&mut students);

        Ok(students
            .into_iter()
            .skip(usize::try_from(offset).unwrap())
            .take(usize::try_from(limit).unwrap())
            .collect())
    }

    async fn count(&self) -> RosterResult<i64> {
        Ok(i64::try_from(self.inner.lock().students.len()).unwrap())
    }

    async fn exists(&self, id: i32) -> RosterResult<bool> {
        Ok(self.inner.lock().students.iter().any(|s| s.id == id))
    }

    async fn delete(&self, id: i32) -> RosterResult<bool> {
        let mut inner = self.inner.lock();
        let before = inner.students.len();
        inner.students.retain(|s| s.id != id);
        Ok(inner.students.len() != before)
    }
}

pub type MemoryService = StudentService<MemoryStudentStore>;

pub fn service() -> MemoryService {
    StudentService::new(MemoryStudentStore::default(), Arc::new(EventBus::new()))
}

pub fn form(first: &str, last: &str, age: i32, grade: Option<&str>) -> StudentForm {
    StudentForm::new(first, last, age, grade)
}
