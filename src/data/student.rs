use crate::{
    data::{
        StudentStore,
        grade::{Grade, Mention, numeric_grade},
    },
    error::{MakeQuerySnafu, RosterResult, ValidationSnafu},
    query::SortKey,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};
use sqlx::{Pool, Postgres, QueryBuilder};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_GRADE_LEN: usize = 10;
pub const MIN_AGE_EXCLUSIVE: i32 = 0;
pub const MAX_AGE_EXCLUSIVE: i32 = 150;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Student {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub grade: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn letter_grade(&self) -> Option<Grade> {
        self.grade.as_deref().and_then(|g| g.parse().ok())
    }

    pub fn numeric_grade(&self) -> i32 {
        numeric_grade(self.grade.as_deref())
    }

    pub fn has_grade(&self) -> bool {
        self.grade.as_deref().is_some_and(|g| !g.trim().is_empty())
    }

    pub fn grade_display(&self) -> &str {
        match self.grade.as_deref() {
            Some(g) if !g.trim().is_empty() => g,
            _ => "Not graded",
        }
    }

    pub fn mention(&self) -> Mention {
        Mention::from_numeric(self.numeric_grade())
    }

    pub fn formatted_created_at(&self) -> String {
        self.created_at.format("%d/%m/%Y %H:%M").to_string()
    }

    pub fn formatted_updated_at(&self) -> String {
        self.updated_at.format("%d/%m/%Y %H:%M").to_string()
    }

    pub fn to_form(&self) -> StudentForm {
        StudentForm {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            age: self.age,
            grade: self.grade.clone(),
        }
    }
}

/// The user-editable part of a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentForm {
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub grade: Option<String>,
}

impl StudentForm {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        age: i32,
        grade: Option<&str>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            age,
            grade: grade.map(ToString::to_string),
        }
    }

    /// Trims the names and turns a blank grade into no grade.
    #[must_use]
    pub fn normalised(self) -> Self {
        let grade = self
            .grade
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());

        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            age: self.age,
            grade,
        }
    }

    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = vec![];

        let mut check_name = |name: &str, what: &str| {
            if name.trim().is_empty() {
                errors.push(format!("{what} is required"));
            } else if name.chars().count() > MAX_NAME_LEN {
                errors.push(format!("{what} cannot be longer than {MAX_NAME_LEN} characters"));
            }
        };
        check_name(&self.first_name, "First name");
        check_name(&self.last_name, "Last name");

        if self.age <= MIN_AGE_EXCLUSIVE {
            errors.push(format!("Age must be greater than {MIN_AGE_EXCLUSIVE}"));
        } else if self.age >= MAX_AGE_EXCLUSIVE {
            errors.push(format!("Age must be less than {MAX_AGE_EXCLUSIVE}"));
        }

        if let Some(grade) = &self.grade
            && grade.chars().count() > MAX_GRADE_LEN
        {
            errors.push(format!("Grade cannot be longer than {MAX_GRADE_LEN} characters"));
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validation_errors().is_empty()
    }

    /// Normalises then validates, collecting every problem into one error.
    pub fn validated(self) -> RosterResult<Self> {
        let normalised = self.normalised();
        let reasons = normalised.validation_errors();
        ensure!(reasons.is_empty(), ValidationSnafu { reasons });
        Ok(normalised)
    }
}

const STUDENT_COLUMNS: &str = "id, first_name, last_name, age, grade, created_at, updated_at";

/// `CASE` expression ordering grades by the same numeric table the in-memory comparator uses.
fn grade_order_expression() -> String {
    let mut expression = String::from("CASE UPPER(TRIM(grade))");
    for grade in Grade::ALL {
        expression.push_str(&format!(" WHEN '{}' THEN {}", grade.letter(), grade.numeric()));
    }
    expression.push_str(" ELSE -1 END");
    expression
}

/// Order `find_all` returns rows in. Byte-wise collation so it agrees with `str::cmp`.
pub const NAME_ORDER: &str = r#"last_name COLLATE "C" ASC, first_name COLLATE "C" ASC, id ASC"#;

/// The primary key in `dir`, then [`NAME_ORDER`]. That is exactly what a stable sort over
/// `find_all` produces, so the paged list and the in-memory search agree on ties.
pub fn order_by_clause(sort: SortKey, descending: bool) -> String {
    let dir = if descending { "DESC" } else { "ASC" };
    let key = match sort {
        SortKey::FirstName => r#"first_name COLLATE "C""#.to_string(),
        SortKey::LastName => r#"last_name COLLATE "C""#.to_string(),
        SortKey::Age => "age".to_string(),
        SortKey::Grade => grade_order_expression(),
        SortKey::CreatedAt => "created_at".to_string(),
    };
    format!("{key} {dir}, {NAME_ORDER}")
}

#[derive(Clone, Debug)]
pub struct PgStudentStore {
    pool: Pool<Postgres>,
}

impl PgStudentStore {
    pub const fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudentStore for PgStudentStore {
    async fn insert(&self, form: &StudentForm) -> RosterResult<Student> {
        sqlx::query_as::<_, Student>(&format!(
            "INSERT INTO public.student (first_name, last_name, age, grade) VALUES ($1, $2, $3, $4) RETURNING {STUDENT_COLUMNS}"
        ))
        .bind(&form.first_name)
        .bind(&form.last_name)
        .bind(form.age)
        .bind(form.grade.as_deref())
        .fetch_one(&self.pool)
        .await
        .context(MakeQuerySnafu)
    }

    async fn update(&self, id: i32, form: &StudentForm) -> RosterResult<Option<Student>> {
        sqlx::query_as::<_, Student>(&format!(
            "UPDATE public.student SET first_name = $1, last_name = $2, age = $3, grade = $4, updated_at = CURRENT_TIMESTAMP WHERE id = $5 RETURNING {STUDENT_COLUMNS}"
        ))
        .bind(&form.first_name)
        .bind(&form.last_name)
        .bind(form.age)
        .bind(form.grade.as_deref())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context(MakeQuerySnafu)
    }

    async fn find_by_id(&self, id: i32) -> RosterResult<Option<Student>> {
        sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM public.student WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context(MakeQuerySnafu)
    }

    async fn find_all(&self) -> RosterResult<Vec<Student>> {
        sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM public.student ORDER BY {NAME_ORDER}"
        ))
        .fetch_all(&self.pool)
        .await
        .context(MakeQuerySnafu)
    }

    async fn find_sorted(
        &self,
        sort: SortKey,
        descending: bool,
        offset: i64,
        limit: i64,
    ) -> RosterResult<Vec<Student>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {STUDENT_COLUMNS} FROM public.student ORDER BY "
        ));
        builder
            .push(order_by_clause(sort, descending))
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        builder
            .build_query_as::<Student>()
            .fetch_all(&self.pool)
            .await
            .context(MakeQuerySnafu)
    }

    async fn count(&self) -> RosterResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM public.student")
            .fetch_one(&self.pool)
            .await
            .context(MakeQuerySnafu)
    }

    async fn exists(&self, id: i32) -> RosterResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM public.student WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context(MakeQuerySnafu)
    }

    async fn delete(&self, id: i32) -> RosterResult<bool> {
        let result = sqlx::query("DELETE FROM public.student WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context(MakeQuerySnafu)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(first: &str, last: &str, age: i32, grade: Option<&str>) -> StudentForm {
        StudentForm::new(first, last, age, grade)
    }

    #[test]
    fn valid_form_passes() {
        assert!(form("Ada", "Lovelace", 36, Some("A")).validated().is_ok());
        assert!(form("Ada", "Lovelace", 1, None).is_valid());
        assert!(form("Ada", "Lovelace", 149, None).is_valid());
    }

    #[test]
    fn age_bounds_are_exclusive() {
        assert!(!form("Ada", "Lovelace", 0, None).is_valid());
        assert!(!form("Ada", "Lovelace", 150, None).is_valid());
        assert!(!form("Ada", "Lovelace", -4, None).is_valid());
    }

    #[test]
    fn every_problem_is_reported() {
        let long = "x".repeat(MAX_NAME_LEN + 1);
        let errors = form("  ", &long, 0, Some("ABCDEFGHIJK")).validation_errors();
        assert_eq!(
            errors,
            vec![
                "First name is required".to_string(),
                "Last name cannot be longer than 100 characters".to_string(),
                "Age must be greater than 0".to_string(),
                "Grade cannot be longer than 10 characters".to_string(),
            ]
        );
    }

    #[test]
    fn names_at_the_limit_are_fine() {
        let exactly = "é".repeat(MAX_NAME_LEN);
        assert!(form(&exactly, &exactly, 20, None).is_valid());
    }

    #[test]
    fn validated_normalises() {
        let normalised = form("  Grace ", " Hopper", 85, Some("  ")).validated().unwrap();
        assert_eq!(normalised, form("Grace", "Hopper", 85, None));
    }

    #[test]
    fn validation_error_carries_reasons() {
        let err = form("", "", 200, None).validated().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("First name is required"));
        assert!(message.contains("Age must be less than 150"));
    }

    #[test]
    fn derived_student_values() {
        let created = NaiveDateTime::parse_from_str("2024-03-05 09:07:00", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let student = Student {
            id: 7,
            first_name: "Alan".into(),
            last_name: "Turing".into(),
            age: 41,
            grade: Some("b+".into()),
            created_at: created,
            updated_at: created,
        };

        assert_eq!(student.full_name(), "Alan Turing");
        assert_eq!(student.numeric_grade(), 14);
        assert_eq!(student.letter_grade(), Some(Grade::BPlus));
        assert_eq!(student.mention(), Mention::Good);
        assert_eq!(student.formatted_created_at(), "05/03/2024 09:07");

        let ungraded = Student {
            grade: None,
            ..student
        };
        assert_eq!(ungraded.grade_display(), "Not graded");
        assert!(!ungraded.has_grade());
    }

    #[test]
    fn order_by_uses_grade_table() {
        let clause = order_by_clause(SortKey::Grade, true);
        assert!(clause.starts_with("CASE UPPER(TRIM(grade)) WHEN 'A' THEN 18"));
        assert!(clause.contains("WHEN 'F' THEN 0 ELSE -1 END DESC"));

        assert!(clause.ends_with(NAME_ORDER));
    }

    #[test]
    fn ties_always_fall_back_to_ascending_names() {
        for sort in SortKey::ALL {
            for descending in [false, true] {
                let clause = order_by_clause(sort, descending);
                assert!(clause.ends_with(&format!(", {NAME_ORDER}")), "{clause}");
            }
        }

        assert_eq!(
            order_by_clause(SortKey::LastName, true),
            r#"last_name COLLATE "C" DESC, last_name COLLATE "C" ASC, first_name COLLATE "C" ASC, id ASC"#
        );
        assert_eq!(
            order_by_clause(SortKey::Age, false),
            r#"age ASC, last_name COLLATE "C" ASC, first_name COLLATE "C" ASC, id ASC"#
        );
    }
}
