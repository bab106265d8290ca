//! Filtering, sorting and paging over student lists held in memory.

use crate::{
    data::student::Student,
    error::{InvalidPageSnafu, RosterResult},
};
use serde::{Deserialize, Serialize};
use snafu::ensure;
use std::{cmp::Ordering, fmt};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortKey {
    FirstName,
    #[default]
    LastName,
    Age,
    Grade,
    CreatedAt,
}

impl SortKey {
    pub const ALL: [Self; 5] = [
        Self::LastName,
        Self::FirstName,
        Self::Age,
        Self::Grade,
        Self::CreatedAt,
    ];

    /// Accepts `lastName`, `last_name`, `LASTNAME` and friends. Anything else sorts by last name.
    pub fn from_param(raw: &str) -> Self {
        let squashed: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        match squashed.as_str() {
            "firstname" => Self::FirstName,
            "age" => Self::Age,
            "grade" => Self::Grade,
            "createdat" => Self::CreatedAt,
            _ => Self::LastName,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstName => "firstName",
            Self::LastName => "lastName",
            Self::Age => "age",
            Self::Grade => "grade",
            Self::CreatedAt => "createdAt",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstName => "First name",
            Self::LastName => "Last name",
            Self::Age => "Age",
            Self::Grade => "Grade",
            Self::CreatedAt => "Created",
        }
    }

    pub fn compare(self, a: &Student, b: &Student) -> Ordering {
        match self {
            Self::FirstName => a.first_name.cmp(&b.first_name),
            Self::LastName => a.last_name.cmp(&b.last_name),
            Self::Age => a.age.cmp(&b.age),
            Self::Grade => a.numeric_grade().cmp(&b.numeric_grade()),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    page_size: i64,
}

impl PageRequest {
    /// Pages are 1-based. Non-positive values are rejected rather than clamped.
    pub fn new(page: i64, page_size: i64) -> RosterResult<Self> {
        ensure!(page > 0 && page_size > 0, InvalidPageSnafu { page, page_size });
        Ok(Self { page, page_size })
    }

    pub const fn page(&self) -> i64 {
        self.page
    }

    pub const fn page_size(&self) -> i64 {
        self.page_size
    }

    pub const fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    pub fn window<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let size = usize::try_from(self.page_size).unwrap_or(usize::MAX);

        items.into_iter().skip(offset).take(size).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page(),
            page_size: request.page_size(),
        }
    }

    pub const fn page_count(&self) -> i64 {
        if self.total <= 0 {
            1
        } else {
            (self.total - 1) / self.page_size + 1
        }
    }

    pub const fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub const fn has_next(&self) -> bool {
        self.page < self.page_count()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AgeRange {
    pub min: i32,
    pub max: i32,
}

impl AgeRange {
    pub const UNBOUNDED_MIN: i32 = 0;
    pub const UNBOUNDED_MAX: i32 = 150;

    pub const fn is_active(&self) -> bool {
        self.min > Self::UNBOUNDED_MIN || self.max < Self::UNBOUNDED_MAX
    }

    pub const fn contains(&self, age: i32) -> bool {
        self.min <= age && age <= self.max
    }
}

impl Default for AgeRange {
    fn default() -> Self {
        Self {
            min: Self::UNBOUNDED_MIN,
            max: Self::UNBOUNDED_MAX,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentFilter {
    pub search_term: Option<String>,
    pub grade: Option<String>,
    pub age_range: AgeRange,
}

impl StudentFilter {
    pub fn is_active(&self) -> bool {
        active(self.search_term.as_deref()).is_some()
            || active(self.grade.as_deref()).is_some()
            || self.age_range.is_active()
    }

    pub fn matches(&self, student: &Student) -> bool {
        if let Some(term) = active(self.search_term.as_deref()) {
            let term = term.to_lowercase();
            if !student.first_name.to_lowercase().contains(&term)
                && !student.last_name.to_lowercase().contains(&term)
            {
                return false;
            }
        }

        if let Some(grade) = active(self.grade.as_deref())
            && student.grade.as_deref() != Some(grade)
        {
            return false;
        }

        !self.age_range.is_active() || self.age_range.contains(student.age)
    }
}

fn active(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentQuery {
    pub filter: StudentFilter,
    pub sort: SortKey,
    pub descending: bool,
}

impl StudentQuery {
    pub fn sort(&self, students: &mut [Student]) {
        let key = self.sort;
        if self.descending {
            students.sort_by(|a, b| key.compare(a, b).reverse());
        } else {
            students.sort_by(|a, b| key.compare(a, b));
        }
    }

    /// Filters, sorts then windows `students`. `total` counts everything that passed the filter.
    pub fn run(&self, students: Vec<Student>, page: PageRequest) -> Page<Student> {
        let mut matching: Vec<Student> = students
            .into_iter()
            .filter(|s| self.filter.matches(s))
            .collect();
        self.sort(&mut matching);

        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        Page::new(page.window(matching), total, page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn student(id: i32, first: &str, last: &str, age: i32, grade: Option<&str>) -> Student {
        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::minutes(i64::from(id));
        Student {
            id,
            first_name: first.into(),
            last_name: last.into(),
            age,
            grade: grade.map(Into::into),
            created_at: at,
            updated_at: at,
        }
    }

    fn roster() -> Vec<Student> {
        vec![
            student(1, "John", "Smith", 20, Some("A")),
            student(2, "Jane", "Smith", 22, Some("B")),
            student(3, "Bob", "Adams", 19, None),
            student(4, "Alice", "Brown", 30, Some("B")),
            student(5, "Carl", "Jones", 17, Some("F")),
        ]
    }

    fn ids(students: &[Student]) -> Vec<i32> {
        students.iter().map(|s| s.id).collect()
    }

    #[test]
    fn sort_key_parsing_is_lenient() {
        assert_eq!(SortKey::from_param("firstName"), SortKey::FirstName);
        assert_eq!(SortKey::from_param("first_name"), SortKey::FirstName);
        assert_eq!(SortKey::from_param("CREATED_AT"), SortKey::CreatedAt);
        assert_eq!(SortKey::from_param(" grade "), SortKey::Grade);
        assert_eq!(SortKey::from_param("shoe size"), SortKey::LastName);
        assert_eq!(SortKey::from_param(""), SortKey::LastName);
    }

    #[test]
    fn non_positive_pages_are_rejected() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(-3, 10).is_err());
        assert_eq!(PageRequest::new(3, 10).unwrap().offset(), 20);
    }

    #[test]
    fn window_past_the_end_is_empty() {
        let request = PageRequest::new(4, 2).unwrap();
        assert!(request.window(vec![1, 2, 3]).is_empty());
        assert_eq!(PageRequest::new(2, 2).unwrap().window(vec![1, 2, 3]), vec![3]);
    }

    #[test]
    fn search_matches_either_name_case_insensitively() {
        let query = StudentQuery {
            filter: StudentFilter {
                search_term: Some("SMI".into()),
                ..StudentFilter::default()
            },
            ..StudentQuery::default()
        };
        let page = query.run(roster(), PageRequest::new(1, 10).unwrap());
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|s| s.last_name == "Smith"));
    }

    #[test]
    fn blank_filters_are_inactive() {
        let filter = StudentFilter {
            search_term: Some("  ".into()),
            grade: Some(String::new()),
            age_range: AgeRange::default(),
        };
        assert!(!filter.is_active());
        assert!(roster().iter().all(|s| filter.matches(s)));
    }

    #[test]
    fn filters_are_anded() {
        let filter = StudentFilter {
            search_term: None,
            grade: Some("B".into()),
            age_range: AgeRange { min: 25, max: 150 },
        };
        let matched: Vec<_> = roster().into_iter().filter(|s| filter.matches(s)).collect();
        assert_eq!(ids(&matched), vec![4]);
    }

    #[test]
    fn age_range_is_inclusive() {
        let range = AgeRange { min: 19, max: 20 };
        assert!(range.is_active());
        assert!(range.contains(19));
        assert!(range.contains(20));
        assert!(!range.contains(21));
    }

    #[test]
    fn grade_sort_puts_ungraded_last_when_descending() {
        let query = StudentQuery {
            sort: SortKey::Grade,
            descending: true,
            ..StudentQuery::default()
        };
        let page = query.run(roster(), PageRequest::new(1, 10).unwrap());
        assert_eq!(ids(&page.items), vec![1, 2, 4, 5, 3]);
    }

    #[test]
    fn descending_keeps_ties_in_input_order() {
        let query = StudentQuery {
            sort: SortKey::LastName,
            descending: true,
            ..StudentQuery::default()
        };
        let page = query.run(roster(), PageRequest::new(1, 10).unwrap());
        assert_eq!(ids(&page.items), vec![1, 2, 5, 4, 3]);
    }

    #[test]
    fn pages_concatenate_to_the_full_ordering() {
        let query = StudentQuery {
            sort: SortKey::Age,
            ..StudentQuery::default()
        };
        let everything = query.run(roster(), PageRequest::new(1, 100).unwrap()).items;

        let mut stitched = vec![];
        for page in 1..=3 {
            let page = query.run(roster(), PageRequest::new(page, 2).unwrap());
            assert_eq!(page.total, 5);
            assert_eq!(page.page_count(), 3);
            stitched.extend(page.items);
        }

        assert_eq!(ids(&stitched), ids(&everything));
    }

    #[test]
    fn page_navigation() {
        let request = PageRequest::new(1, 25).unwrap();
        let empty: Page<Student> = Page::new(vec![], 0, request);
        assert_eq!(empty.page_count(), 1);
        assert!(!empty.has_next());
        assert!(!empty.has_previous());

        let middle: Page<Student> = Page::new(vec![], 60, PageRequest::new(2, 25).unwrap());
        assert_eq!(middle.page_count(), 3);
        assert!(middle.has_next());
        assert!(middle.has_previous());
    }

    #[test]
    fn huge_page_sizes_fit_everything_on_one_page() {
        let request = PageRequest::new(1, i64::MAX).unwrap();
        let page: Page<Student> = Page::new(vec![], 5, request);
        assert_eq!(page.page_count(), 1);
        assert!(!page.has_next());

        let full: Page<Student> = Page::new(vec![], i64::MAX, request);
        assert_eq!(full.page_count(), 1);
    }
}
