use crate::{
    auth::{AuthUtilities, PermissionsTarget, RosterSession},
    data::{
        IdForm,
        grade::Grade,
        student::{MIN_AGE_EXCLUSIVE, Student, StudentForm},
    },
    error::{JsonSnafu, RosterError, RosterResult},
    maud_conveniences::{
        errors_list, form_element, form_submit_button, render_table, simple_form_element, title,
    },
    query::{AgeRange, Page, PageRequest, SortKey, StudentFilter, StudentQuery},
    state::RosterState,
};
use axum::{
    Form,
    body::Body,
    extract::{Path, Query, State},
    http::Response,
    response::{IntoResponse, Redirect},
};
use maud::{Markup, html};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::str::FromStr;

pub async fn get_students(
    State(state): State<RosterState>,
    session: RosterSession,
    Query(params): Query<ListParams>,
) -> Response<Body> {
    if !session.can(PermissionsTarget::VIEW_STUDENTS) {
        return Redirect::to("/login?to=/students").into_response();
    }
    let can_edit = session.can(PermissionsTarget::CRUD_STUDENTS);

    state.render(session, html! {
        div class="mx-auto bg-gray-800 p-8 rounded shadow-md max-w-5xl w-full flex flex-col space-y-4" {
            div class="flex flex-row items-center justify-between" {
                (title("Students"))
                @if can_edit {
                    button class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded" hx-get="/internal/students/new_form" hx-target="#in_focus" {
                        "Add new Student"
                    }
                }
            }
            (filter_form(&params))
            div id="in_focus" {}
            div id="student_list" hx-get="/internal/students" hx-include="#student_filter" hx-trigger="load" {}
        }
    }).into_response()
}

fn filter_form(params: &ListParams) -> Markup {
    let selected_sort = params.sort_key();

    html! {
        form id="student_filter" hx-get="/internal/students" hx-target="#student_list" hx-trigger="submit, change" class="grid grid-cols-2 md:grid-cols-6 gap-2 items-end" {
            (simple_form_element("search", "Search", false, Some("search"), params.search.as_deref()))
            (form_element("grade", "Grade", html! {
                select id="grade" name="grade" class="shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600" {
                    option value="" {"Any"}
                    @for grade in Grade::ALL {
                        option value=(grade.letter()) selected[params.grade.as_deref() == Some(grade.letter())] {(grade.letter())}
                    }
                }
            }))
            (simple_form_element("min_age", "Min Age", false, Some("number"), params.min_age.as_deref()))
            (simple_form_element("max_age", "Max Age", false, Some("number"), params.max_age.as_deref()))
            (form_element("sort", "Sort By", html! {
                select id="sort" name="sort" class="shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600" {
                    @for key in SortKey::ALL {
                        option value=(key.as_str()) selected[key == selected_sort] {(key.label())}
                    }
                }
            }))
            div class="mb-4 flex items-center" {
                input type="checkbox" name="desc" id="desc" value="true" checked[params.descending()] class="mr-2 leading-tight";
                label for="desc" class="text-gray-300 cursor-pointer" {"Descending"}
            }
        }
    }
}

/// Everything the student list understands from its query string. Kept as raw strings so a
/// half-typed filter never fails extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<String>,
}

fn number<T: FromStr>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|raw| raw.trim().parse().ok())
}

impl ListParams {
    pub fn sort_key(&self) -> SortKey {
        self.sort.as_deref().map(SortKey::from_param).unwrap_or_default()
    }

    pub fn descending(&self) -> bool {
        self.desc
            .as_deref()
            .is_some_and(|d| matches!(d.trim(), "true" | "on" | "1"))
    }

    pub fn query(&self) -> StudentQuery {
        let age_range = AgeRange {
            min: number(self.min_age.as_deref()).unwrap_or(AgeRange::UNBOUNDED_MIN),
            max: number(self.max_age.as_deref()).unwrap_or(AgeRange::UNBOUNDED_MAX),
        };

        StudentQuery {
            filter: StudentFilter {
                search_term: self.search.clone(),
                grade: self.grade.clone(),
                age_range,
            },
            sort: self.sort_key(),
            descending: self.descending(),
        }
    }

    /// Missing values fall back to the first page of `default_size`, explicit non-positive ones are an error.
    pub fn page_request(&self, default_size: i64) -> RosterResult<PageRequest> {
        PageRequest::new(
            number(self.page.as_deref()).unwrap_or(1),
            number(self.page_size.as_deref()).unwrap_or(default_size),
        )
    }

    #[must_use]
    pub fn with_page(&self, page: i64) -> Self {
        Self {
            page: Some(page.to_string()),
            ..self.clone()
        }
    }

    /// Clicking the column already sorted on flips the direction.
    #[must_use]
    pub fn with_sort(&self, sort: SortKey) -> Self {
        let descending = self.sort_key() == sort && !self.descending();
        Self {
            sort: Some(sort.as_str().to_string()),
            desc: Some(descending.to_string()),
            page: None,
            ..self.clone()
        }
    }

    pub fn hx_vals(&self) -> RosterResult<String> {
        serde_json::to_string(self).context(JsonSnafu)
    }
}

pub async fn internal_get_students(
    State(state): State<RosterState>,
    session: RosterSession,
    Query(params): Query<ListParams>,
) -> RosterResult<Markup> {
    session.ensure_can(PermissionsTarget::VIEW_STUDENTS)?;

    let page_request = params.page_request(state.config().server_config().default_page_size)?;
    let query = params.query();
    let page = if query.filter.is_active() {
        state.students().search_students(&query, page_request).await?
    } else {
        state
            .students()
            .list_students(page_request, query.sort, query.descending)
            .await?
    };

    render_student_page(&params, &page, session.can(PermissionsTarget::CRUD_STUDENTS))
}

fn render_student_page(params: &ListParams, page: &Page<Student>, can_edit: bool) -> RosterResult<Markup> {
    let sort_header = |key: SortKey| -> RosterResult<Markup> {
        let arrow = match (params.sort_key() == key, params.descending()) {
            (true, true) => " ▼",
            (true, false) => " ▲",
            (false, _) => "",
        };
        let vals = params.with_sort(key).hx_vals()?;
        Ok(html! {
            a class="cursor-pointer underline" hx-get="/internal/students" hx-vals=(vals) hx-target="#student_list" {
                (key.label()) (arrow)
            }
        })
    };

    let titles = [
        sort_header(SortKey::FirstName)?,
        sort_header(SortKey::LastName)?,
        sort_header(SortKey::Age)?,
        sort_header(SortKey::Grade)?,
        html! {"Mention"},
        sort_header(SortKey::CreatedAt)?,
        html! {},
    ];

    let rows = page.items.iter().map(|student| {
        [
            html! {(student.first_name)},
            html! {(student.last_name)},
            html! {(student.age)},
            html! {(student.grade_display())},
            html! {(student.mention())},
            html! {(student.formatted_created_at())},
            html! {
                div class="flex flex-row space-x-2" {
                    button class="bg-slate-600 hover:bg-slate-800 py-1 px-2 rounded" hx-get={"/internal/students/" (student.id)} hx-target="#in_focus" {"View"}
                    @if can_edit {
                        button class="bg-blue-600 hover:bg-blue-800 py-1 px-2 rounded" hx-get={"/internal/students/" (student.id) "/edit_form"} hx-target="#in_focus" {"Edit"}
                        button class="bg-red-600 hover:bg-red-800 py-1 px-2 rounded" hx-delete="/internal/students" hx-vals={"{\"id\": " (student.id) "}"} hx-target="#in_focus" hx-confirm={"Delete " (student.full_name()) "?"} {"Delete"}
                    }
                }
            },
        ]
    });

    let table = render_table(titles, rows);
    let previous = page
        .has_previous()
        .then(|| params.with_page(page.page - 1).hx_vals())
        .transpose()?;
    let next = page
        .has_next()
        .then(|| params.with_page(page.page + 1).hx_vals())
        .transpose()?;

    let current = params.hx_vals()?;

    Ok(html! {
        div hx-get="/internal/students" hx-vals=(current) hx-trigger="sse:students_changed" hx-swap="outerHTML" class="flex flex-col space-y-4" {
            @if page.items.is_empty() {
                p class="italic text-gray-400" {"No students found."}
            } @else {
                (table)
            }
            div class="flex flex-row items-center justify-between" {
                @if let Some(previous) = previous {
                    button class="bg-slate-600 hover:bg-slate-800 py-1 px-2 rounded" hx-get="/internal/students" hx-vals=(previous) hx-target="#student_list" {"Previous"}
                } @else {
                    span {}
                }
                p class="text-gray-400" {
                    "Page " (page.page) " of " (page.page_count()) " (" (page.total) " students)"
                }
                @if let Some(next) = next {
                    button class="bg-slate-600 hover:bg-slate-800 py-1 px-2 rounded" hx-get="/internal/students" hx-vals=(next) hx-target="#student_list" {"Next"}
                } @else {
                    span {}
                }
            }
        }
    })
}

/// What the add and edit forms post. Age stays a string so a typo becomes a validation message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentFormInput {
    pub first_name: String,
    pub last_name: String,
    pub age: String,
    #[serde(default)]
    pub grade: String,
}

impl StudentFormInput {
    pub fn into_form(self) -> RosterResult<StudentForm> {
        match self.age.trim().parse::<i32>() {
            Ok(age) => Ok(StudentForm::new(
                self.first_name,
                self.last_name,
                age,
                Some(self.grade.as_str()),
            )),
            Err(_) => {
                //any in-range age, so only the other fields get checked
                let rest = StudentForm::new(
                    self.first_name,
                    self.last_name,
                    MIN_AGE_EXCLUSIVE + 1,
                    Some(self.grade.as_str()),
                );
                let mut reasons = vec!["Age must be a whole number".to_string()];
                reasons.extend(rest.validation_errors());
                Err(RosterError::Validation { reasons })
            }
        }
    }
}

impl From<&Student> for StudentFormInput {
    fn from(student: &Student) -> Self {
        Self {
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            age: student.age.to_string(),
            grade: student.grade.clone().unwrap_or_default(),
        }
    }
}

fn student_form(target: StudentFormTarget, previous: &StudentFormInput, errors: &[String]) -> Markup {
    let (heading, button_text) = match target {
        StudentFormTarget::New => ("Add New Student", "Add Student"),
        StudentFormTarget::Existing(_) => ("Edit Student", "Save Changes"),
    };

    let form = html! {
        (simple_form_element("first_name", "First Name", true, None, Some(previous.first_name.as_str())))
        (simple_form_element("last_name", "Last Name", true, None, Some(previous.last_name.as_str())))
        (simple_form_element("age", "Age", true, Some("number"), Some(previous.age.as_str())))
        (simple_form_element("grade", "Grade", false, None, Some(previous.grade.as_str())))
        (form_submit_button(Some(button_text)))
    };

    html! {
        (title(heading))
        @if !errors.is_empty() {
            (errors_list(Some("Please fix the following:"), errors))
        }
        @match target {
            StudentFormTarget::New => {
                form hx-put="/internal/students" hx-target="#in_focus" class="p-4" {(form)}
            }
            StudentFormTarget::Existing(id) => {
                form hx-post={"/internal/students/" (id)} hx-target="#in_focus" class="p-4" {(form)}
            }
        }
    }
}

#[derive(Debug, Copy, Clone)]
enum StudentFormTarget {
    New,
    Existing(i32),
}

pub async fn internal_get_new_student_form(session: RosterSession) -> RosterResult<Markup> {
    session.ensure_can(PermissionsTarget::CRUD_STUDENTS)?;
    Ok(student_form(StudentFormTarget::New, &StudentFormInput::default(), &[]))
}

pub async fn internal_put_new_student(
    State(state): State<RosterState>,
    session: RosterSession,
    Form(input): Form<StudentFormInput>,
) -> RosterResult<Markup> {
    session.ensure_can(PermissionsTarget::CRUD_STUDENTS)?;

    let created = match input.clone().into_form() {
        Ok(form) => state.students().create_student(form).await,
        Err(e) => Err(e),
    };

    match created {
        Ok(student) => Ok(student_in_detail(&student, true)),
        Err(RosterError::Validation { reasons }) => {
            Ok(student_form(StudentFormTarget::New, &input, &reasons))
        }
        Err(e) => Err(e),
    }
}

pub async fn internal_get_edit_student_form(
    State(state): State<RosterState>,
    session: RosterSession,
    Path(id): Path<i32>,
) -> RosterResult<Markup> {
    session.ensure_can(PermissionsTarget::CRUD_STUDENTS)?;

    let student = state.students().get_student(id).await?;
    Ok(student_form(
        StudentFormTarget::Existing(id),
        &StudentFormInput::from(&student),
        &[],
    ))
}

pub async fn internal_post_update_student(
    State(state): State<RosterState>,
    session: RosterSession,
    Path(id): Path<i32>,
    Form(input): Form<StudentFormInput>,
) -> RosterResult<Markup> {
    session.ensure_can(PermissionsTarget::CRUD_STUDENTS)?;

    let updated = match input.clone().into_form() {
        Ok(form) => state.students().update_student(id, form).await,
        Err(e) => Err(e),
    };

    match updated {
        Ok(student) => Ok(student_in_detail(&student, true)),
        Err(RosterError::Validation { reasons }) => Ok(student_form(
            StudentFormTarget::Existing(id),
            &input,
            &reasons,
        )),
        Err(e) => Err(e),
    }
}

pub async fn internal_get_student_in_detail(
    State(state): State<RosterState>,
    session: RosterSession,
    Path(id): Path<i32>,
) -> RosterResult<Markup> {
    session.ensure_can(PermissionsTarget::VIEW_STUDENTS)?;

    let student = state.students().get_student(id).await?;
    Ok(student_in_detail(
        &student,
        session.can(PermissionsTarget::CRUD_STUDENTS),
    ))
}

pub async fn get_student_page(
    State(state): State<RosterState>,
    session: RosterSession,
    Path(id): Path<i32>,
) -> RosterResult<Response<Body>> {
    if !session.can(PermissionsTarget::VIEW_STUDENTS) {
        return Ok(Redirect::to(&format!("/login?to=/students/{id}")).into_response());
    }

    let student = state.students().get_student(id).await?;
    let can_edit = session.can(PermissionsTarget::CRUD_STUDENTS);

    Ok(state
        .render(session, html! {
            div class="mx-auto bg-gray-800 p-8 rounded shadow-md max-w-xl w-full flex flex-col space-y-4" {
                div id="in_focus" {
                    (student_in_detail(&student, can_edit))
                }
                a href="/students" class="underline text-gray-300" {"Back to all students"}
            }
        })
        .into_response())
}

fn student_in_detail(student: &Student, can_edit: bool) -> Markup {
    let detail = |label: &str, value: Markup| {
        html! {
            p class="text-gray-200 font-semibold py-1" {
                (label) ": "
                span class="font-medium" {(value)}
            }
        }
    };

    html! {
        div hx-get={"/internal/students/" (student.id)} hx-trigger="sse:students_changed" hx-swap="outerHTML" class="container mx-auto" {
            (title(student.full_name()))
            div class="rounded-lg shadow-md overflow-hidden bg-gray-700 max-w-md mx-auto p-4" {
                (detail("Age", html! {(student.age)}))
                (detail("Grade", html! {(student.grade_display())}))
                (detail("Mention", html! {(student.mention())}))
                (detail("Added", html! {(student.formatted_created_at())}))
                (detail("Last changed", html! {(student.formatted_updated_at())}))
            }
            @if can_edit {
                div class="flex flex-row space-x-4 justify-center p-4" {
                    button class="bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded" hx-get={"/internal/students/" (student.id) "/edit_form"} hx-target="#in_focus" {"Edit"}
                    button class="bg-red-600 hover:bg-red-800 font-bold py-2 px-4 rounded" hx-delete="/internal/students" hx-vals={"{\"id\": " (student.id) "}"} hx-target="#in_focus" hx-confirm={"Delete " (student.full_name()) "?"} {"Delete"}
                }
            }
        }
    }
}

pub async fn delete_student(
    State(state): State<RosterState>,
    session: RosterSession,
    Query(IdForm { id }): Query<IdForm>,
) -> RosterResult<Markup> {
    session.ensure_can(PermissionsTarget::CRUD_STUDENTS)?;

    state.students().delete_student(id).await?;

    Ok(html! {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::student::MAX_GRADE_LEN;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        let value: serde_json::Map<String, serde_json::Value> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), serde_json::Value::String((*v).to_string())))
            .collect();
        serde_json::from_value(serde_json::Value::Object(value)).unwrap()
    }

    #[test]
    fn empty_params_mean_an_unfiltered_first_page() {
        let params = ListParams::default();
        let query = params.query();

        assert!(!query.filter.is_active());
        assert_eq!(query.sort, SortKey::LastName);
        assert!(!query.descending);

        let page = params.page_request(10).unwrap();
        assert_eq!(page.page(), 1);
        assert_eq!(page.page_size(), 10);
    }

    #[test]
    fn filters_are_read_from_strings() {
        let query = params(&[
            ("search", "smi"),
            ("grade", "A"),
            ("min_age", "18"),
            ("max_age", " 25 "),
            ("sort", "age"),
            ("desc", "on"),
        ])
        .query();

        assert!(query.filter.is_active());
        assert_eq!(query.filter.search_term.as_deref(), Some("smi"));
        assert_eq!(query.filter.grade.as_deref(), Some("A"));
        assert_eq!(query.filter.age_range, AgeRange { min: 18, max: 25 });
        assert_eq!(query.sort, SortKey::Age);
        assert!(query.descending);
    }

    #[test]
    fn garbage_ages_are_ignored() {
        let query = params(&[("min_age", "abc"), ("max_age", "")]).query();
        assert_eq!(query.filter.age_range, AgeRange::default());
    }

    #[test]
    fn non_positive_pages_are_rejected() {
        let err = params(&[("page", "0")]).page_request(10).unwrap_err();
        assert!(matches!(err, RosterError::InvalidPage { page: 0, .. }));

        let err = params(&[("page_size", "-5")]).page_request(10).unwrap_err();
        assert!(matches!(err, RosterError::InvalidPage { page_size: -5, .. }));
    }

    #[test]
    fn sorting_on_the_same_column_flips_direction() {
        let start = params(&[("sort", "age"), ("page", "3")]);

        let flipped = start.with_sort(SortKey::Age);
        assert!(flipped.descending());
        assert_eq!(flipped.page, None);

        let back = flipped.with_sort(SortKey::Age);
        assert!(!back.descending());

        let other = flipped.with_sort(SortKey::Grade);
        assert_eq!(other.sort_key(), SortKey::Grade);
        assert!(!other.descending());
    }

    #[test]
    fn hx_vals_skip_missing_values() {
        let vals = params(&[("search", "a\"b")]).with_page(2).hx_vals().unwrap();
        assert_eq!(vals, r#"{"search":"a\"b","page":"2"}"#);
    }

    #[test]
    fn unparseable_age_is_a_validation_error() {
        let input = StudentFormInput {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            age: "twenty".into(),
            grade: String::new(),
        };

        match input.into_form() {
            Err(RosterError::Validation { reasons }) => {
                assert_eq!(reasons, vec!["Age must be a whole number".to_string()]);
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_age_keeps_the_other_problems() {
        let input = StudentFormInput {
            first_name: "   ".into(),
            last_name: "Lovelace".into(),
            age: String::new(),
            grade: "A very long grade".into(),
        };

        match input.into_form() {
            Err(RosterError::Validation { reasons }) => assert_eq!(
                reasons,
                vec![
                    "Age must be a whole number".to_string(),
                    "First name is required".to_string(),
                    format!("Grade cannot be longer than {MAX_GRADE_LEN} characters"),
                ]
            ),
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn form_input_becomes_a_student_form() {
        let input = StudentFormInput {
            first_name: " Ada ".into(),
            last_name: "Lovelace".into(),
            age: " 36 ".into(),
            grade: "A".into(),
        };

        let form = input.into_form().unwrap().normalised();
        assert_eq!(form, StudentForm::new("Ada", "Lovelace", 36, Some("A")));
    }
}
