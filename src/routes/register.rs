use crate::{
    auth::RosterSession,
    error::{RosterError, RosterResult},
    maud_conveniences::{errors_list, form_submit_button, simple_form_element, title},
    service::accounts::RegistrationForm,
    state::RosterState,
};
use axum::{
    Form,
    body::Body,
    extract::{Query, State},
    http::Response,
    response::{IntoResponse, Redirect},
};
use maud::{Markup, html};
use serde::Deserialize;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Availability {
    Unchecked,
    Free,
    Taken,
}

impl Availability {
    const fn from_lookup(available: bool) -> Self {
        if available { Self::Free } else { Self::Taken }
    }
}

/// Sits under a form field and re-asks the server whenever that field changes.
fn availability_check(field: &str) -> Markup {
    let trigger = format!("input changed delay:400ms from:#{field}");
    html! {
        div id={(field) "_availability"} hx-get={"/register/check_" (field)} hx-include={"#" (field)} hx-trigger=(trigger) hx-swap="innerHTML" class="-mt-3 mb-4 text-sm" {}
    }
}

fn availability_hint(what: &str, availability: Availability) -> Markup {
    html! {
        @match availability {
            Availability::Unchecked => {}
            Availability::Free => {
                p class="text-green-400" {(what) " is available"}
            }
            Availability::Taken => {
                p class="text-red-400" {(what) " is already taken"}
            }
        }
    }
}

fn registration_page(
    state: &RosterState,
    session: RosterSession,
    errors: &[String],
    previous: Option<&RegistrationForm>,
) -> Markup {
    let value = |f: fn(&RegistrationForm) -> &str| previous.map(f);

    state.render(session, html! {
        div class="bg-gray-800 shadow-md rounded px-8 pt-6 pb-8 mb-4 w-full max-w-md" {
            (title("Register"))
            @if !errors.is_empty() {
                (errors_list(Some("Unable to create the account:"), errors))
            }
            form method="post" {
                (simple_form_element("username", "Username", true, None, value(|f| &f.username)))
                (availability_check("username"))
                (simple_form_element("email", "Email", true, Some("email"), value(|f| &f.email)))
                (availability_check("email"))
                (simple_form_element("first_name", "First Name", true, None, value(|f| &f.first_name)))
                (simple_form_element("last_name", "Last Name", true, None, value(|f| &f.last_name)))
                (simple_form_element("password", "Password", true, Some("password"), None))
                (simple_form_element("confirm_password", "Confirm Password", true, Some("password"), None))
                (form_submit_button(Some("Create Account")))
            }
        }
    })
}

pub async fn get_register(
    State(state): State<RosterState>,
    session: RosterSession,
) -> Response<Body> {
    if session.user.is_some() {
        return Redirect::to("/").into_response();
    }

    registration_page(&state, session, &[], None).into_response()
}

pub async fn post_register(
    State(state): State<RosterState>,
    session: RosterSession,
    Form(form): Form<RegistrationForm>,
) -> RosterResult<Response<Body>> {
    let retained = RegistrationForm {
        username: form.username.clone(),
        email: form.email.clone(),
        first_name: form.first_name.clone(),
        last_name: form.last_name.clone(),
        password: String::new().into(),
        confirm_password: String::new().into(),
    };

    match state.accounts().register(form).await {
        Ok(_) => Ok(Redirect::to("/login?registered=true").into_response()),
        Err(RosterError::Validation { reasons }) => {
            Ok(registration_page(&state, session, &reasons, Some(&retained)).into_response())
        }
        Err(e @ (RosterError::UsernameTaken { .. } | RosterError::EmailTaken { .. })) => Ok(
            registration_page(&state, session, &[e.to_string()], Some(&retained)).into_response(),
        ),
        Err(e) => Err(e),
    }
}

#[derive(Deserialize)]
pub struct UsernameQuery {
    #[serde(default)]
    username: String,
}

pub async fn get_username_availability(
    State(state): State<RosterState>,
    Query(UsernameQuery { username }): Query<UsernameQuery>,
) -> RosterResult<Markup> {
    let availability = if username.trim().is_empty() {
        Availability::Unchecked
    } else {
        Availability::from_lookup(state.accounts().is_username_available(&username).await?)
    };

    Ok(availability_hint("Username", availability))
}

#[derive(Deserialize)]
pub struct EmailQuery {
    #[serde(default)]
    email: String,
}

pub async fn get_email_availability(
    State(state): State<RosterState>,
    Query(EmailQuery { email }): Query<EmailQuery>,
) -> RosterResult<Markup> {
    let availability = if email.trim().is_empty() {
        Availability::Unchecked
    } else {
        Availability::from_lookup(state.accounts().is_email_available(&email).await?)
    };

    Ok(availability_hint("Email", availability))
}
