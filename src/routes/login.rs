use crate::{
    auth::{RosterSession, backend::RosterAuthCredentials},
    error::RosterResult,
    maud_conveniences::{form_submit_button, simple_form_element, title},
    state::RosterState,
};
use axum::{
    Form,
    body::Body,
    extract::{Query, State},
    http::Response,
    response::{IntoResponse, Redirect},
};
use maud::html;
use secrecy::SecretString;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct LoginOptions {
    pub to: Option<String>,
    pub login_failed: Option<bool>,
    pub registered: Option<bool>,
}

/// Only relative targets are followed after logging in.
fn local_target(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") => next,
        _ => "/",
    }
}

pub async fn get_login(
    State(state): State<RosterState>,
    session: RosterSession,
    Query(LoginOptions {
        to,
        login_failed,
        registered,
    }): Query<LoginOptions>,
) -> Response<Body> {
    if session.user.is_some() {
        return Redirect::to("/").into_response();
    }

    let login_failed = login_failed.unwrap_or(false);

    state.render(session, html! {
        div class="bg-gray-800 shadow-md rounded px-8 pt-6 pb-8 mb-4 w-full max-w-sm" {
            (title("Login"))
            @if registered.unwrap_or(false) {
                div role="status" class="bg-green-100 border border-green-400 text-green-800 px-4 py-4 rounded relative mb-4" {
                    "Account created, you can log in now."
                }
            }
            @if login_failed {
                div role="alert" class="bg-red-100 border border-red-400 text-red-700 px-4 py-4 rounded relative" {
                    strong class="font-bold" {"Alert!"}
                    br;
                    // same message either way so usernames can't be probed
                    span class="block sm:inline" {"Username/Password not found or password incorrect"}
                }
                br;
            }

            form method="post" {
                @if let Some(to) = to {
                    input type="hidden" name="next" value=(to) {}
                }
                (simple_form_element("username", "Username", true, None, None))
                (simple_form_element("password", "Password", true, Some("password"), None))
                (form_submit_button(Some("Login")))
            }
            p class="text-sm text-gray-400 mt-4" {
                "No account yet? "
                a href="/register" class="underline" {"Register"}
            }
        }
    }).into_response()
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: SecretString,
    next: Option<String>,
}

pub async fn post_login(
    mut session: RosterSession,
    Form(LoginForm {
        username,
        password,
        next,
    }): Form<LoginForm>,
) -> RosterResult<Redirect> {
    match session
        .authenticate(RosterAuthCredentials { username, password })
        .await?
    {
        Some(user) => {
            session.login(&user).await?;
            Ok(Redirect::to(local_target(next.as_deref())))
        }
        None => {
            let mut redirect = "/login?login_failed=true".to_string();
            if let Some(next) = next {
                redirect += format!("&to={next}").as_str();
            }
            Ok(Redirect::to(&redirect))
        }
    }
}

pub async fn post_logout(mut session: RosterSession) -> RosterResult<impl IntoResponse> {
    session.logout().await?;
    Ok(Redirect::to("/"))
}
