use crate::{
    auth::{AuthUtilities, RosterSession},
    error::{RosterError, RosterResult},
    maud_conveniences::{errors_list, form_submit_button, simple_form_element, success_banner, title},
    state::RosterState,
};
use axum::{
    Form,
    body::Body,
    extract::State,
    http::Response,
    response::{IntoResponse, Redirect},
};
use maud::{Markup, html};
use secrecy::SecretString;
use serde::Deserialize;

fn password_page(
    state: &RosterState,
    session: RosterSession,
    errors: &[String],
    changed: bool,
) -> Markup {
    let heading = session
        .user
        .as_ref()
        .map(|user| html! { (user) " (" (user.role.as_str()) ")" });

    state.render(session, html! {
        div class="bg-gray-800 shadow-md rounded px-8 pt-6 pb-8 mb-4 w-full max-w-md" {
            (title("Change Password"))
            @if let Some(heading) = heading {
                p class="text-gray-400 mb-4" {(heading)}
            }
            @if changed {
                (success_banner("Password changed."))
            }
            @if !errors.is_empty() {
                (errors_list(Some("Password not changed:"), errors))
            }
            form method="post" {
                (simple_form_element("current_password", "Current Password", true, Some("password"), None))
                (simple_form_element("new_password", "New Password", true, Some("password"), None))
                (simple_form_element("confirmed_password", "Confirm Password", true, Some("password"), None))
                (form_submit_button(Some("Set New Password")))
            }
        }
    })
}

pub async fn get_change_password(
    State(state): State<RosterState>,
    session: RosterSession,
) -> Response<Body> {
    if session.user.is_none() {
        return Redirect::to("/login?to=/profile/password").into_response();
    }

    password_page(&state, session, &[], false).into_response()
}

#[derive(Deserialize)]
pub struct ChangePasswordForm {
    current_password: SecretString,
    new_password: SecretString,
    confirmed_password: SecretString,
}

pub async fn post_change_password(
    State(state): State<RosterState>,
    mut session: RosterSession,
    Form(ChangePasswordForm {
        current_password,
        new_password,
        confirmed_password,
    }): Form<ChangePasswordForm>,
) -> RosterResult<Response<Body>> {
    let id = session.logged_in_user()?.id;

    match state
        .accounts()
        .change_password(id, current_password, new_password, confirmed_password)
        .await
    {
        Ok(()) => {
            //the stored hash changed, so the session has to be re-issued to stay valid
            if let Some(user) = state.accounts().get_user(id).await? {
                session.login(&user).await?;
            }
            Ok(password_page(&state, session, &[], true).into_response())
        }
        Err(RosterError::Validation { reasons }) => {
            Ok(password_page(&state, session, &reasons, false).into_response())
        }
        Err(e) => Err(e),
    }
}
