use crate::{
    auth::{AuthUtilities, PermissionsTarget, RosterSession},
    error::RosterResult,
    maud_conveniences::{render_table, stat_card, subtitle, title},
    state::RosterState,
};
use axum::extract::State;
use maud::{Markup, html};

pub const TOP_STUDENT_COUNT: usize = 10;

pub async fn get_index_route(
    State(state): State<RosterState>,
    session: RosterSession,
) -> RosterResult<Markup> {
    if !session.can(PermissionsTarget::VIEW_STUDENTS) {
        return Ok(state.render(session, html! {
            div class="bg-gray-800 p-8 rounded shadow-md max-w-md w-full" {
                h1 class="text-2xl font-semibold mb-6 text-center" {"Roster"}
                p class="text-center text-gray-300 mb-6" {"Keep track of students and their grades."}
                div class="flex flex-row space-x-4 justify-center" {
                    a href="/login" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"Login"}
                    a href="/register" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"Register"}
                }
            }
        }));
    }

    let dashboard = internal_get_dashboard(State(state.clone()), session.clone()).await?;
    Ok(state.render(session, html! {
        div class="mx-auto bg-gray-800 p-8 rounded shadow-md max-w-4xl w-full flex flex-col space-y-4" {
            (title("Dashboard"))
            (dashboard)
            div class="flex flex-row space-x-4 justify-center" {
                a href="/students" class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"View Students"}
            }
        }
    }))
}

pub async fn internal_get_dashboard(
    State(state): State<RosterState>,
    session: RosterSession,
) -> RosterResult<Markup> {
    session.ensure_can(PermissionsTarget::VIEW_STUDENTS)?;

    let stats = state.students().statistics().await?;
    let top = state.students().top_students(TOP_STUDENT_COUNT).await?;

    let rows = top.into_iter().enumerate().map(|(i, student)| {
        [
            html! {(i + 1)},
            html! { a href={"/students/" (student.id)} class="underline" {(student.full_name())} },
            html! {(student.grade_display())},
            html! {(student.mention())},
        ]
    });

    Ok(html! {
        div hx-get="/internal/dashboard" hx-trigger="sse:students_changed" hx-swap="outerHTML" class="flex flex-col space-y-4" {
            div class="grid grid-cols-2 md:grid-cols-4 gap-4" {
                (stat_card("Students", stats.total))
                (stat_card("Graded", stats.graded))
                (stat_card("Average age", format!("{:.1}", stats.average_age)))
                (stat_card("Average grade", format!("{:.2} / 18", stats.average_grade)))
            }
            (subtitle("Top students"))
            (render_table(
                [html! {"#"}, html! {"Name"}, html! {"Grade"}, html! {"Mention"}],
                rows,
            ))
        }
    })
}
