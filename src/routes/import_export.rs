use crate::{
    auth::{AuthUtilities, PermissionsTarget, RosterSession},
    error::{MultipartSnafu, RosterError, RosterResult},
    jobs::{JobId, JobStatus},
    routes::sse::SseEvent,
    maud_conveniences::{errors_list, form_submit_button, render_table, subtitle, success_banner, title},
    service::ImportReport,
    state::RosterState,
    transfer::FileFormat,
};
use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::{Response, header},
    response::IntoResponse,
};
use chrono::Local;
use maud::{Markup, html};
use serde::Deserialize;
use snafu::ResultExt;
use std::path::Path;

pub const IMPORT_FIELD: &str = "students_file";

pub async fn get_import_export_page(
    State(state): State<RosterState>,
    session: RosterSession,
) -> RosterResult<Markup> {
    session.ensure_can(PermissionsTarget::EXPORT_FILES)?;
    let can_import = session.can(PermissionsTarget::IMPORT_FILES);

    let accepted = FileFormat::ALL
        .iter()
        .map(|format| format!(".{}", format.extension()))
        .collect::<Vec<_>>()
        .join(",");

    Ok(state.render(session, html! {
        div class="mx-auto flex flex-row justify-center p-2 m-2 rounded gap-x-8" {
            div class="rounded shadow-xl flex flex-col p-4 m-2 bg-gray-800" {
                (title(html! {p class="text-pink-400" {"Export"}}))
                p class="mb-4 text-gray-300" {"Download every student in one of these formats:"}
                div class="flex flex-col space-y-2" {
                    @for format in FileFormat::ALL {
                        a href={"/import_export/export?format=" (format.extension())} class="bg-pink-600 hover:bg-pink-700 font-bold py-2 px-4 rounded text-center" {
                            (format.description())
                        }
                    }
                }
            }

            @if can_import {
                div class="rounded shadow-xl flex flex-col p-4 m-2 bg-gray-800" {
                    (title(html! {p class="text-pink-400" {"Import"}}))
                    div id="import_students_form" {
                        (render_table(
                            [html! {"Column"}, html! {"Example"}, html! {"Required"}],
                            [
                                ["firstName", "Ada", "✅"],
                                ["lastName", "Lovelace", "✅"],
                                ["age", "36", "✅"],
                                ["grade", "A", "❌"],
                            ]
                            .map(|row| row.map(|cell| html! {(cell)})),
                        ))
                        p class="italic py-2" {"The format is picked from the file extension. Bad records are skipped and listed afterwards."}

                        form hx-put="/import_export/import" hx-swap="innerHTML" hx-target="#import_students_form" hx-encoding="multipart/form-data" {
                            label for=(IMPORT_FIELD) class="block text-sm font-medium text-gray-400 mb-2" {"Upload Students File"}
                            input type="file" name=(IMPORT_FIELD) id=(IMPORT_FIELD) accept=(accepted) required class="block w-full text-sm text-gray-300 file:mr-4 file:py-2 file:px-4 file:rounded file:border-0 file:text-sm file:font-semibold file:bg-violet-50 file:text-violet-700 hover:file:bg-violet-100 mb-4";

                            (form_submit_button(Some("Import Students")))
                        }
                    }
                }
            }
        }
    }))
}

#[derive(Deserialize)]
pub struct ExportQuery {
    format: String,
}

pub async fn get_export(
    State(state): State<RosterState>,
    session: RosterSession,
    Query(ExportQuery { format }): Query<ExportQuery>,
) -> RosterResult<Response<Body>> {
    session.ensure_can(PermissionsTarget::EXPORT_FILES)?;

    let format = FileFormat::from_extension(&format)?;
    let bytes = state.students().export(format).await?;
    let file_name = format.file_name(&format!(
        "students_{}",
        Local::now().format("%Y%m%d_%H%M%S")
    ));

    Ok((
        [
            (header::CONTENT_TYPE, format.mime_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

pub async fn put_import(
    State(state): State<RosterState>,
    session: RosterSession,
    mut multipart: Multipart,
) -> RosterResult<Markup> {
    session.ensure_can(PermissionsTarget::IMPORT_FILES)?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.context(MultipartSnafu)? {
        if field.name() != Some(IMPORT_FIELD) {
            continue;
        }

        let format = FileFormat::from_path(Path::new(field.file_name().unwrap_or_default()))?;
        let bytes = field.bytes().await.context(MultipartSnafu)?;
        upload = Some((format, bytes));
    }

    let Some((format, bytes)) = upload else {
        return Err(RosterError::Validation {
            reasons: vec!["No file was uploaded".to_string()],
        });
    };

    let students = state.students().clone();
    let id = state
        .import_jobs()
        .submit(async move { students.import(format, &bytes).await });
    info!(%id, %format, "Started import job");

    get_import_checker(
        State(state),
        session,
        Query(ImportCheckerQuery {
            job: id,
            dots: String::new(),
        }),
    )
    .await
}

#[derive(Deserialize)]
pub struct ImportCheckerQuery {
    job: JobId,
    #[serde(default)]
    dots: String,
}

pub async fn get_import_checker(
    State(state): State<RosterState>,
    session: RosterSession,
    Query(ImportCheckerQuery { job, dots }): Query<ImportCheckerQuery>,
) -> RosterResult<Markup> {
    session.ensure_can(PermissionsTarget::IMPORT_FILES)?;

    match state.import_jobs().status(job) {
        JobStatus::Unknown => return Err(RosterError::MissingJob { id: job }),
        JobStatus::Finished { .. } => {
            return match state.import_jobs().take_result(job) {
                Some(Ok(report)) => Ok(render_report(&report)),
                Some(Err(e)) => Ok(errors_list(Some("The import failed:"), [e.to_string()])),
                None => Err(RosterError::MissingJob { id: job }),
            };
        }
        JobStatus::Running => {}
    }

    Ok(render_progress(job, &dots))
}

/// Polls every second, and straight away when the feed says an import finished.
fn render_progress(job: JobId, dots: &str) -> Markup {
    let dots = match dots {
        "." => "..",
        ".." => "...",
        "..." => "",
        _ => ".",
    };

    let hx_vals = html! {
        "{\"job\": " (job) ", \"dots\": \"" (dots) "\"}"
    };
    let trigger = format!("every 1s, sse:{}", SseEvent::ImportFinished.name());

    html! {
        div hx-get="/import_export/import_checker" hx-vals=(hx_vals) hx-trigger=(trigger) hx-target="this" hx-swap="outerHTML" {
            div class="flex items-center justify-center p-4 m-4 shadow rounded" {
                p {
                    "Currently importing students" (dots)
                }
            }
        }
    }
}

fn render_report(report: &ImportReport) -> Markup {
    html! {
        (success_banner(format!(
            "Imported {} student(s), skipped {}.",
            report.imported, report.skipped
        )))
        @if !report.problems.is_empty() {
            (subtitle("Skipped records"))
            (errors_list(None, &report.problems))
        }
        a href="/students" class="underline text-gray-300" {"View students"}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::RejectedRecord;

    #[test]
    fn report_lists_every_problem() {
        let report = ImportReport {
            imported: 2,
            skipped: 1,
            problems: vec![
                RejectedRecord::new(
                    "line 3",
                    RosterError::Validation {
                        reasons: vec!["Age must be greater than 0".into()],
                    },
                )
                .to_string(),
            ],
        };

        let rendered = render_report(&report).into_string();
        assert!(rendered.contains("Imported 2 student(s), skipped 1."));
        assert!(rendered.contains("line 3: Invalid input: Age must be greater than 0"));
    }

    #[test]
    fn progress_refreshes_when_an_import_finishes() {
        let job: JobId = serde_json::from_str("7").unwrap();
        let rendered = render_progress(job, ".").into_string();

        assert!(rendered.contains(r#"hx-trigger="every 1s, sse:import_finished""#));
        assert!(rendered.contains("Currently importing students.."));
    }

    #[test]
    fn clean_report_has_no_problem_list() {
        let report = ImportReport {
            imported: 4,
            skipped: 0,
            problems: vec![],
        };

        assert!(!render_report(&report).into_string().contains("Skipped records"));
    }
}
