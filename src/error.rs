use crate::{auth::PermissionsTarget, auth::backend::RosterAuthBackend, jobs::JobId};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_login::tower_sessions::cookie::time::{OffsetDateTime, error::ComponentRange};
use chrono::{DateTime, Utc};
use maud::html;
use snafu::Snafu;
use std::{num::ParseIntError, path::PathBuf, string::FromUtf8Error};

pub type RosterResult<T> = Result<T, RosterError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RosterError {
    #[snafu(display("Error opening database"))]
    OpenDatabase { source: sqlx::Error },
    #[snafu(display("Error getting db connection"))]
    GetDatabaseConnection { source: sqlx::Error },
    #[snafu(display("Error making SQL query"))]
    MakeQuery { source: sqlx::Error },
    #[snafu(display("Error migrating DB schema"))]
    Migrate { source: sqlx::migrate::MigrateError },
    #[snafu(display("Error converting {} to `chrono::DateTime`", odt))]
    InvalidDateTime { odt: OffsetDateTime },
    #[snafu(display("Error converting {} to `time::OffsetDateTime`", utc_dt))]
    InvalidChronoDateTime {
        source: ComponentRange,
        utc_dt: DateTime<Utc>,
    },
    #[snafu(display("Error serialising with rmp_serde"))]
    RmpSerdeEncode { source: rmp_serde::encode::Error },
    #[snafu(display("Error deserialising with rmp_serde"))]
    RmpSerdeDecode { source: rmp_serde::decode::Error },
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse env var `{}` as a number", name))]
    ParseEnvVar {
        source: ParseIntError,
        name: &'static str,
    },
    #[snafu(display("Invalid input: {}", reasons.join("; ")))]
    Validation { reasons: Vec<String> },
    #[snafu(display("Invalid page request: page {page} with page size {page_size}"))]
    InvalidPage { page: i64, page_size: i64 },
    #[snafu(display("Unable to find student with ID: {}", id))]
    MissingStudent { id: i32 },
    #[snafu(display("Unable to find user with ID: {}", id))]
    MissingUser { id: i32 },
    #[snafu(display("Unsupported file format: {:?}", extension))]
    UnsupportedFormat { extension: String },
    #[snafu(display("Username {:?} is already taken", username))]
    UsernameTaken { username: String },
    #[snafu(display("Email {:?} is already in use", email))]
    EmailTaken { email: String },
    #[snafu(display("Error with hashing/password verification"))]
    Bcrypt { source: bcrypt::BcryptError },
    #[snafu(display("Error with sessions"))]
    TowerSession {
        source: axum_login::tower_sessions::session::Error,
    },
    #[snafu(display("Tried to get user information, found no logged in user"))]
    UnableToFindUserInfo,
    #[snafu(display("Tried to {:?}, only had {:?}", needed.iter_names().collect::<Vec<_>>(), found.iter_names().collect::<Vec<_>>()))]
    IncorrectPermissions {
        needed: PermissionsTarget,
        found: PermissionsTarget,
    },
    #[snafu(display("Error with multipart form input"))]
    Multipart {
        source: axum::extract::multipart::MultipartError,
    },
    #[snafu(display("Error parsing email address"))]
    Email { source: email_address::Error },
    #[snafu(display("Error with CSVs"))]
    Csv { source: csv::Error },
    #[snafu(display("Error with JSON"))]
    Json { source: serde_json::Error },
    #[snafu(display("File contents were not valid UTF-8"))]
    Utf8 { source: FromUtf8Error },
    #[snafu(display("Unable to read {}", path.display()))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Unable to write {}", path.display()))]
    WriteFile {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Unable to join background task"))]
    JoinTask { source: tokio::task::JoinError },
    #[snafu(display("No background job with ID: {}", id))]
    MissingJob { id: JobId },
}

impl From<axum_login::Error<RosterAuthBackend>> for RosterError {
    fn from(value: axum_login::Error<RosterAuthBackend>) -> Self {
        match value {
            axum_login::Error::Session(source) => Self::TowerSession { source },
            axum_login::Error::Backend(backend) => backend,
        }
    }
}

impl RosterError {
    #[allow(clippy::match_same_arms)]
    pub fn status_code(&self) -> StatusCode {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const NF: StatusCode = StatusCode::NOT_FOUND; //not found
        const NA: StatusCode = StatusCode::FORBIDDEN; //not allowed
        const BI: StatusCode = StatusCode::BAD_REQUEST; //bad input

        match self {
            Self::OpenDatabase { .. } | Self::GetDatabaseConnection { .. } => ISE,
            Self::Migrate { .. } => ISE,
            Self::MakeQuery { source } => match source {
                sqlx::Error::RowNotFound => NF,
                _ => ISE,
            },
            Self::InvalidDateTime { .. } | Self::InvalidChronoDateTime { .. } => ISE,
            Self::RmpSerdeEncode { .. } => ISE,
            Self::RmpSerdeDecode { .. } => BI,
            Self::BadEnvVar { .. } | Self::ParseEnvVar { .. } => ISE,
            Self::Validation { .. } | Self::InvalidPage { .. } => BI,
            Self::MissingStudent { .. } | Self::MissingUser { .. } | Self::MissingJob { .. } => NF,
            Self::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::UsernameTaken { .. } | Self::EmailTaken { .. } => StatusCode::CONFLICT,
            Self::Bcrypt { .. } => ISE,
            Self::TowerSession { .. } => ISE,
            Self::UnableToFindUserInfo => StatusCode::UNAUTHORIZED,
            Self::IncorrectPermissions { .. } => NA,
            Self::Multipart { source } => source.status(),
            Self::Email { .. } => BI,
            Self::Csv { .. } | Self::Json { .. } | Self::Utf8 { .. } => BI,
            Self::ReadFile { .. } | Self::WriteFile { .. } => ISE,
            Self::JoinTask { .. } => ISE,
        }
    }
}

impl IntoResponse for RosterError {
    fn into_response(self) -> Response {
        let basic_error = |desc| {
            html! {
                div class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded relative mb-4" role="alert" {
                    strong class="font-bold" {"Roster Error: "}
                    span {(desc)}
                }
            }
        };

        let status_code = self.status_code();
        if status_code.is_server_error() {
            error!(?self, "Error!");
        } else {
            warn!(?self, "Request rejected");
        }

        (status_code, Html(basic_error(self.to_string()))).into_response()
    }
}
