//! Reading and writing whole rosters as CSV, JSON or XML files.

use crate::{
    data::student::{Student, StudentForm},
    error::{RosterResult, UnsupportedFormatSnafu},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use snafu::OptionExt;
use std::{fmt, path::Path};

mod csv;
mod json;
mod xml;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Json,
    Xml,
}

impl FileFormat {
    pub const ALL: [Self; 3] = [Self::Csv, Self::Json, Self::Xml];

    pub fn from_extension(extension: &str) -> RosterResult<Self> {
        match extension.trim().trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            _ => UnsupportedFormatSnafu { extension }.fail(),
        }
    }

    pub fn from_path(path: &Path) -> RosterResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .with_context(|| UnsupportedFormatSnafu {
                extension: path.display().to_string(),
            })?;
        Self::from_extension(extension)
    }

    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Xml => "xml",
        }
    }

    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Json => "application/json",
            Self::Xml => "application/xml",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Csv => "CSV (comma separated values)",
            Self::Json => "JSON (JavaScript Object Notation)",
            Self::Xml => "XML (eXtensible Markup Language)",
        }
    }

    pub fn file_name(self, stem: &str) -> String {
        format!("{stem}.{}", self.extension())
    }

    /// Serialises every student into a complete file. Nothing is written anywhere here.
    pub fn export(self, students: &[Student], exported_at: NaiveDateTime) -> RosterResult<Vec<u8>> {
        match self {
            Self::Csv => csv::export(students),
            Self::Json => json::export(students, exported_at),
            Self::Xml => Ok(xml::export(students)),
        }
    }

    /// Splits a file into one outcome per record. Only problems with the file as a whole are errors.
    pub fn parse(self, contents: &[u8]) -> RosterResult<Vec<ParseOutcome>> {
        match self {
            Self::Csv => Ok(csv::parse(contents)),
            Self::Json => json::parse(contents),
            Self::Xml => xml::parse(contents),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

pub type ParseOutcome = Result<ParsedRecord, RejectedRecord>;

/// A record that was read, and where in the file it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub location: String,
    pub form: StudentForm,
}

impl ParsedRecord {
    pub fn new(location: impl Into<String>, form: StudentForm) -> Self {
        Self {
            location: location.into(),
            form,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub location: String,
    pub reason: String,
}

impl RejectedRecord {
    pub fn new(location: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for RejectedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.reason)
    }
}
