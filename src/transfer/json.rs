use super::{ParseOutcome, ParsedRecord, RejectedRecord};
use crate::{
    data::student::{Student, StudentForm},
    error::{JsonSnafu, RosterResult},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::ResultExt;

#[derive(Serialize)]
struct ExportInfo {
    export_date: NaiveDateTime,
    total_students: usize,
    application: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    average_age: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    students_with_grades: Option<usize>,
}

impl ExportInfo {
    fn new(students: &[Student], export_date: NaiveDateTime) -> Self {
        let (average_age, students_with_grades) = if students.is_empty() {
            (None, None)
        } else {
            #[allow(clippy::cast_precision_loss)]
            let average = students.iter().map(|s| f64::from(s.age)).sum::<f64>()
                / students.len() as f64;
            let graded = students.iter().filter(|s| s.has_grade()).count();
            (Some((average * 100.0).round() / 100.0), Some(graded))
        };

        Self {
            export_date,
            total_students: students.len(),
            application: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            average_age,
            students_with_grades,
        }
    }
}

#[derive(Serialize)]
struct ExportedStudent<'a> {
    id: i32,
    first_name: &'a str,
    last_name: &'a str,
    full_name: String,
    age: i32,
    grade: Option<&'a str>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl<'a> From<&'a Student> for ExportedStudent<'a> {
    fn from(student: &'a Student) -> Self {
        Self {
            id: student.id,
            first_name: &student.first_name,
            last_name: &student.last_name,
            full_name: student.full_name(),
            age: student.age,
            grade: student.grade.as_deref(),
            created_at: student.created_at,
            updated_at: student.updated_at,
        }
    }
}

#[derive(Serialize)]
struct Export<'a> {
    export_info: ExportInfo,
    students: Vec<ExportedStudent<'a>>,
}

pub fn export(students: &[Student], exported_at: NaiveDateTime) -> RosterResult<Vec<u8>> {
    let export = Export {
        export_info: ExportInfo::new(students, exported_at),
        students: students.iter().map(ExportedStudent::from).collect(),
    };

    serde_json::to_vec_pretty(&export).context(JsonSnafu)
}

/// Either a bare array of students, or a whole file as produced by [`export`].
#[derive(Deserialize)]
#[serde(untagged)]
enum Import {
    Bare(Vec<Value>),
    Exported { students: Vec<Value> },
}

#[derive(Deserialize)]
struct ImportedStudent {
    #[serde(alias = "firstName")]
    first_name: String,
    #[serde(alias = "lastName")]
    last_name: String,
    age: i32,
    #[serde(default)]
    grade: Option<String>,
}

pub fn parse(contents: &[u8]) -> RosterResult<Vec<ParseOutcome>> {
    let (Import::Bare(records) | Import::Exported { students: records }) =
        serde_json::from_slice(contents).context(JsonSnafu)?;

    Ok(records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let location = format!("record {}", i + 1);
            //ids, full names and timestamps are dropped - the database hands out new ones
            let ImportedStudent {
                first_name,
                last_name,
                age,
                grade,
            } = serde_json::from_value(record)
                .map_err(|e| RejectedRecord::new(&location, e))?;

            let form = StudentForm {
                first_name,
                last_name,
                age,
                grade,
            }
            .normalised();
            Ok(ParsedRecord::new(location, form))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    fn student(id: i32, age: i32, grade: Option<&str>) -> Student {
        Student {
            id,
            first_name: "Marie".into(),
            last_name: "Curie".into(),
            age,
            grade: grade.map(Into::into),
            created_at: at(),
            updated_at: at(),
        }
    }

    #[test]
    fn export_info_has_statistics_when_non_empty() {
        let students = [
            student(1, 20, Some("A")),
            student(2, 21, None),
            student(3, 21, Some(" ")),
        ];
        let bytes = export(&students, at()).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();

        let info = &value["export_info"];
        assert_eq!(info["total_students"], 3);
        assert_eq!(info["average_age"], 20.67);
        assert_eq!(info["students_with_grades"], 1);
        assert_eq!(info["export_date"], "2025-06-01T08:30:00");

        let first = &value["students"][0];
        assert_eq!(first["full_name"], "Marie Curie");
        assert_eq!(first["grade"], "A");
        assert_eq!(value["students"][1]["grade"], Value::Null);
    }

    #[test]
    fn export_info_omits_statistics_when_empty() {
        let value: Value = serde_json::from_slice(&export(&[], at()).unwrap()).unwrap();
        let info = value["export_info"].as_object().unwrap();
        assert_eq!(info["total_students"], 0);
        assert!(!info.contains_key("average_age"));
        assert!(!info.contains_key("students_with_grades"));
    }

    #[test]
    fn parse_accepts_both_shapes_and_key_styles() {
        let bare = r#"[{"id": 9, "firstName": "Ada", "lastName": "Lovelace", "age": 36, "grade": "A"}]"#;
        assert_eq!(
            parse(bare.as_bytes()).unwrap(),
            vec![Ok(ParsedRecord::new(
                "record 1",
                StudentForm::new("Ada", "Lovelace", 36, Some("A"))
            ))]
        );

        let exported = export(&[student(4, 30, None)], at()).unwrap();
        assert_eq!(
            parse(&exported).unwrap(),
            vec![Ok(ParsedRecord::new(
                "record 1",
                StudentForm::new("Marie", "Curie", 30, None)
            ))]
        );
    }

    #[test]
    fn bad_records_are_rejected_individually() {
        let json = r#"[{"first_name": "Ada"}, {"first_name": "Alan", "last_name": "Turing", "age": 41}]"#;
        let parsed = parse(json.as_bytes()).unwrap();
        assert_eq!(parsed[0].clone().unwrap_err().location, "record 1");
        assert_eq!(
            parsed[1],
            Ok(ParsedRecord::new(
                "record 2",
                StudentForm::new("Alan", "Turing", 41, None)
            ))
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse(b"{ not json").is_err());
        assert!(parse(br#"{"something": "else"}"#).is_err());
    }
}
