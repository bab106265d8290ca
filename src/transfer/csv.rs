use super::{ParseOutcome, ParsedRecord, RejectedRecord, format_timestamp};
use crate::{
    data::student::{Student, StudentForm},
    error::{CsvSnafu, RosterResult},
};
use ::csv::{ReaderBuilder, Trim, Writer};
use snafu::ResultExt;

pub const HEADERS: [&str; 7] = [
    "ID",
    "Prénom",
    "Nom",
    "Âge",
    "Note",
    "Date de Création",
    "Date de Modification",
];

pub fn export(students: &[Student]) -> RosterResult<Vec<u8>> {
    let mut writer = Writer::from_writer(vec![]);
    writer.write_record(HEADERS).context(CsvSnafu)?;

    for student in students {
        writer
            .write_record([
                student.id.to_string(),
                student.first_name.clone(),
                student.last_name.clone(),
                student.age.to_string(),
                student.grade.clone().unwrap_or_default(),
                format_timestamp(student.created_at),
                format_timestamp(student.updated_at),
            ])
            .context(CsvSnafu)?;
    }

    writer
        .into_inner()
        .map_err(|e| ::csv::Error::from(e.into_error()))
        .context(CsvSnafu)
}

/// Skips the header row, then reads first name, last name, age and an optional grade from
/// columns 1 to 4. Any other columns are ignored.
pub fn parse(contents: &[u8]) -> Vec<ParseOutcome> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(contents);

    reader
        .records()
        .map(|record| {
            let record = record.map_err(|e| {
                let line = e.position().map_or(0, ::csv::Position::line);
                RejectedRecord::new(format!("line {line}"), e)
            })?;
            let location = format!("line {}", record.position().map_or(0, ::csv::Position::line));

            if record.len() < 4 {
                return Err(RejectedRecord::new(
                    location,
                    format!("expected at least 4 fields, found {}", record.len()),
                ));
            }

            let age = record[3]
                .parse()
                .map_err(|_| RejectedRecord::new(&location, format!("{:?} is not an age", &record[3])))?;

            let form = StudentForm::new(&record[1], &record[2], age, record.get(4)).normalised();
            Ok(ParsedRecord::new(location, form))
        })
        .collect()
}
