//! Deliberately minimal XML: one element per line, exactly the shape [`export`] writes.
//!
//! [`parse`] only understands that layout. Elements spread over several lines or several
//! elements on one line are not recognised.

use super::{ParseOutcome, ParsedRecord, RejectedRecord, format_timestamp};
use crate::{
    data::student::{Student, StudentForm},
    error::{RosterResult, Utf8Snafu},
};
use snafu::ResultExt;
use std::fmt::Write;

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            //line breaks would split the element over lines, which `parse` can't read back
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn unescape(text: &str) -> String {
    //&amp; goes last so `&amp;lt;` comes back as `&lt;` rather than `<`
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#10;", "\n")
        .replace("&#13;", "\r")
        .replace("&amp;", "&")
}

pub fn export(students: &[Student]) -> Vec<u8> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<students>\n");

    for student in students {
        //writing into a String can't fail
        let _ = write!(
            out,
            "  <student>\n    <id>{}</id>\n    <firstName>{}</firstName>\n    <lastName>{}</lastName>\n    <fullName>{}</fullName>\n    <age>{}</age>\n    <grade>{}</grade>\n    <createdAt>{}</createdAt>\n    <updatedAt>{}</updatedAt>\n  </student>\n",
            student.id,
            escape(&student.first_name),
            escape(&student.last_name),
            escape(&student.full_name()),
            student.age,
            escape(student.grade.as_deref().unwrap_or_default()),
            format_timestamp(student.created_at),
            format_timestamp(student.updated_at),
        );
    }

    out.push_str("</students>\n");
    out.into_bytes()
}

fn element<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.strip_prefix('<')?
        .strip_prefix(tag)?
        .strip_prefix('>')?
        .strip_suffix('>')?
        .strip_suffix(tag)?
        .strip_suffix("</")
}

#[derive(Default)]
struct Draft {
    first_name: String,
    last_name: String,
    age: Option<Result<i32, String>>,
    grade: Option<String>,
}

impl Draft {
    fn finish(self, location: String) -> ParseOutcome {
        let age = match self.age {
            Some(Ok(age)) => age,
            Some(Err(raw)) => {
                return Err(RejectedRecord::new(location, format!("{raw:?} is not an age")));
            }
            None => return Err(RejectedRecord::new(location, "missing <age>")),
        };

        let form = StudentForm {
            first_name: self.first_name,
            last_name: self.last_name,
            age,
            grade: self.grade,
        }
        .normalised();
        Ok(ParsedRecord::new(location, form))
    }
}

pub fn parse(contents: &[u8]) -> RosterResult<Vec<ParseOutcome>> {
    let contents = String::from_utf8(contents.to_vec()).context(Utf8Snafu)?;

    let mut records = vec![];
    let mut current: Option<(usize, Draft)> = None;

    for (i, line) in contents.lines().enumerate() {
        let line = line.trim();
        let line_no = i + 1;

        if line == "<student>" {
            current = Some((line_no, Draft::default()));
        } else if line == "</student>" {
            if let Some((start, draft)) = current.take() {
                records.push(draft.finish(format!("student starting on line {start}")));
            }
        } else if let Some((_, draft)) = &mut current {
            if let Some(value) = element(line, "firstName") {
                draft.first_name = unescape(value);
            } else if let Some(value) = element(line, "lastName") {
                draft.last_name = unescape(value);
            } else if let Some(value) = element(line, "age") {
                draft.age = Some(value.trim().parse().map_err(|_| value.to_string()));
            } else if let Some(value) = element(line, "grade") {
                draft.grade = Some(unescape(value));
            }
        }
    }

    Ok(records)
}
