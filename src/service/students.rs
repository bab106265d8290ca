use crate::{
    data::{
        StudentStore,
        student::{Student, StudentForm},
    },
    error::{MissingStudentSnafu, ReadFileSnafu, RosterResult, WriteFileSnafu},
    events::{EventBus, StudentEvent},
    query::{Page, PageRequest, SortKey, StudentQuery},
    transfer::{FileFormat, ParsedRecord, RejectedRecord},
};
use chrono::Local;
use snafu::{OptionExt, ResultExt, ensure};
use std::{path::Path, sync::Arc};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    pub total: i64,
    pub graded: usize,
    pub average_age: f64,
    pub average_grade: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub problems: Vec<String>,
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = i32>) -> f64 {
    let (sum, count) = values.fold((0_i64, 0_usize), |(sum, count), v| {
        (sum + i64::from(v), count + 1)
    });
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Every student operation that touches storage goes through here, so change notifications
/// can't be skipped.
#[derive(Debug, Clone)]
pub struct StudentService<S> {
    store: S,
    bus: Arc<EventBus>,
}

impl<S: StudentStore> StudentService<S> {
    pub const fn new(store: S, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    pub const fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub async fn create_student(&self, form: StudentForm) -> RosterResult<Student> {
        let form = form.validated()?;
        let student = self.store.insert(&form).await?;
        info!(id = student.id, name = %student.full_name(), "Created student");

        self.bus.publish(&StudentEvent::Created(student.clone()));
        Ok(student)
    }

    pub async fn update_student(&self, id: i32, form: StudentForm) -> RosterResult<Student> {
        let form = form.validated()?;
        ensure!(self.store.exists(id).await?, MissingStudentSnafu { id });

        //could still have been deleted between the check and the update
        let student = self
            .store
            .update(id, &form)
            .await?
            .context(MissingStudentSnafu { id })?;
        info!(id, "Updated student");

        self.bus.publish(&StudentEvent::Updated(student.clone()));
        Ok(student)
    }

    pub async fn get_student(&self, id: i32) -> RosterResult<Student> {
        self.store
            .find_by_id(id)
            .await?
            .context(MissingStudentSnafu { id })
    }

    pub async fn delete_student(&self, id: i32) -> RosterResult<()> {
        ensure!(self.store.delete(id).await?, MissingStudentSnafu { id });
        info!(id, "Deleted student");

        self.bus.publish(&StudentEvent::Deleted { id });
        Ok(())
    }

    pub async fn all_students(&self) -> RosterResult<Vec<Student>> {
        self.store.find_all().await
    }

    /// Unfiltered listing, ordered and windowed by the database.
    pub async fn list_students(
        &self,
        page: PageRequest,
        sort: SortKey,
        descending: bool,
    ) -> RosterResult<Page<Student>> {
        let items = self
            .store
            .find_sorted(sort, descending, page.offset(), page.page_size())
            .await?;
        let total = self.store.count().await?;

        Ok(Page::new(items, total, page))
    }

    /// Filtered listing, done in memory over every student.
    pub async fn search_students(
        &self,
        query: &StudentQuery,
        page: PageRequest,
    ) -> RosterResult<Page<Student>> {
        let students = self.store.find_all().await?;
        Ok(query.run(students, page))
    }

    pub async fn student_count(&self) -> RosterResult<i64> {
        self.store.count().await
    }

    pub async fn average_age(&self) -> RosterResult<f64> {
        let students = self.store.find_all().await?;
        Ok(mean(students.iter().map(|s| s.age)))
    }

    /// Mean of the numeric grades, ignoring anyone without a recognised grade.
    pub async fn average_grade(&self) -> RosterResult<f64> {
        let students = self.store.find_all().await?;
        Ok(mean(
            students
                .iter()
                .map(Student::numeric_grade)
                .filter(|g| *g >= 0),
        ))
    }

    pub async fn statistics(&self) -> RosterResult<Statistics> {
        let students = self.store.find_all().await?;
        let graded: Vec<i32> = students
            .iter()
            .map(Student::numeric_grade)
            .filter(|g| *g >= 0)
            .collect();

        Ok(Statistics {
            total: i64::try_from(students.len()).unwrap_or(i64::MAX),
            graded: graded.len(),
            average_age: mean(students.iter().map(|s| s.age)),
            average_grade: mean(graded.into_iter()),
        })
    }

    /// The `n` best graded students, best first. Ungraded students never appear.
    pub async fn top_students(&self, n: usize) -> RosterResult<Vec<Student>> {
        let mut graded: Vec<Student> = self
            .store
            .find_all()
            .await?
            .into_iter()
            .filter(|s| s.numeric_grade() >= 0)
            .collect();
        graded.sort_by_key(|s| std::cmp::Reverse(s.numeric_grade()));
        graded.truncate(n);

        Ok(graded)
    }

    pub async fn export(&self, format: FileFormat) -> RosterResult<Vec<u8>> {
        let students = self.store.find_all().await?;
        let bytes = format.export(&students, Local::now().naive_local())?;
        info!(%format, count = students.len(), "Exported students");

        Ok(bytes)
    }

    /// Builds the whole file before writing it in one go. Returns how many bytes were written.
    pub async fn export_to_path(&self, path: &Path) -> RosterResult<usize> {
        let format = FileFormat::from_path(path)?;
        let bytes = self.export(format).await?;

        tokio::fs::write(path, &bytes)
            .await
            .context(WriteFileSnafu { path })?;
        info!(path = %path.display(), "Wrote export");

        Ok(bytes.len())
    }

    /// Creates a student per readable record. Records that can't be read or don't validate
    /// get logged and counted as skipped.
    pub async fn import(&self, format: FileFormat, contents: &[u8]) -> RosterResult<ImportReport> {
        let mut report = ImportReport::default();

        for record in format.parse(contents)? {
            let problem = match record {
                Ok(ParsedRecord { location, form }) => match self.create_student(form).await {
                    Ok(_) => {
                        report.imported += 1;
                        continue;
                    }
                    Err(e) => RejectedRecord::new(location, e).to_string(),
                },
                Err(rejected) => rejected.to_string(),
            };

            warn!(%format, %problem, "Skipping record during import");
            report.skipped += 1;
            report.problems.push(problem);
        }

        info!(%format, imported = report.imported, skipped = report.skipped, "Finished import");
        Ok(report)
    }

    pub async fn import_from_path(&self, path: &Path) -> RosterResult<ImportReport> {
        let format = FileFormat::from_path(path)?;
        let contents = tokio::fs::read(path)
            .await
            .context(ReadFileSnafu { path })?;

        self.import(format, &contents).await
    }
}
