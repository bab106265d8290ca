mod common;

use common::{form, service};
use parking_lot::Mutex;
use roster::{
    error::RosterError,
    events::{EventKind, Handler, HandlerError, StudentEvent},
    query::{AgeRange, PageRequest, SortKey, StudentFilter, StudentQuery},
    transfer::FileFormat,
};
use std::sync::Arc;

fn recorder(seen: &Arc<Mutex<Vec<StudentEvent>>>) -> Handler {
    let seen = seen.clone();
    Arc::new(move |event: &StudentEvent| {
        seen.lock().push(event.clone());
        Ok(())
    })
}

#[tokio::test]
async fn changes_are_announced() {
    let service = service();
    let seen = Arc::new(Mutex::new(vec![]));
    for kind in [
        EventKind::StudentCreated,
        EventKind::StudentUpdated,
        EventKind::StudentDeleted,
    ] {
        service.bus().subscribe(kind, recorder(&seen));
    }

    let created = service
        .create_student(form("Ada", "Lovelace", 36, Some("A")))
        .await
        .unwrap();
    let updated = service
        .update_student(created.id, form("Ada", "Lovelace", 37, Some("A-")))
        .await
        .unwrap();
    service.delete_student(created.id).await.unwrap();

    assert_eq!(updated.age, 37);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);

    let seen = seen.lock();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], StudentEvent::Created(created.clone()));
    assert_eq!(seen[1], StudentEvent::Updated(updated));
    assert_eq!(seen[2], StudentEvent::Deleted { id: created.id });
}

#[tokio::test]
async fn invalid_students_are_never_stored() {
    let service = service();
    let seen = Arc::new(Mutex::new(vec![]));
    service
        .bus()
        .subscribe(EventKind::StudentCreated, recorder(&seen));

    let err = service
        .create_student(form("  ", "Lovelace", 0, None))
        .await
        .unwrap_err();

    match err {
        RosterError::Validation { reasons } => assert_eq!(
            reasons,
            vec![
                "First name is required".to_string(),
                "Age must be greater than 0".to_string()
            ]
        ),
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert_eq!(service.student_count().await.unwrap(), 0);
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn names_are_trimmed_and_blank_grades_dropped() {
    let service = service();
    let student = service
        .create_student(form("  Grace ", " Hopper", 85, Some("   ")))
        .await
        .unwrap();

    assert_eq!(student.first_name, "Grace");
    assert_eq!(student.last_name, "Hopper");
    assert_eq!(student.grade, None);
    assert_eq!(student.grade_display(), "Not graded");
}

#[tokio::test]
async fn missing_students_are_reported() {
    let service = service();

    assert!(matches!(
        service.get_student(7).await,
        Err(RosterError::MissingStudent { id: 7 })
    ));
    assert!(matches!(
        service
            .update_student(7, form("Alan", "Turing", 41, None))
            .await,
        Err(RosterError::MissingStudent { id: 7 })
    ));
    assert!(matches!(
        service.delete_student(7).await,
        Err(RosterError::MissingStudent { id: 7 })
    ));
}

#[tokio::test]
async fn sorting_by_name_and_grade() {
    let service = service();
    service
        .create_student(form("John", "Smith", 20, Some("B")))
        .await
        .unwrap();
    service
        .create_student(form("Jane", "Adams", 22, Some("A")))
        .await
        .unwrap();
    let first_page = PageRequest::new(1, 10).unwrap();

    let by_name = service
        .list_students(first_page, SortKey::LastName, false)
        .await
        .unwrap();
    let names: Vec<_> = by_name.items.iter().map(|s| s.last_name.as_str()).collect();
    assert_eq!(names, ["Adams", "Smith"]);

    let by_grade = service
        .list_students(first_page, SortKey::Grade, true)
        .await
        .unwrap();
    let grades: Vec<_> = by_grade
        .items
        .iter()
        .map(|s| (s.last_name.as_str(), s.numeric_grade()))
        .collect();
    assert_eq!(grades, [("Adams", 18), ("Smith", 12)]);
}

#[tokio::test]
async fn pages_cover_every_match_exactly_once() {
    let service = service();
    for i in 0..11 {
        let grade = ["A", "B", "C"][usize::try_from(i % 3).unwrap()];
        service
            .create_student(form(&format!("First{i}"), &format!("Last{i:02}"), 15 + i, Some(grade)))
            .await
            .unwrap();
    }

    let query = StudentQuery {
        filter: StudentFilter {
            age_range: AgeRange { min: 18, max: 150 },
            ..StudentFilter::default()
        },
        sort: SortKey::Age,
        descending: true,
    };

    let first = service
        .search_students(&query, PageRequest::new(1, 3).unwrap())
        .await
        .unwrap();
    assert_eq!(first.total, 8);
    assert_eq!(first.page_count(), 3);

    let mut collected = vec![];
    for page in 1..=first.page_count() {
        let page = service
            .search_students(&query, PageRequest::new(page, 3).unwrap())
            .await
            .unwrap();
        collected.extend(page.items.into_iter().map(|s| s.age));
    }
    assert_eq!(collected, (18..=25).rev().collect::<Vec<_>>());

    let mut unfiltered = vec![];
    for page in 1..=4 {
        let page = service
            .list_students(PageRequest::new(page, 3).unwrap(), SortKey::LastName, false)
            .await
            .unwrap();
        assert_eq!(page.total, 11);
        unfiltered.extend(page.items.into_iter().map(|s| s.last_name));
    }
    let expected: Vec<_> = (0..11).map(|i| format!("Last{i:02}")).collect();
    assert_eq!(unfiltered, expected);
}

#[tokio::test]
async fn listing_and_searching_break_ties_the_same_way() {
    let service = service();
    for (first, last, age) in [
        ("Zoe", "Smith", 20),
        ("Amy", "Smith", 20),
        ("Bob", "Adams", 20),
        ("Amy", "Smith", 31),
    ] {
        service
            .create_student(form(first, last, age, None))
            .await
            .unwrap();
    }
    let everyone = PageRequest::new(1, 10).unwrap();

    for sort in SortKey::ALL {
        for descending in [false, true] {
            let listed = service
                .list_students(everyone, sort, descending)
                .await
                .unwrap();
            let searched = service
                .search_students(
                    &StudentQuery {
                        sort,
                        descending,
                        ..StudentQuery::default()
                    },
                    everyone,
                )
                .await
                .unwrap();

            let listed: Vec<_> = listed.items.iter().map(|s| s.id).collect();
            let searched: Vec<_> = searched.items.iter().map(|s| s.id).collect();
            assert_eq!(listed, searched, "{sort} descending={descending}");
        }
    }

    let by_name_desc = service
        .list_students(everyone, SortKey::LastName, true)
        .await
        .unwrap();
    let names: Vec<_> = by_name_desc
        .items
        .iter()
        .map(|s| (s.full_name(), s.age))
        .collect();
    assert_eq!(
        names,
        [
            ("Amy Smith".to_string(), 20),
            ("Amy Smith".to_string(), 31),
            ("Zoe Smith".to_string(), 20),
            ("Bob Adams".to_string(), 20),
        ]
    );
}

#[tokio::test]
async fn statistics_ignore_ungraded_students_for_grades() {
    let service = service();
    assert_eq!(service.average_age().await.unwrap(), 0.0);
    assert_eq!(service.average_grade().await.unwrap(), 0.0);

    service
        .create_student(form("John", "Smith", 20, Some("B")))
        .await
        .unwrap();
    service
        .create_student(form("Jane", "Adams", 22, Some("A")))
        .await
        .unwrap();
    service
        .create_student(form("Nobody", "Yet", 30, None))
        .await
        .unwrap();

    let stats = service.statistics().await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.graded, 2);
    assert!((stats.average_age - 24.0).abs() < f64::EPSILON);
    assert!((stats.average_grade - 15.0).abs() < f64::EPSILON);

    let top: Vec<_> = service
        .top_students(10)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.last_name)
        .collect();
    assert_eq!(top, ["Adams", "Smith"]);
    assert_eq!(service.top_students(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn a_broken_subscriber_does_not_stop_creation() {
    let service = service();
    let seen = Arc::new(Mutex::new(vec![]));

    service.bus().subscribe(
        EventKind::StudentCreated,
        Arc::new(|_: &StudentEvent| -> Result<(), HandlerError> {
            Err("listener is broken".into())
        }),
    );
    service
        .bus()
        .subscribe(EventKind::StudentCreated, recorder(&seen));

    let student = service
        .create_student(form("Alan", "Turing", 41, Some("A")))
        .await
        .unwrap();

    assert_eq!(*seen.lock(), vec![StudentEvent::Created(student)]);
}

#[tokio::test]
async fn imports_skip_bad_records() {
    let service = service();
    let csv = "ID,Prénom,Nom,Âge,Note\n\
               1,Ada,Lovelace,36,A\n\
               2,Bad,Age,abc,B\n\
               3,,Nameless,20,\n\
               4,Alan,Turing,41,\n";

    let report = service
        .import(FileFormat::Csv, csv.as_bytes())
        .await
        .unwrap();

    assert_eq!(report.imported, 2);
    assert_eq!(report.skipped, 2);
    assert!(report.problems[0].starts_with("line 3: "));
    assert_eq!(
        report.problems[1],
        "line 4: Invalid input: First name is required"
    );

    let names: Vec<_> = service
        .all_students()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.full_name())
        .collect();
    assert_eq!(names, ["Ada Lovelace", "Alan Turing"]);
}
