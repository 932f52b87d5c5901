//! Integration tests for the student service
//!
//! Exercises the public surface over the in-memory store: the catalog
//! queries on a small known dataset, error reporting, dataset loading and
//! concurrent mark appends.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use chrono::NaiveDate;
use gradebook::{
    CatalogQuery, Config, GradebookError, Mark, MemoryStudentStore, QueryResult, Student,
    StudentAvgScore, StudentStore, StudentSummary, StudentsService,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn ids(students: &[StudentSummary]) -> Vec<i64> {
    students.iter().map(|s| s.id).collect()
}

/// Five students with overlapping subjects, dates and score sums
fn school() -> StudentsService<MemoryStudentStore> {
    let store = MemoryStudentStore::with_students(vec![
        Student::new(10, "0510000010")
            .with_mark(Mark::new("Math", 95, date(2024, 3, 1)))
            .with_mark(Mark::new("Bio", 85, date(2024, 3, 15)))
            .with_mark(Mark::new("Math", 60, date(2024, 4, 2))),
        Student::new(4, "0520000004")
            .with_mark(Mark::new("Math", 82, date(2024, 3, 1)))
            .with_mark(Mark::new("Chem", 91, date(2024, 5, 9))),
        Student::new(7, "0510000007"),
        Student::new(2, "0530000002")
            .with_mark(Mark::new("Bio", 40, date(2024, 4, 30)))
            .with_mark(Mark::new("Bio", 45, date(2024, 5, 1))),
        Student::new(5, "0510000005").with_mark(Mark::new("Math", 85, date(2024, 3, 20))),
    ])
    .unwrap();
    StudentsService::new(store, &Config::default())
}

#[test]
fn test_two_student_walkthrough() {
    let service = StudentsService::new(MemoryStudentStore::new(), &Config::default());
    service
        .add_student(StudentSummary::new(1, "0510000001"))
        .unwrap();
    service
        .add_student(StudentSummary::new(2, "0520000002"))
        .unwrap();
    service
        .add_mark(1, Mark::new("Math", 70, date(2024, 1, 5)))
        .unwrap();
    service
        .add_mark(1, Mark::new("Math", 80, date(2024, 1, 20)))
        .unwrap();
    service
        .add_mark(2, Mark::new("Bio", 90, date(2024, 2, 10)))
        .unwrap();

    assert_eq!(
        ids(&service.get_students_good_subject_mark("Math", 75).unwrap()),
        vec![1]
    );
    assert_eq!(
        ids(&service.get_students_by_phone_prefix("051").unwrap()),
        vec![1]
    );
    assert_eq!(ids(&service.get_students_few_marks(2).unwrap()), vec![2]);

    service.remove_student(1).unwrap();
    assert!(matches!(
        service.get_student(1),
        Err(GradebookError::NotFound(1))
    ));
}

#[test]
fn test_dedupe_keeps_first_seen_order() {
    let service = school();
    // 10 matches twice in March, 4 and 5 once each
    assert_eq!(
        ids(&service.get_students_marks_month_year(3, 2024).unwrap()),
        vec![10, 4, 5]
    );
    assert_eq!(
        ids(&service.get_students_marks_date(date(2024, 3, 1)).unwrap()),
        vec![10, 4]
    );
}

#[test]
fn test_month_range_covers_last_day() {
    let service = school();
    assert_eq!(
        ids(&service.get_students_marks_month_year(4, 2024).unwrap()),
        vec![10, 2]
    );
}

#[test]
fn test_average_ranking_breaks_ties_by_id() {
    let service = school();
    // 10: 80, 4: 86.5, 2: 42.5, 5: 85
    assert_eq!(
        service.get_student_avg_score_greater(79).unwrap(),
        vec![
            StudentAvgScore::new(4, 86),
            StudentAvgScore::new(5, 85),
            StudentAvgScore::new(10, 80),
        ]
    );

    service
        .add_mark(2, Mark::new("Bio", 250, date(2024, 6, 1)))
        .unwrap();
    // 2 now averages 111.66
    assert_eq!(
        service.get_student_avg_score_greater(100).unwrap(),
        vec![StudentAvgScore::new(2, 111)]
    );
}

#[test]
fn test_tied_averages_rank_by_ascending_id() {
    let service = StudentsService::new(MemoryStudentStore::new(), &Config::default());
    for (id, scores) in [(9, [70, 90]), (3, [80, 80]), (6, [100, 60]), (1, [60, 60])] {
        service
            .add_student(StudentSummary::new(id, format!("05{:08}", id)))
            .unwrap();
        for score in scores {
            service
                .add_mark(id, Mark::new("Math", score, date(2024, 1, 5)))
                .unwrap();
        }
    }

    assert_eq!(
        service.get_student_avg_score_greater(70).unwrap(),
        vec![
            StudentAvgScore::new(3, 80),
            StudentAvgScore::new(6, 80),
            StudentAvgScore::new(9, 80),
        ]
    );
}

#[test]
fn test_best_students_ranking() {
    let service = school();
    // marks > 80: 10 -> 2, 4 -> 2, 5 -> 1
    assert_eq!(service.get_best_students(10).unwrap(), vec![4, 10, 5]);
    assert_eq!(service.get_best_students(2).unwrap(), vec![4, 10]);
}

#[test]
fn test_best_students_threshold_is_configurable() {
    let mut config = Config::default();
    config.catalog.best_students_threshold = 90;
    let store = MemoryStudentStore::with_students(
        school().store().scan_all().unwrap(),
    )
    .unwrap();
    let service = StudentsService::new(store, &config);
    assert_eq!(service.get_best_students(10).unwrap(), vec![4, 10]);
}

#[test]
fn test_worst_students_include_empty_students() {
    let service = school();
    // sums: 10 -> 240, 4 -> 173, 7 -> 0, 2 -> 85, 5 -> 85
    assert_eq!(service.get_worst_students(3).unwrap(), vec![7, 2, 5]);
    assert_eq!(service.get_worst_students(100).unwrap().len(), 5);
}

#[test]
fn test_quantified_queries() {
    let service = school();
    assert_eq!(
        ids(&service.get_students_all_good_marks(80).unwrap()),
        vec![4, 5]
    );
    assert_eq!(
        ids(&service.get_students_all_good_marks_subject("Math", 80).unwrap()),
        vec![4, 5]
    );
    assert_eq!(
        ids(&service.get_students_all_good_marks_subject("Bio", 30).unwrap()),
        vec![10, 2]
    );
}

#[test]
fn test_mark_count_queries() {
    let service = school();
    assert_eq!(
        ids(&service.get_students_few_marks(2).unwrap()),
        vec![7, 5]
    );
    assert_eq!(
        ids(&service.get_students_marks_amount_between(2, 3).unwrap()),
        vec![10, 4, 2]
    );
    assert!(matches!(
        service.get_students_marks_amount_between(3, 2),
        Err(GradebookError::InvalidRange(_))
    ));
}

#[test]
fn test_student_mark_queries_keep_append_order() {
    let service = school();
    assert_eq!(
        service.get_student_marks_subject(10, "Math").unwrap(),
        vec![
            Mark::new("Math", 95, date(2024, 3, 1)),
            Mark::new("Math", 60, date(2024, 4, 2)),
        ]
    );
    assert_eq!(
        service
            .get_student_marks_at_dates(10, date(2024, 3, 15), date(2024, 4, 2))
            .unwrap(),
        vec![
            Mark::new("Bio", 85, date(2024, 3, 15)),
            Mark::new("Math", 60, date(2024, 4, 2)),
        ]
    );
    assert!(service
        .get_student_marks_subject(7, "Math")
        .unwrap()
        .is_empty());
}

#[test]
fn test_phone_lookups() {
    let service = school();
    assert_eq!(
        ids(&service.get_students_by_phone_prefix("051").unwrap()),
        vec![10, 7, 5]
    );
    assert_eq!(
        service.get_student_by_phone_number("0510000007").unwrap(),
        Some(StudentSummary::new(7, "0510000007"))
    );
    service.update_phone_number(7, "0590000007").unwrap();
    assert_eq!(service.get_student_by_phone_number("0510000007").unwrap(), None);
}

#[test]
fn test_generic_query_result_kinds() {
    let service = school();
    assert_eq!(
        service
            .query(&CatalogQuery::StudentByPhone {
                phone: "0530000002".into()
            })
            .unwrap(),
        QueryResult::Student(Some(StudentSummary::new(2, "0530000002")))
    );
    let json = serde_json::to_string(
        &service
            .query(&CatalogQuery::StudentAvgScoreGreater { threshold: 85 })
            .unwrap(),
    )
    .unwrap();
    assert_eq!(json, r#"[{"id":4,"avgScore":86}]"#);
}

#[test]
fn test_concurrent_appends_to_one_student() {
    let service = school();
    let before = service.get_marks(7).unwrap().len();

    std::thread::scope(|scope| {
        for i in 0..2 {
            let service = &service;
            scope.spawn(move || {
                service
                    .add_mark(7, Mark::new("Math", 50 + i, date(2024, 6, 1)))
                    .unwrap();
            });
        }
    });

    assert_eq!(service.get_marks(7).unwrap().len(), before + 2);
}

#[test]
fn test_concurrent_queries_and_appends() {
    let service = school();

    std::thread::scope(|scope| {
        for t in 0..4 {
            let service = &service;
            scope.spawn(move || {
                for i in 0..25 {
                    service
                        .add_mark(2, Mark::new("Bio", t * 25 + i, date(2024, 7, 1)))
                        .unwrap();
                }
            });
        }
        for _ in 0..4 {
            let service = &service;
            scope.spawn(move || {
                for _ in 0..25 {
                    let worst = service.get_worst_students(5).unwrap();
                    assert_eq!(worst.len(), 5);
                }
            });
        }
    });

    assert_eq!(service.get_marks(2).unwrap().len(), 102);
}

#[test]
fn test_service_over_dataset_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"id": 1, "phone": "0510000001", "marks": [
                {{"subject": "Math", "score": 70, "date": "2024-01-05"}},
                {{"subject": "Math", "score": 80, "date": "2024-01-20"}}
            ]}},
            {{"id": 2, "phone": "0520000002", "marks": [
                {{"subject": "Bio", "score": 90, "date": "2024-02-10"}}
            ]}}
        ]"#
    )
    .unwrap();

    let store = MemoryStudentStore::from_json_file(file.path()).unwrap();
    let service = StudentsService::new(store, &Config::default());
    assert_eq!(service.get_best_students(5).unwrap(), vec![2]);
    assert_eq!(service.get_worst_students(1).unwrap(), vec![2]);
}
