use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{Duration, Local, Months, NaiveDate, NaiveTime, Weekday};
use clap::Args;

use crate::infra::{
    parse_date, InMemoryApprovalGate, InMemoryDocumentStore, InMemoryTrainingStore,
    LogNotificationSink,
};
use traincert::error::AppError;
use traincert::workflows::grades::{GradeCsvImporter, RosterIndex};
use traincert::workflows::training::certification::{
    CertificateHistoryService, CertificationService,
};
use traincert::workflows::training::domain::{
    CertificateStatus, CertificateTemplate, ClassId, ClassSubject, ClassSubjectId, Course,
    CourseId, CourseLevel, CourseProgress, CourseStatus, InstructorProfile, Request, RequestId,
    RequestKind, RequestStatus, ScheduleStatus, SpecialtyId, Subject, SubjectId,
    SubjectSpecialty, TemplateId, TraineeAssign, TraineeAssignId, TraineeId, TraineeProfile,
    TrainingClass, UserId,
};
use traincert::workflows::training::gateway::{
    ApprovalDecision, ApprovalGate, PlaceholderRenderer,
};
use traincert::workflows::training::progress::ProgressSweep;
use traincert::workflows::training::repository::GradeRepository;
use traincert::workflows::training::scheduling::{ScheduleDraft, ScheduleService};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the demo's notion of today (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

const DEMO_SHEET: &str = "\
Trainee Email,Subject Code,Participation,Assignment,Final Exam,Resit
lan.pham@example.test,AV101,7,8,6.5,
lan.pham@example.test,AV102,8,7,7,
huy.vo@example.test,AV101,6,7,4,6.5
huy.vo@example.test,AV102,0,8,9,
";

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let store = Arc::new(InMemoryTrainingStore::default());
    seed(&store, today);

    println!("Training lifecycle demo (today = {today})");

    // 1. Scheduling: a clean draft lands, an overlapping one is rejected.
    let schedules = ScheduleService::new(store.clone());
    let accepted = schedules
        .propose(draft("cs-01", "ins-01", &[Weekday::Mon, Weekday::Wed], 9, today), today)
        .expect("first draft is conflict-free");
    println!("\n[scheduling] accepted {} in room {}", accepted.id.0, accepted.room);

    match schedules.propose(
        draft("cs-02", "ins-01", &[Weekday::Wed, Weekday::Fri], 9, today),
        today,
    ) {
        Err(rejection) => println!("[scheduling] rejected overlapping draft: {rejection}"),
        Ok(schedule) => println!("[scheduling] unexpected acceptance of {}", schedule.id.0),
    }
    let second = schedules
        .propose(
            draft("cs-02", "ins-02", &[Weekday::Tue, Weekday::Thu], 13, today),
            today,
        )
        .expect("second draft is conflict-free");
    println!("[scheduling] accepted {} after moving days", second.id.0);

    // Approval gates the Pending -> Incoming transition.
    let approvals = InMemoryApprovalGate::default();
    for (index, schedule_id) in [&accepted.id, &second.id].into_iter().enumerate() {
        let request_id = RequestId(format!("req-{index:03}"));
        approvals
            .submit(Request {
                id: request_id.clone(),
                kind: RequestKind::Schedule,
                entity_id: schedule_id.0.clone(),
                status: RequestStatus::Pending,
                requested_by: UserId("ins-01".to_string()),
                approver: None,
            })
            .expect("request submitted");
        let resolved = approvals
            .resolve(&request_id, ApprovalDecision::Approve, approver())
            .expect("request approved");
        println!(
            "[approvals] request {} for {} is {}",
            resolved.id.0,
            schedule_id.0,
            resolved.status.label()
        );
    }
    for schedule in store
        .schedules
        .lock()
        .expect("schedule mutex poisoned")
        .values_mut()
    {
        schedule.status = ScheduleStatus::Incoming;
    }

    // 2. Grading: import the score sheet against the initial course roster.
    let report = import_sheet(&store, "course-i")?;
    println!(
        "\n[grades] imported {} rows ({} errors, {} warnings)",
        report.imported.len(),
        report.errors.len(),
        report.warnings.len()
    );

    // 3. Progress: close the schedules, then let the sweep finish the course.
    let sweep = ProgressSweep::new(store.clone(), std::time::Duration::from_secs(60));
    let started = sweep.run_once(today.and_hms_opt(9, 0, 0).expect("valid time"), &AtomicBool::new(false));
    println!("\n[progress] first pass advanced {:?}", started.advanced);

    for schedule in store
        .schedules
        .lock()
        .expect("schedule mutex poisoned")
        .values_mut()
    {
        schedule.status = ScheduleStatus::Completed;
    }
    let finished = sweep.run_once(
        (today + Duration::days(120)).and_hms_opt(9, 0, 0).expect("valid time"),
        &AtomicBool::new(false),
    );
    println!("[progress] second pass advanced {:?}", finished.advanced);

    // 4. Certification: issue for the initial course.
    let documents = Arc::new(InMemoryDocumentStore::default());
    let notifications = Arc::new(LogNotificationSink::default());
    let certification = CertificationService::new(
        store.clone(),
        documents,
        notifications.clone(),
        Arc::new(PlaceholderRenderer),
    );
    let issue_day = today + Duration::days(121);
    let outcome = certification
        .issue_for_course(&CourseId("course-i".to_string()), &approver(), issue_day)
        .await
        .expect("initial batch succeeds");
    println!(
        "\n[certification] issued {} certificate(s), skipped {}",
        outcome.issued.len(),
        outcome.skipped.len()
    );
    for skip in &outcome.skipped {
        println!("[certification]   skipped {}: {}", skip.trainee_id.0, skip.reason.summary());
    }

    // Sign-off happens out of band; activate the rows for the renewal leg.
    for certificate in store
        .certificates
        .lock()
        .expect("certificate mutex poisoned")
        .values_mut()
    {
        certificate.status = CertificateStatus::Active;
    }

    // 5. Renewal: grade the recurrent offering, then extend the same row.
    import_sheet(&store, "course-r")?;
    let renewal_day = issue_day + Months::new(23);
    let renewal = certification
        .issue_for_course(&CourseId("course-r".to_string()), &approver(), renewal_day)
        .await
        .expect("renewal batch succeeds");
    println!(
        "\n[renewal] renewed {} certificate(s) in place on {renewal_day}",
        renewal.renewed.len()
    );

    // 6. History: reconstruct the chain for the renewed certificate.
    let history_service = CertificateHistoryService::new(store.clone());
    if let Some(certificate) = renewal.renewed.first() {
        let history = history_service
            .history(&certificate.id)
            .expect("history resolves");
        println!(
            "\n[history] certificate {} originally issued {}",
            certificate.code,
            history
                .original
                .map(|original| original.issued_on.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        for record in &history.renewals {
            println!(
                "[history]   renewed {} (expiry {} -> {})",
                record.renewed_on, record.previous_expiry, record.new_expiry
            );
        }
    }

    println!("\n[notifications] {} dispatched", notifications.events().len());
    Ok(())
}

fn approver() -> UserId {
    UserId("director-01".to_string())
}

fn import_sheet(
    store: &Arc<InMemoryTrainingStore>,
    course: &str,
) -> Result<traincert::workflows::grades::GradeImportReport, AppError> {
    let (trainees, assigns, class_subjects, subjects) = store
        .roster_inputs(&CourseId(course.to_string()))
        .expect("in-memory roster read");
    let roster = RosterIndex::build(&trainees, &assigns, &class_subjects, &subjects);
    let report = GradeCsvImporter::from_reader(std::io::Cursor::new(DEMO_SHEET), &roster)?;
    for grade in &report.imported {
        store
            .record_grade(grade.clone())
            .expect("in-memory grade write");
    }
    Ok(report)
}

fn draft(
    class_subject: &str,
    instructor: &str,
    days: &[Weekday],
    hour: u32,
    today: NaiveDate,
) -> ScheduleDraft {
    ScheduleDraft {
        schedule_id: None,
        class_subject_id: ClassSubjectId(class_subject.to_string()),
        instructor_id: UserId(instructor.to_string()),
        teaching_days: days.iter().copied().collect::<BTreeSet<_>>(),
        class_time: NaiveTime::from_hms_opt(hour, 0, 0).expect("valid time"),
        duration_minutes: 90,
        start_day: today + Duration::days(7),
        end_day: today + Duration::days(90),
        location: "Main Campus".to_string(),
        room: "101".to_string(),
    }
}

fn seed(store: &InMemoryTrainingStore, today: NaiveDate) {
    let specialty = SpecialtyId("avionics".to_string());

    let initial = Course {
        id: CourseId("course-i".to_string()),
        name: "Avionics Initial".to_string(),
        level: CourseLevel::Initial,
        status: CourseStatus::Approved,
        progress: CourseProgress::NotYet,
        starts_at: today.and_hms_opt(8, 0, 0).expect("valid time"),
        ends_at: (today + Duration::days(120))
            .and_hms_opt(17, 0, 0)
            .expect("valid time"),
        related_course_id: None,
        subject_specialties: vec![
            SubjectSpecialty {
                subject_id: SubjectId("sub-01".to_string()),
                specialty_id: specialty.clone(),
            },
            SubjectSpecialty {
                subject_id: SubjectId("sub-02".to_string()),
                specialty_id: specialty.clone(),
            },
        ],
    };
    let recurrent = Course {
        id: CourseId("course-r".to_string()),
        name: "Avionics Recurrent".to_string(),
        level: CourseLevel::Recurrent,
        related_course_id: Some(initial.id.clone()),
        ..initial.clone()
    };
    store
        .courses
        .lock()
        .expect("course mutex poisoned")
        .extend([(initial.id.clone(), initial), (recurrent.id.clone(), recurrent)]);

    for course in ["course-i", "course-r"] {
        store
            .classes
            .lock()
            .expect("class mutex poisoned")
            .push(TrainingClass {
                id: ClassId(format!("{course}-class")),
                course_id: CourseId(course.to_string()),
                name: format!("{course} cohort"),
            });
    }
    let class_subject_rows = [
        ("cs-01", "course-i", "sub-01"),
        ("cs-02", "course-i", "sub-02"),
        ("cs-r1", "course-r", "sub-01"),
        ("cs-r2", "course-r", "sub-02"),
    ];
    for (id, course, subject) in class_subject_rows {
        store
            .class_subjects
            .lock()
            .expect("class subject mutex poisoned")
            .push(ClassSubject {
                id: ClassSubjectId(id.to_string()),
                class_id: ClassId(format!("{course}-class")),
                subject_id: SubjectId(subject.to_string()),
                specialty_id: specialty.clone(),
            });
    }

    store.subjects.lock().expect("subject mutex poisoned").extend([
        Subject {
            id: SubjectId("sub-01".to_string()),
            code: "AV101".to_string(),
            name: "Avionics Systems".to_string(),
            passing_score: 5.0,
        },
        Subject {
            id: SubjectId("sub-02".to_string()),
            code: "AV102".to_string(),
            name: "Avionics Maintenance".to_string(),
            passing_score: 5.0,
        },
    ]);

    for (id, name) in [("ins-01", "Minh Tran"), ("ins-02", "Thu Nguyen")] {
        store
            .instructors
            .lock()
            .expect("instructor mutex poisoned")
            .insert(
                UserId(id.to_string()),
                InstructorProfile {
                    id: UserId(id.to_string()),
                    full_name: name.to_string(),
                    specialty_id: specialty.clone(),
                },
            );
    }

    for (id, name, email) in [
        ("t-01", "Lan Pham", "lan.pham@example.test"),
        ("t-02", "Huy Vo", "huy.vo@example.test"),
    ] {
        store
            .trainees
            .lock()
            .expect("trainee mutex poisoned")
            .insert(
                TraineeId(id.to_string()),
                TraineeProfile {
                    id: TraineeId(id.to_string()),
                    full_name: name.to_string(),
                    email: email.to_string(),
                },
            );
    }

    let assign_rows = [
        ("ta-01", "t-01", "cs-01"),
        ("ta-02", "t-01", "cs-02"),
        ("ta-03", "t-02", "cs-01"),
        ("ta-04", "t-02", "cs-02"),
        ("ta-r1", "t-01", "cs-r1"),
        ("ta-r2", "t-01", "cs-r2"),
    ];
    for (id, trainee, class_subject) in assign_rows {
        store.assigns.lock().expect("assign mutex poisoned").push(TraineeAssign {
            id: TraineeAssignId(id.to_string()),
            trainee_id: TraineeId(trainee.to_string()),
            class_subject_id: ClassSubjectId(class_subject.to_string()),
            status: RequestStatus::Approved,
        });
    }

    store
        .templates
        .lock()
        .expect("template mutex poisoned")
        .push(CertificateTemplate {
            id: TemplateId("tpl-initial-1".to_string()),
            name: "Initial Certificate".to_string(),
            sequence: 1,
            active: true,
            body: "Awarded to {{trainee_name}} for completing {{course_name}} \
                   with grade {{grade_tier}}. Code {{certificate_code}}, issued {{issue_date}}."
                .to_string(),
        });
}
