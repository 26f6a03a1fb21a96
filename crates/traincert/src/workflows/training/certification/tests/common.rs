use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::workflows::training::certification::grading::build_grade;
use crate::workflows::training::certification::CertificationService;
use crate::workflows::training::domain::{
    Certificate, CertificateId, CertificateStatus, CertificateTemplate, ClassId, ClassSubject,
    ClassSubjectId, Course, CourseId, CourseLevel, CourseProgress, CourseStatus, Decision, Grade,
    GradeComponents, InstructorProfile, RequestStatus, SpecialtyId, Subject, SubjectId,
    SubjectSpecialty, TemplateId, TraineeAssign, TraineeAssignId, TraineeId, TraineeProfile,
    TrainingClass, UserId,
};
use crate::workflows::training::gateway::{
    DocumentStore, DocumentStoreError, Notification, NotificationError, NotificationSink,
    PlaceholderRenderer,
};
use crate::workflows::training::repository::{
    CertificateMutation, CertificateRepository, CourseRepository, DecisionRepository,
    GradeRepository, PeopleRepository, RepositoryError, RosterRepository, TemplateRepository,
};

pub(super) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub(super) fn specialty() -> SpecialtyId {
    SpecialtyId("avionics".to_string())
}

pub(super) fn subject(id: &str, code: &str) -> Subject {
    Subject {
        id: SubjectId(id.to_string()),
        code: code.to_string(),
        name: format!("Subject {code}"),
        passing_score: 5.0,
    }
}

pub(super) fn initial_course() -> Course {
    Course {
        id: CourseId("course-i".to_string()),
        name: "Avionics Initial".to_string(),
        level: CourseLevel::Initial,
        status: CourseStatus::Approved,
        progress: CourseProgress::Ongoing,
        starts_at: date(2025, 1, 6).and_hms_opt(8, 0, 0).expect("valid time"),
        ends_at: date(2025, 6, 1).and_hms_opt(17, 0, 0).expect("valid time"),
        related_course_id: None,
        subject_specialties: vec![
            SubjectSpecialty {
                subject_id: SubjectId("sub-01".to_string()),
                specialty_id: specialty(),
            },
            SubjectSpecialty {
                subject_id: SubjectId("sub-02".to_string()),
                specialty_id: specialty(),
            },
        ],
    }
}

pub(super) fn recurrent_course() -> Course {
    Course {
        id: CourseId("course-r".to_string()),
        name: "Avionics Recurrent".to_string(),
        level: CourseLevel::Recurrent,
        related_course_id: Some(CourseId("course-i".to_string())),
        ..initial_course()
    }
}

pub(super) fn passing_components() -> GradeComponents {
    GradeComponents {
        participation: 7.0,
        assignment: 8.0,
        final_exam: 6.5,
        resit: None,
    }
}

pub(super) fn trainee(id: &str, name: &str) -> TraineeProfile {
    TraineeProfile {
        id: TraineeId(id.to_string()),
        full_name: name.to_string(),
        email: format!("{id}@example.test"),
    }
}

pub(super) fn initial_template(sequence: u32) -> CertificateTemplate {
    CertificateTemplate {
        id: TemplateId(format!("tpl-initial-{sequence}")),
        name: format!("Initial Certificate v{sequence}"),
        sequence,
        active: true,
        body: "Awarded to {{trainee_name}} for {{course_name}} ({{grade_tier}}), code {{certificate_code}}."
            .to_string(),
    }
}

pub(super) fn certificate(
    id: &str,
    trainee: &str,
    course: &str,
    issued: NaiveDate,
    expires: NaiveDate,
    status: CertificateStatus,
) -> Certificate {
    Certificate {
        id: CertificateId(id.to_string()),
        code: format!("VTC-{id}"),
        trainee_id: TraineeId(trainee.to_string()),
        course_id: CourseId(course.to_string()),
        template_id: None,
        specialty_id: specialty(),
        status,
        issued_on: issued,
        expires_on: expires,
        issued_by: UserId("approver-01".to_string()),
        document_url: None,
        revocation: None,
        history: Vec::new(),
    }
}

#[derive(Default)]
pub(super) struct MemoryCertificationStore {
    pub(super) courses: Mutex<HashMap<CourseId, Course>>,
    pub(super) classes: Mutex<Vec<TrainingClass>>,
    pub(super) class_subjects: Mutex<Vec<ClassSubject>>,
    pub(super) assigns: Mutex<Vec<TraineeAssign>>,
    pub(super) grades: Mutex<Vec<Grade>>,
    pub(super) certificates: Mutex<HashMap<CertificateId, Certificate>>,
    pub(super) templates: Mutex<Vec<CertificateTemplate>>,
    pub(super) decisions: Mutex<Vec<Decision>>,
    pub(super) trainees: Mutex<HashMap<TraineeId, TraineeProfile>>,
    pub(super) commit_failures: Mutex<u32>,
}

impl MemoryCertificationStore {
    pub(super) fn insert_course(&self, course: Course) {
        self.courses
            .lock()
            .expect("course mutex poisoned")
            .insert(course.id.clone(), course);
    }

    pub(super) fn add_class_subject(&self, course: &str, id: &str, subject: &str) {
        let class_id = ClassId(format!("{course}-class"));
        let mut classes = self.classes.lock().expect("class mutex poisoned");
        if !classes.iter().any(|class| class.id == class_id) {
            classes.push(TrainingClass {
                id: class_id.clone(),
                course_id: CourseId(course.to_string()),
                name: format!("{course} cohort"),
            });
        }
        drop(classes);

        self.class_subjects
            .lock()
            .expect("class subject mutex poisoned")
            .push(ClassSubject {
                id: ClassSubjectId(id.to_string()),
                class_id,
                subject_id: SubjectId(subject.to_string()),
                specialty_id: specialty(),
            });
    }

    pub(super) fn add_assign(&self, id: &str, trainee: &str, class_subject: &str) {
        self.assigns
            .lock()
            .expect("assign mutex poisoned")
            .push(TraineeAssign {
                id: TraineeAssignId(id.to_string()),
                trainee_id: TraineeId(trainee.to_string()),
                class_subject_id: ClassSubjectId(class_subject.to_string()),
                status: RequestStatus::Approved,
            });
    }

    pub(super) fn add_grade(&self, assign: &str, subject_id: &str, components: GradeComponents) {
        let grade = build_grade(
            TraineeAssignId(assign.to_string()),
            &subject(subject_id, subject_id),
            components,
        );
        self.grades.lock().expect("grade mutex poisoned").push(grade);
    }

    pub(super) fn add_trainee(&self, profile: TraineeProfile) {
        self.trainees
            .lock()
            .expect("trainee mutex poisoned")
            .insert(profile.id.clone(), profile);
    }

    pub(super) fn add_template(&self, template: CertificateTemplate) {
        self.templates
            .lock()
            .expect("template mutex poisoned")
            .push(template);
    }

    pub(super) fn insert_certificate(&self, certificate: Certificate) {
        self.certificates
            .lock()
            .expect("certificate mutex poisoned")
            .insert(certificate.id.clone(), certificate);
    }

    pub(super) fn certificate_by_id(&self, id: &str) -> Option<Certificate> {
        self.certificates
            .lock()
            .expect("certificate mutex poisoned")
            .get(&CertificateId(id.to_string()))
            .cloned()
    }

    pub(super) fn decisions_for(&self, course: &str) -> Vec<Decision> {
        self.decisions
            .lock()
            .expect("decision mutex poisoned")
            .iter()
            .filter(|decision| decision.course_id == CourseId(course.to_string()))
            .cloned()
            .collect()
    }

    pub(super) fn fail_next_commits(&self, count: u32) {
        *self.commit_failures.lock().expect("failure mutex poisoned") = count;
    }

    fn apply_mutation(
        map: &mut HashMap<CertificateId, Certificate>,
        mutation: CertificateMutation,
    ) -> Result<Certificate, RepositoryError> {
        match mutation {
            CertificateMutation::Create(certificate) => {
                if map.contains_key(&certificate.id) {
                    return Err(RepositoryError::Conflict);
                }
                map.insert(certificate.id.clone(), certificate.clone());
                Ok(certificate)
            }
            CertificateMutation::Renew {
                id,
                course_id,
                specialty_id,
                event,
            } => {
                let certificate = map.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                certificate.course_id = course_id;
                certificate.specialty_id = specialty_id;
                certificate.status = CertificateStatus::Pending;
                certificate.issued_on = event.renewed_on;
                certificate.expires_on = event.new_expiry;
                certificate.issued_by = event.issued_by.clone();
                certificate.history.push(event);
                Ok(certificate.clone())
            }
            CertificateMutation::MarkExpired(id) => {
                let certificate = map.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                certificate.status = CertificateStatus::Expired;
                Ok(certificate.clone())
            }
        }
    }
}

impl CourseRepository for MemoryCertificationStore {
    fn course(&self, id: &CourseId) -> Result<Option<Course>, RepositoryError> {
        Ok(self
            .courses
            .lock()
            .expect("course mutex poisoned")
            .get(id)
            .cloned())
    }

    fn classes(&self, course: &CourseId) -> Result<Vec<TrainingClass>, RepositoryError> {
        Ok(self
            .classes
            .lock()
            .expect("class mutex poisoned")
            .iter()
            .filter(|class| &class.course_id == course)
            .cloned()
            .collect())
    }

    fn class_subject(
        &self,
        id: &ClassSubjectId,
    ) -> Result<Option<ClassSubject>, RepositoryError> {
        Ok(self
            .class_subjects
            .lock()
            .expect("class subject mutex poisoned")
            .iter()
            .find(|class_subject| &class_subject.id == id)
            .cloned())
    }

    fn class_subjects(
        &self,
        course: &CourseId,
    ) -> Result<Vec<ClassSubject>, RepositoryError> {
        let classes = self.classes(course)?;
        Ok(self
            .class_subjects
            .lock()
            .expect("class subject mutex poisoned")
            .iter()
            .filter(|class_subject| {
                classes.iter().any(|class| class.id == class_subject.class_id)
            })
            .cloned()
            .collect())
    }

    fn courses_in_flight(&self) -> Result<Vec<Course>, RepositoryError> {
        Ok(Vec::new())
    }

    fn update_progress(
        &self,
        _id: &CourseId,
        _progress: CourseProgress,
    ) -> Result<(), RepositoryError> {
        Ok(())
    }
}

impl RosterRepository for MemoryCertificationStore {
    fn assigns_for_class_subject(
        &self,
        class_subject: &ClassSubjectId,
    ) -> Result<Vec<TraineeAssign>, RepositoryError> {
        Ok(self
            .assigns
            .lock()
            .expect("assign mutex poisoned")
            .iter()
            .filter(|assign| &assign.class_subject_id == class_subject)
            .cloned()
            .collect())
    }

    fn assigns_for_course(
        &self,
        course: &CourseId,
    ) -> Result<Vec<TraineeAssign>, RepositoryError> {
        let class_subjects = self.class_subjects(course)?;
        Ok(self
            .assigns
            .lock()
            .expect("assign mutex poisoned")
            .iter()
            .filter(|assign| {
                class_subjects
                    .iter()
                    .any(|class_subject| class_subject.id == assign.class_subject_id)
            })
            .cloned()
            .collect())
    }
}

impl GradeRepository for MemoryCertificationStore {
    fn grades_for_assign(
        &self,
        assign: &TraineeAssignId,
    ) -> Result<Vec<Grade>, RepositoryError> {
        Ok(self
            .grades
            .lock()
            .expect("grade mutex poisoned")
            .iter()
            .filter(|grade| &grade.trainee_assign_id == assign)
            .cloned()
            .collect())
    }

    fn record_grade(&self, grade: Grade) -> Result<(), RepositoryError> {
        self.grades.lock().expect("grade mutex poisoned").push(grade);
        Ok(())
    }
}

impl CertificateRepository for MemoryCertificationStore {
    fn certificate(&self, id: &CertificateId) -> Result<Option<Certificate>, RepositoryError> {
        Ok(self
            .certificates
            .lock()
            .expect("certificate mutex poisoned")
            .get(id)
            .cloned())
    }

    fn certificates_for_trainee(
        &self,
        trainee: &TraineeId,
    ) -> Result<Vec<Certificate>, RepositoryError> {
        Ok(self
            .certificates
            .lock()
            .expect("certificate mutex poisoned")
            .values()
            .filter(|certificate| &certificate.trainee_id == trainee)
            .cloned()
            .collect())
    }

    fn active_certificate(
        &self,
        trainee: &TraineeId,
        course: &CourseId,
    ) -> Result<Option<Certificate>, RepositoryError> {
        let guard = self.certificates.lock().expect("certificate mutex poisoned");
        let mut matches: Vec<&Certificate> = guard
            .values()
            .filter(|certificate| {
                &certificate.trainee_id == trainee
                    && &certificate.course_id == course
                    && certificate.status == CertificateStatus::Active
            })
            .collect();
        matches.sort_by_key(|certificate| certificate.issued_on);
        Ok(matches.last().cloned().cloned())
    }

    fn active_certificates_expiring_by(
        &self,
        cutoff: NaiveDate,
    ) -> Result<Vec<Certificate>, RepositoryError> {
        let mut overdue: Vec<Certificate> = self
            .certificates
            .lock()
            .expect("certificate mutex poisoned")
            .values()
            .filter(|certificate| {
                certificate.status == CertificateStatus::Active && certificate.expires_on < cutoff
            })
            .cloned()
            .collect();
        overdue.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(overdue)
    }

    fn commit_batch(
        &self,
        mutations: Vec<CertificateMutation>,
    ) -> Result<Vec<Certificate>, RepositoryError> {
        let mut failures = self.commit_failures.lock().expect("failure mutex poisoned");
        if *failures > 0 {
            *failures -= 1;
            return Err(RepositoryError::Unavailable("database offline".to_string()));
        }
        drop(failures);

        // All-or-nothing: stage on a copy, swap in only when every mutation
        // lands.
        let mut guard = self.certificates.lock().expect("certificate mutex poisoned");
        let mut staged = guard.clone();
        let mut committed = Vec::with_capacity(mutations.len());
        for mutation in mutations {
            committed.push(Self::apply_mutation(&mut staged, mutation)?);
        }
        *guard = staged;
        Ok(committed)
    }
}

impl TemplateRepository for MemoryCertificationStore {
    fn active_templates(&self) -> Result<Vec<CertificateTemplate>, RepositoryError> {
        Ok(self
            .templates
            .lock()
            .expect("template mutex poisoned")
            .iter()
            .filter(|template| template.active)
            .cloned()
            .collect())
    }
}

impl DecisionRepository for MemoryCertificationStore {
    fn decision_for_course(
        &self,
        course: &CourseId,
    ) -> Result<Option<Decision>, RepositoryError> {
        Ok(self
            .decisions
            .lock()
            .expect("decision mutex poisoned")
            .iter()
            .find(|decision| &decision.course_id == course)
            .cloned())
    }

    fn insert_decision(&self, decision: Decision) -> Result<Decision, RepositoryError> {
        self.decisions
            .lock()
            .expect("decision mutex poisoned")
            .push(decision.clone());
        Ok(decision)
    }
}

impl PeopleRepository for MemoryCertificationStore {
    fn instructor(&self, _id: &UserId) -> Result<Option<InstructorProfile>, RepositoryError> {
        Ok(None)
    }

    fn trainee(&self, id: &TraineeId) -> Result<Option<TraineeProfile>, RepositoryError> {
        Ok(self
            .trainees
            .lock()
            .expect("trainee mutex poisoned")
            .get(id)
            .cloned())
    }
}

#[derive(Default)]
pub(super) struct MemoryDocumentStore {
    pub(super) uploads: Mutex<Vec<(String, String)>>,
    pub(super) upload_failures: Mutex<u32>,
}

impl MemoryDocumentStore {
    pub(super) fn fail_next_uploads(&self, count: u32) {
        *self.upload_failures.lock().expect("failure mutex poisoned") = count;
    }

    pub(super) fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().expect("upload mutex poisoned").clone()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn upload(
        &self,
        container: &str,
        name: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, DocumentStoreError> {
        let mut failures = self.upload_failures.lock().expect("failure mutex poisoned");
        if *failures > 0 {
            *failures -= 1;
            return Err(DocumentStoreError::Backend("blob store offline".to_string()));
        }
        drop(failures);

        self.uploads
            .lock()
            .expect("upload mutex poisoned")
            .push((container.to_string(), name.to_string()));
        Ok(format!("mem://{container}/{name}"))
    }

    fn read_url(
        &self,
        url: &str,
        _ttl: std::time::Duration,
    ) -> Result<String, DocumentStoreError> {
        Ok(url.to_string())
    }

    fn delete(&self, _url: &str) -> Result<(), DocumentStoreError> {
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryNotificationSink {
    events: Mutex<Vec<Notification>>,
}

impl MemoryNotificationSink {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationSink for MemoryNotificationSink {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Happy-path seed: two trainees in the initial course, the first fully
/// graded, the second missing the second subject.
pub(super) fn seed_initial_course(store: &MemoryCertificationStore) {
    store.insert_course(initial_course());
    store.add_class_subject("course-i", "cs-01", "sub-01");
    store.add_class_subject("course-i", "cs-02", "sub-02");
    store.add_trainee(trainee("t-01", "Lan Pham"));
    store.add_trainee(trainee("t-02", "Huy Vo"));
    store.add_assign("ta-01", "t-01", "cs-01");
    store.add_assign("ta-02", "t-01", "cs-02");
    store.add_assign("ta-03", "t-02", "cs-01");
    store.add_assign("ta-04", "t-02", "cs-02");
    store.add_grade("ta-01", "sub-01", passing_components());
    store.add_grade("ta-02", "sub-02", passing_components());
    store.add_grade("ta-03", "sub-01", passing_components());
    store.add_template(initial_template(1));
    store.add_template(initial_template(2));
}

pub(super) type TestCertificationService = CertificationService<
    MemoryCertificationStore,
    MemoryDocumentStore,
    MemoryNotificationSink,
>;

pub(super) fn build_certification_service() -> (
    TestCertificationService,
    Arc<MemoryCertificationStore>,
    Arc<MemoryDocumentStore>,
    Arc<MemoryNotificationSink>,
) {
    let store = Arc::new(MemoryCertificationStore::default());
    let documents = Arc::new(MemoryDocumentStore::default());
    let notifications = Arc::new(MemoryNotificationSink::default());
    let service = CertificationService::new(
        store.clone(),
        documents.clone(),
        notifications.clone(),
        Arc::new(PlaceholderRenderer),
    );
    (service, store, documents, notifications)
}
