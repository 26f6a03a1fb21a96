use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use traincert::workflows::training::domain::{
    Certificate, CertificateId, CertificateStatus, CertificateTemplate, ClassSubject,
    ClassSubjectId, Course, CourseId, CourseProgress, CourseStatus, Decision, Grade,
    InstructorAssignment, InstructorProfile, Request, RequestId, RequestStatus, ScheduleId,
    Subject, TraineeAssign, TraineeAssignId, TraineeId, TraineeProfile, TrainingClass,
    TrainingSchedule, UserId,
};
use traincert::workflows::training::gateway::{
    ApprovalDecision, ApprovalError, ApprovalGate, DocumentStore, DocumentStoreError,
    Notification, NotificationError, NotificationSink,
};
use traincert::workflows::training::repository::{
    CertificateMutation, CertificateRepository, CourseRepository, DecisionRepository,
    GradeRepository, PeopleRepository, RepositoryError, RosterRepository, ScheduleRepository,
    TemplateRepository,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory backing store wiring every repository seam the engine needs.
#[derive(Default)]
pub(crate) struct InMemoryTrainingStore {
    pub(crate) courses: Mutex<HashMap<CourseId, Course>>,
    pub(crate) classes: Mutex<Vec<TrainingClass>>,
    pub(crate) class_subjects: Mutex<Vec<ClassSubject>>,
    pub(crate) schedules: Mutex<HashMap<ScheduleId, TrainingSchedule>>,
    pub(crate) assignments: Mutex<HashMap<ClassSubjectId, InstructorAssignment>>,
    pub(crate) assigns: Mutex<Vec<TraineeAssign>>,
    pub(crate) grades: Mutex<Vec<Grade>>,
    pub(crate) certificates: Mutex<HashMap<CertificateId, Certificate>>,
    pub(crate) templates: Mutex<Vec<CertificateTemplate>>,
    pub(crate) decisions: Mutex<Vec<Decision>>,
    pub(crate) trainees: Mutex<HashMap<TraineeId, TraineeProfile>>,
    pub(crate) instructors: Mutex<HashMap<UserId, InstructorProfile>>,
    pub(crate) subjects: Mutex<Vec<Subject>>,
}

impl InMemoryTrainingStore {
    /// Snapshot of the inputs the grade import roster index is built from,
    /// scoped to one course so repeated offerings of a subject do not
    /// collide on the same (trainee, subject code) key.
    pub(crate) fn roster_inputs(
        &self,
        course: &CourseId,
    ) -> Result<
        (
            Vec<TraineeProfile>,
            Vec<TraineeAssign>,
            Vec<ClassSubject>,
            Vec<Subject>,
        ),
        RepositoryError,
    > {
        Ok((
            self.trainees
                .lock()
                .expect("trainee mutex poisoned")
                .values()
                .cloned()
                .collect(),
            self.assigns_for_course(course)?,
            self.class_subjects(course)?,
            self.subjects.lock().expect("subject mutex poisoned").clone(),
        ))
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

impl CourseRepository for InMemoryTrainingStore {
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
        let mut courses: Vec<Course> = self
            .courses
            .lock()
            .expect("course mutex poisoned")
            .values()
            .filter(|course| {
                course.status == CourseStatus::Approved
                    && course.progress != CourseProgress::Completed
            })
            .cloned()
            .collect();
        courses.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(courses)
    }

    fn update_progress(
        &self,
        id: &CourseId,
        progress: CourseProgress,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.courses.lock().expect("course mutex poisoned");
        let course = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        course.progress = progress;
        Ok(())
    }
}

impl PeopleRepository for InMemoryTrainingStore {
    fn instructor(&self, id: &UserId) -> Result<Option<InstructorProfile>, RepositoryError> {
        Ok(self
            .instructors
            .lock()
            .expect("instructor mutex poisoned")
            .get(id)
            .cloned())
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

impl RosterRepository for InMemoryTrainingStore {
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

impl GradeRepository for InMemoryTrainingStore {
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
        let mut guard = self.grades.lock().expect("grade mutex poisoned");
        guard.retain(|existing| {
            !(existing.trainee_assign_id == grade.trainee_assign_id
                && existing.subject_id == grade.subject_id)
        });
        guard.push(grade);
        Ok(())
    }
}

impl ScheduleRepository for InMemoryTrainingStore {
    fn schedule_for_class_subject(
        &self,
        class_subject: &ClassSubjectId,
    ) -> Result<Option<TrainingSchedule>, RepositoryError> {
        Ok(self
            .schedules
            .lock()
            .expect("schedule mutex poisoned")
            .values()
            .find(|schedule| &schedule.class_subject_id == class_subject)
            .cloned())
    }

    fn schedules_for_room(
        &self,
        location: &str,
        room: &str,
    ) -> Result<Vec<TrainingSchedule>, RepositoryError> {
        Ok(self
            .schedules
            .lock()
            .expect("schedule mutex poisoned")
            .values()
            .filter(|schedule| schedule.location == location && schedule.room == room)
            .cloned()
            .collect())
    }

    fn schedules_for_instructor(
        &self,
        instructor: &UserId,
    ) -> Result<Vec<TrainingSchedule>, RepositoryError> {
        Ok(self
            .schedules
            .lock()
            .expect("schedule mutex poisoned")
            .values()
            .filter(|schedule| &schedule.instructor_id == instructor)
            .cloned()
            .collect())
    }

    fn persist_with_assignment(
        &self,
        schedule: TrainingSchedule,
        assignment: InstructorAssignment,
    ) -> Result<TrainingSchedule, RepositoryError> {
        self.schedules
            .lock()
            .expect("schedule mutex poisoned")
            .insert(schedule.id.clone(), schedule.clone());
        self.assignments
            .lock()
            .expect("assignment mutex poisoned")
            .insert(assignment.class_subject_id.clone(), assignment);
        Ok(schedule)
    }
}

impl CertificateRepository for InMemoryTrainingStore {
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

impl TemplateRepository for InMemoryTrainingStore {
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

impl DecisionRepository for InMemoryTrainingStore {
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

/// Blob store keeping rendered artifacts in memory.
#[derive(Default)]
pub(crate) struct InMemoryDocumentStore {
    pub(crate) documents: Mutex<HashMap<String, Vec<u8>>>,
}

impl DocumentStore for InMemoryDocumentStore {
    fn upload(
        &self,
        container: &str,
        name: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, DocumentStoreError> {
        let url = format!("mem://{container}/{name}");
        self.documents
            .lock()
            .expect("document mutex poisoned")
            .insert(url.clone(), bytes);
        Ok(url)
    }

    fn read_url(
        &self,
        url: &str,
        _ttl: std::time::Duration,
    ) -> Result<String, DocumentStoreError> {
        let guard = self.documents.lock().expect("document mutex poisoned");
        if guard.contains_key(url) {
            Ok(url.to_string())
        } else {
            Err(DocumentStoreError::NotFound(url.to_string()))
        }
    }

    fn delete(&self, url: &str) -> Result<(), DocumentStoreError> {
        self.documents
            .lock()
            .expect("document mutex poisoned")
            .remove(url);
        Ok(())
    }
}

/// Notification sink that records and logs instead of delivering.
#[derive(Default)]
pub(crate) struct LogNotificationSink {
    events: Mutex<Vec<Notification>>,
}

impl LogNotificationSink {
    pub(crate) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notification mutex poisoned").clone()
    }
}

impl NotificationSink for LogNotificationSink {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        tracing::info!(
            user = %notification.user_id.0,
            title = %notification.title,
            "notification dispatched"
        );
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Approval gate holding request envelopes in memory.
#[derive(Default)]
pub(crate) struct InMemoryApprovalGate {
    requests: Mutex<HashMap<RequestId, Request>>,
}

impl ApprovalGate for InMemoryApprovalGate {
    fn submit(&self, request: Request) -> Result<Request, ApprovalError> {
        let mut guard = self.requests.lock().expect("request mutex poisoned");
        guard.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn resolve(
        &self,
        id: &RequestId,
        decision: ApprovalDecision,
        approver: UserId,
    ) -> Result<Request, ApprovalError> {
        let mut guard = self.requests.lock().expect("request mutex poisoned");
        let request = guard.get_mut(id).ok_or(ApprovalError::UnknownRequest)?;
        if request.status != RequestStatus::Pending {
            return Err(ApprovalError::AlreadyResolved);
        }
        request.status = match decision {
            ApprovalDecision::Approve => RequestStatus::Approved,
            ApprovalDecision::Reject => RequestStatus::Rejected,
        };
        request.approver = Some(approver);
        Ok(request.clone())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
