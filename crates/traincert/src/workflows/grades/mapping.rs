use std::collections::HashMap;

use super::normalizer::normalize_key;
use crate::workflows::training::domain::{
    ClassSubject, RequestStatus, Subject, TraineeAssign, TraineeAssignId, TraineeProfile,
};

/// Lookup from (trainee email, subject code) to the assignment a grade row
/// belongs to, built once per import.
pub struct RosterIndex {
    entries: HashMap<(String, String), (TraineeAssignId, Subject)>,
}

impl RosterIndex {
    pub fn build(
        trainees: &[TraineeProfile],
        assigns: &[TraineeAssign],
        class_subjects: &[ClassSubject],
        subjects: &[Subject],
    ) -> Self {
        let profiles: HashMap<_, _> = trainees
            .iter()
            .map(|profile| (&profile.id, profile))
            .collect();
        let class_subject_index: HashMap<_, _> = class_subjects
            .iter()
            .map(|class_subject| (&class_subject.id, class_subject))
            .collect();
        let subject_index: HashMap<_, _> = subjects
            .iter()
            .map(|subject| (&subject.id, subject))
            .collect();

        let mut entries = HashMap::new();
        for assign in assigns
            .iter()
            .filter(|assign| assign.status == RequestStatus::Approved)
        {
            let Some(profile) = profiles.get(&assign.trainee_id) else {
                continue;
            };
            let Some(class_subject) = class_subject_index.get(&assign.class_subject_id) else {
                continue;
            };
            let Some(subject) = subject_index.get(&class_subject.subject_id) else {
                continue;
            };

            entries.insert(
                (
                    normalize_key(&profile.email),
                    normalize_key(&subject.code),
                ),
                (assign.id.clone(), (*subject).clone()),
            );
        }

        Self { entries }
    }

    pub(crate) fn lookup(
        &self,
        trainee_email: &str,
        subject_code: &str,
    ) -> Option<&(TraineeAssignId, Subject)> {
        self.entries
            .get(&(trainee_email.to_string(), subject_code.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
