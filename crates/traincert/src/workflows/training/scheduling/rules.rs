use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime, Weekday};

use super::super::domain::{
    is_allowed_class_time, ClassSubjectId, ScheduleId, ScheduleStatus, SpecialtyId,
    TrainingSchedule, UserId, MAX_SESSION_MINUTES, MIN_SESSION_MINUTES,
};

/// Candidate schedule under validation. `schedule_id` is set when the draft
/// replaces an already persisted schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleDraft {
    pub schedule_id: Option<ScheduleId>,
    pub class_subject_id: ClassSubjectId,
    pub instructor_id: UserId,
    pub teaching_days: BTreeSet<Weekday>,
    pub class_time: NaiveTime,
    pub duration_minutes: u32,
    pub start_day: NaiveDate,
    pub end_day: NaiveDate,
    pub location: String,
    pub room: String,
}

impl ScheduleDraft {
    fn time_interval(&self) -> (NaiveTime, NaiveTime) {
        let end = self.class_time + chrono::Duration::minutes(i64::from(self.duration_minutes));
        (self.class_time, end)
    }
}

/// Everything a rule may consult while judging a draft.
#[derive(Debug)]
pub struct RuleContext<'a> {
    pub draft: &'a ScheduleDraft,
    pub today: NaiveDate,
    pub subject_specialty: &'a SpecialtyId,
    pub instructor_specialty: &'a SpecialtyId,
    pub existing_for_class_subject: Option<&'a TrainingSchedule>,
    pub room_schedules: &'a [TrainingSchedule],
    pub instructor_schedules: &'a [TrainingSchedule],
}

/// Typed rejection raised by the first failing rule; never coerced silently.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleRejection {
    #[error("class subject already owns schedule {existing:?}")]
    DuplicateSchedule { existing: ScheduleId },
    #[error("instructor specialty {instructor:?} does not match subject specialty {subject:?}")]
    SpecialtyMismatch {
        instructor: SpecialtyId,
        subject: SpecialtyId,
    },
    #[error("class time {class_time} is not one of the allowed start times")]
    UnsupportedClassTime { class_time: NaiveTime },
    #[error(
        "session length {minutes} minutes outside allowed \
         {MIN_SESSION_MINUTES}..={MAX_SESSION_MINUTES}"
    )]
    DurationOutOfRange { minutes: u32 },
    #[error("start day {start} must fall strictly before end day {end}")]
    EmptyDateRange { start: NaiveDate, end: NaiveDate },
    #[error("start day {start} is in the past")]
    StartInPast { start: NaiveDate },
    #[error("no teaching days selected")]
    NoTeachingDays,
    #[error("room {room} at {location} is occupied by schedule {conflicting:?}")]
    RoomConflict {
        location: String,
        room: String,
        conflicting: ScheduleId,
    },
    #[error("instructor already teaches schedule {conflicting:?} in the same window")]
    InstructorConflict { conflicting: ScheduleId },
}

impl ScheduleRejection {
    /// The persisted schedule a conflict rejection points at, if any.
    pub fn conflicting_schedule(&self) -> Option<&ScheduleId> {
        match self {
            ScheduleRejection::DuplicateSchedule { existing } => Some(existing),
            ScheduleRejection::RoomConflict { conflicting, .. }
            | ScheduleRejection::InstructorConflict { conflicting } => Some(conflicting),
            _ => None,
        }
    }
}

type Rule = fn(&RuleContext<'_>) -> Result<(), ScheduleRejection>;

/// Ordered rule table; the first failure wins.
const RULES: &[(&str, Rule)] = &[
    ("one_schedule_per_class_subject", one_schedule_per_class_subject),
    ("instructor_specialty_matches", instructor_specialty_matches),
    ("class_time_allowed", class_time_allowed),
    ("duration_within_bounds", duration_within_bounds),
    ("teaching_days_selected", teaching_days_selected),
    ("date_range_usable", date_range_usable),
    ("room_free", room_free),
    ("instructor_free", instructor_free),
];

/// Judge a draft against every rule in order.
pub fn validate(context: &RuleContext<'_>) -> Result<(), ScheduleRejection> {
    for (name, rule) in RULES {
        if let Err(rejection) = rule(context) {
            tracing::debug!(rule = name, %rejection, "schedule draft rejected");
            return Err(rejection);
        }
    }
    Ok(())
}

fn one_schedule_per_class_subject(context: &RuleContext<'_>) -> Result<(), ScheduleRejection> {
    match context.existing_for_class_subject {
        Some(existing) if context.draft.schedule_id.as_ref() != Some(&existing.id) => {
            Err(ScheduleRejection::DuplicateSchedule {
                existing: existing.id.clone(),
            })
        }
        _ => Ok(()),
    }
}

fn instructor_specialty_matches(context: &RuleContext<'_>) -> Result<(), ScheduleRejection> {
    if context.instructor_specialty == context.subject_specialty {
        Ok(())
    } else {
        Err(ScheduleRejection::SpecialtyMismatch {
            instructor: context.instructor_specialty.clone(),
            subject: context.subject_specialty.clone(),
        })
    }
}

fn class_time_allowed(context: &RuleContext<'_>) -> Result<(), ScheduleRejection> {
    if is_allowed_class_time(context.draft.class_time) {
        Ok(())
    } else {
        Err(ScheduleRejection::UnsupportedClassTime {
            class_time: context.draft.class_time,
        })
    }
}

fn duration_within_bounds(context: &RuleContext<'_>) -> Result<(), ScheduleRejection> {
    let minutes = context.draft.duration_minutes;
    if (MIN_SESSION_MINUTES..=MAX_SESSION_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(ScheduleRejection::DurationOutOfRange { minutes })
    }
}

fn teaching_days_selected(context: &RuleContext<'_>) -> Result<(), ScheduleRejection> {
    if context.draft.teaching_days.is_empty() {
        Err(ScheduleRejection::NoTeachingDays)
    } else {
        Ok(())
    }
}

fn date_range_usable(context: &RuleContext<'_>) -> Result<(), ScheduleRejection> {
    let draft = context.draft;
    if draft.start_day >= draft.end_day {
        return Err(ScheduleRejection::EmptyDateRange {
            start: draft.start_day,
            end: draft.end_day,
        });
    }
    if draft.start_day < context.today {
        return Err(ScheduleRejection::StartInPast {
            start: draft.start_day,
        });
    }
    Ok(())
}

fn room_free(context: &RuleContext<'_>) -> Result<(), ScheduleRejection> {
    match first_collision(context, context.room_schedules) {
        Some(conflicting) => Err(ScheduleRejection::RoomConflict {
            location: context.draft.location.clone(),
            room: context.draft.room.clone(),
            conflicting,
        }),
        None => Ok(()),
    }
}

fn instructor_free(context: &RuleContext<'_>) -> Result<(), ScheduleRejection> {
    match first_collision(context, context.instructor_schedules) {
        Some(conflicting) => Err(ScheduleRejection::InstructorConflict { conflicting }),
        None => Ok(()),
    }
}

/// Triple-overlap test: date ranges, weekday sets, and half-open daily time
/// intervals must all intersect for two schedules to collide.
fn first_collision(
    context: &RuleContext<'_>,
    others: &[TrainingSchedule],
) -> Option<ScheduleId> {
    let draft = context.draft;
    others
        .iter()
        .filter(|other| !matches!(other.status, ScheduleStatus::Canceled))
        .filter(|other| draft.schedule_id.as_ref() != Some(&other.id))
        .filter(|other| other.class_subject_id != draft.class_subject_id)
        .find(|other| {
            date_ranges_overlap(
                (draft.start_day, draft.end_day),
                (other.start_day, other.end_day),
            ) && weekday_sets_intersect(&draft.teaching_days, &other.teaching_days)
                && time_intervals_overlap(draft.time_interval(), other.time_interval())
        })
        .map(|other| other.id.clone())
}

fn date_ranges_overlap(a: (NaiveDate, NaiveDate), b: (NaiveDate, NaiveDate)) -> bool {
    a.0 <= b.1 && b.0 <= a.1
}

fn weekday_sets_intersect(a: &BTreeSet<Weekday>, b: &BTreeSet<Weekday>) -> bool {
    a.iter().any(|day| b.contains(day))
}

fn time_intervals_overlap(a: (NaiveTime, NaiveTime), b: (NaiveTime, NaiveTime)) -> bool {
    a.0 < b.1 && b.0 < a.1
}
