use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::FeeAllocationError;
use crate::types::*;
use crate::FeeAllocationResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// A teacher and the subjects they may teach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    pub id: RecordId,
    #[serde(default)]
    pub name: Option<String>,
    pub subjects: Vec<String>,
}

/// One class taught in one period of one day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub class_id: RecordId,
    pub day: Weekday,
    /// 1-based period number
    pub period: u32,
    pub subject: String,
    pub teacher_id: RecordId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimetableInput {
    /// Teaching periods per day
    pub period_count: u32,
    pub teachers: Vec<Teacher>,
    pub assignments: Vec<Assignment>,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimetableViolation {
    #[error("{class_id} on {day} period {period}: period does not exist")]
    PeriodOutOfRange {
        class_id: RecordId,
        day: Weekday,
        period: u32,
    },

    #[error("{class_id} on {day} period {period}: unknown teacher '{teacher_id}'")]
    UnknownTeacher {
        class_id: RecordId,
        day: Weekday,
        period: u32,
        teacher_id: RecordId,
    },

    #[error("{class_id} on {day} period {period}: teacher '{teacher_id}' does not teach {subject}")]
    NotQualified {
        class_id: RecordId,
        day: Weekday,
        period: u32,
        teacher_id: RecordId,
        subject: String,
    },

    #[error("Teacher '{teacher_id}' has {} classes on {day} period {period}", .classes.len())]
    TeacherDoubleBooked {
        teacher_id: RecordId,
        day: Weekday,
        period: u32,
        classes: Vec<RecordId>,
    },

    #[error("{class_id} has {count} assignments on {day} period {period}")]
    ClassDoubleBooked {
        class_id: RecordId,
        day: Weekday,
        period: u32,
        count: usize,
    },
}

/// Periods taught per teacher across the week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherLoad {
    pub teacher_id: RecordId,
    pub periods: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimetableReport {
    pub is_valid: bool,
    pub assignments_checked: usize,
    pub violations: Vec<TimetableViolation>,
    pub teacher_load: Vec<TeacherLoad>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

type SlotKey = (u32, u32, RecordId);

/// Check every assignment against teacher qualifications and slot clashes.
///
/// All violations are collected; the report is valid only when there are
/// none.
pub fn validate_timetable(
    input: &TimetableInput,
) -> FeeAllocationResult<ComputationOutput<TimetableReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.period_count == 0 {
        return Err(FeeAllocationError::InvalidInput {
            field: "period_count".into(),
            reason: "At least one period per day is required".into(),
        });
    }

    let mut teachers: HashMap<&str, HashSet<&str>> = HashMap::new();
    for t in &input.teachers {
        let subjects = t.subjects.iter().map(|s| s.as_str()).collect();
        if teachers.insert(t.id.as_str(), subjects).is_some() {
            return Err(FeeAllocationError::InvalidInput {
                field: "teachers".into(),
                reason: format!("Duplicate teacher id '{}'", t.id),
            });
        }
    }

    let mut violations: Vec<TimetableViolation> = Vec::new();
    // (day, period, teacher) -> classes; (day, period, class) -> count
    let mut by_teacher: BTreeMap<SlotKey, (Weekday, Vec<RecordId>)> = BTreeMap::new();
    let mut by_class: BTreeMap<SlotKey, (Weekday, usize)> = BTreeMap::new();
    let mut load: BTreeMap<&str, usize> = BTreeMap::new();

    for a in &input.assignments {
        if a.period == 0 || a.period > input.period_count {
            violations.push(TimetableViolation::PeriodOutOfRange {
                class_id: a.class_id.clone(),
                day: a.day,
                period: a.period,
            });
            continue;
        }

        match teachers.get(a.teacher_id.as_str()) {
            None => violations.push(TimetableViolation::UnknownTeacher {
                class_id: a.class_id.clone(),
                day: a.day,
                period: a.period,
                teacher_id: a.teacher_id.clone(),
            }),
            Some(subjects) if !subjects.contains(a.subject.as_str()) => {
                violations.push(TimetableViolation::NotQualified {
                    class_id: a.class_id.clone(),
                    day: a.day,
                    period: a.period,
                    teacher_id: a.teacher_id.clone(),
                    subject: a.subject.clone(),
                })
            }
            Some(_) => {}
        }

        let day = a.day.num_days_from_monday();
        by_teacher
            .entry((day, a.period, a.teacher_id.clone()))
            .or_insert_with(|| (a.day, Vec::new()))
            .1
            .push(a.class_id.clone());
        by_class
            .entry((day, a.period, a.class_id.clone()))
            .or_insert((a.day, 0))
            .1 += 1;
        *load.entry(a.teacher_id.as_str()).or_insert(0) += 1;
    }

    for ((_, period, teacher_id), (day, classes)) in by_teacher {
        if classes.len() > 1 {
            violations.push(TimetableViolation::TeacherDoubleBooked {
                teacher_id,
                day,
                period,
                classes,
            });
        }
    }
    for ((_, period, class_id), (day, count)) in by_class {
        if count > 1 {
            violations.push(TimetableViolation::ClassDoubleBooked {
                class_id,
                day,
                period,
                count,
            });
        }
    }

    for t in &input.teachers {
        if !load.contains_key(t.id.as_str()) {
            warnings.push(format!("Teacher '{}' has no periods assigned", t.id));
        }
    }

    let report = TimetableReport {
        is_valid: violations.is_empty(),
        assignments_checked: input.assignments.len(),
        violations,
        teacher_load: load
            .into_iter()
            .map(|(id, periods)| TeacherLoad {
                teacher_id: id.to_string(),
                periods,
            })
            .collect(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Timetable assignment check (qualification and clash detection)",
        &serde_json::json!({
            "period_count": input.period_count,
            "num_teachers": input.teachers.len(),
            "num_assignments": input.assignments.len(),
        }),
        warnings,
        elapsed,
        report,
    ))
}
