use std::collections::HashSet;
use std::time::Instant;

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::FeeAllocationError;
use crate::types::*;
use crate::FeeAllocationResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Shape of a school day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayScheduleInput {
    /// First bell
    pub day_start: NaiveTime,
    /// Length of every teaching period
    pub period_minutes: u32,
    pub period_count: u32,
    #[serde(default)]
    pub breaks: Vec<BreakSpec>,
    /// Latest allowed end of the last slot
    #[serde(default)]
    pub day_end: Option<NaiveTime>,
}

/// A break inserted after a given period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakSpec {
    /// 1-based period number the break follows
    pub after_period: u32,
    pub minutes: u32,
    #[serde(default = "default_break_label")]
    pub label: String,
}

fn default_break_label() -> String {
    "Break".to_string()
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotKind {
    Period { number: u32 },
    Break { label: String },
}

/// One contiguous block of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(flatten)]
    pub kind: SlotKind,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub slots: Vec<Slot>,
    pub day_end: NaiveTime,
    pub teaching_minutes: u32,
    pub break_minutes: u32,
}

impl DaySchedule {
    /// Number of teaching periods in the day.
    pub fn period_count(&self) -> u32 {
        self.slots
            .iter()
            .filter(|s| matches!(s.kind, SlotKind::Period { .. }))
            .count() as u32
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Slice a school day into consecutive periods and breaks.
pub fn generate_periods(
    input: &DayScheduleInput,
) -> FeeAllocationResult<ComputationOutput<DaySchedule>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    let mut slots: Vec<Slot> = Vec::new();
    let mut cursor = input.day_start;
    let mut teaching_minutes = 0u32;
    let mut break_minutes = 0u32;

    for number in 1..=input.period_count {
        let end = advance(cursor, input.period_minutes)?;
        slots.push(Slot {
            kind: SlotKind::Period { number },
            start: cursor,
            end,
            minutes: input.period_minutes,
        });
        teaching_minutes += input.period_minutes;
        cursor = end;

        // The last period never has a break after it (rejected in validation)
        if let Some(brk) = input.breaks.iter().find(|b| b.after_period == number) {
            let end = advance(cursor, brk.minutes)?;
            slots.push(Slot {
                kind: SlotKind::Break {
                    label: brk.label.clone(),
                },
                start: cursor,
                end,
                minutes: brk.minutes,
            });
            break_minutes += brk.minutes;
            cursor = end;
        }
    }

    if let Some(limit) = input.day_end {
        if cursor > limit {
            return Err(FeeAllocationError::Schedule(format!(
                "Day ends at {} which is after the allowed end {}",
                cursor.format("%H:%M"),
                limit.format("%H:%M")
            )));
        }
        let idle = (limit - cursor).num_minutes();
        if idle > 0 {
            warnings.push(format!("{idle} minutes unused before {}", limit.format("%H:%M")));
        }
    }

    let output = DaySchedule {
        slots,
        day_end: cursor,
        teaching_minutes,
        break_minutes,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "School day period generation",
        &serde_json::json!({
            "day_start": input.day_start.format("%H:%M").to_string(),
            "period_minutes": input.period_minutes,
            "period_count": input.period_count,
            "num_breaks": input.breaks.len(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn validate_input(input: &DayScheduleInput) -> FeeAllocationResult<()> {
    if input.period_minutes == 0 {
        return Err(FeeAllocationError::InvalidInput {
            field: "period_minutes".into(),
            reason: "Periods must be at least one minute long".into(),
        });
    }
    if input.period_count == 0 {
        return Err(FeeAllocationError::InvalidInput {
            field: "period_count".into(),
            reason: "At least one period is required".into(),
        });
    }

    let mut seen = HashSet::new();
    for brk in &input.breaks {
        if brk.after_period == 0 || brk.after_period >= input.period_count {
            return Err(FeeAllocationError::InvalidInput {
                field: "breaks".into(),
                reason: format!(
                    "Break '{}' after period {} must fall between periods 1 and {}",
                    brk.label, brk.after_period, input.period_count
                ),
            });
        }
        if brk.minutes == 0 {
            return Err(FeeAllocationError::InvalidInput {
                field: "breaks".into(),
                reason: format!("Break '{}' has zero length", brk.label),
            });
        }
        if !seen.insert(brk.after_period) {
            return Err(FeeAllocationError::InvalidInput {
                field: "breaks".into(),
                reason: format!("More than one break after period {}", brk.after_period),
            });
        }
    }
    Ok(())
}

fn advance(time: NaiveTime, minutes: u32) -> FeeAllocationResult<NaiveTime> {
    let (next, overflow) = time.overflowing_add_signed(Duration::minutes(i64::from(minutes)));
    if overflow != 0 {
        return Err(FeeAllocationError::Schedule(format!(
            "Schedule runs past midnight after {}",
            time.format("%H:%M")
        )));
    }
    Ok(next)
}
