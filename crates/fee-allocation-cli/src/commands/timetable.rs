use clap::Args;
use serde_json::Value;

use fee_allocation_core::timetable::assignments::{self, TimetableInput};
use fee_allocation_core::timetable::periods::{self, DayScheduleInput};

use crate::input;

/// Arguments for generating the periods of a school day
#[derive(Args)]
pub struct PeriodsArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for checking teacher and class assignments
#[derive(Args)]
pub struct CheckTimetableArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_periods(args: PeriodsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let day_input: DayScheduleInput =
        input::read_input(args.input.as_deref(), "period generation")?;
    let result = periods::generate_periods(&day_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_check_timetable(args: CheckTimetableArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let tt_input: TimetableInput =
        input::read_input(args.input.as_deref(), "timetable check")?;
    let result = assignments::validate_timetable(&tt_input)?;
    Ok(serde_json::to_value(result)?)
}
