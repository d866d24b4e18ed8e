pub mod allocation;
pub mod timetable;
