//! Domain models - schedule types and calendar handling
//!
//! - `types` - Visit, DayRecord, WeekRecord, VisitResult and the upstream Document
//! - `dates` - weekday labels, human-written dates, request date parsing

pub mod dates;
pub mod types;

pub use dates::InvalidDateInput;
pub use types::{DayRecord, Document, ScheduleSnapshot, Visit, VisitResult, WeekRecord};
