mod kinds;
mod lenient;
mod location;
pub(crate) mod report;
mod volunteer;

pub use kinds::{Category, Severity, Status};
pub use location::Location;
pub use report::{NewReport, REPORT_ID_PREFIX, Report, new_report_id};
pub use volunteer::{
    NewVolunteer, Skill, VOLUNTEER_ID_PREFIX, Volunteer, dedup_skills, new_volunteer_id,
};

pub(crate) use kinds::capitalize;
