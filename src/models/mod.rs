pub mod binding;
pub mod course;
pub mod page;
pub mod participant;

pub use binding::CalendarBinding;
pub use course::{CourseAggregate, CourseStatus, NewCourseRequest, term_for_date};
pub use page::{Page, PageParams};
pub use participant::{CourseParticipants, Participant, Role};
