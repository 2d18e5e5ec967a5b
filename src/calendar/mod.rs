// Calendar data handling
// ICS codec, recurrence expansion and the remote collaborator boundary

pub mod common;
pub mod ics;
pub mod ics_feed;
pub mod recurrence;
pub mod remote;

pub use ics::{generate_event, parse_calendar};
pub use ics_feed::IcsFeed;
pub use recurrence::{expand, span};
pub use remote::{RemoteCalendar, TimeRange};
