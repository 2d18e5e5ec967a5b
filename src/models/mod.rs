// Declare modules
pub mod event;
pub mod occurrence;
pub mod recurrence;
pub mod source;
pub mod sync;

// Flattened so callers can `use calsync::models::Event`.
pub use event::{Event, EventChanges, EventData, PendingOperation};
pub use occurrence::{segments, DisplaySegment, Occurrence};
pub use recurrence::{Frequency, RecurrenceRule};
pub use source::{CalendarSource, SourceKind, SourceMetadata};
pub use sync::{PendingChange, SyncOperation, SyncReport, SyncStatus};
