//! Infrastructure adapters: posting surfaces, entry stores and calendars.

pub mod calendar;
pub mod store;
pub mod surface;

pub use calendar::{
    CompositeCalendar, DateListExclusion, ExclusionCalendar, FnCalendar, NoExclusions,
    WeekdayExclusion,
};
pub use store::{EntryStore, InMemoryEntryStore, SqliteEntryStore, StoreError};
pub use surface::{InMemorySurface, PostUpdate, PostingSurface, SurfaceError, SurfacePost};
