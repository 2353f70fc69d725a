pub mod clock;
pub mod retry;
pub mod telemetry;
pub mod text;

pub use clock::*;
pub use retry::*;
pub use telemetry::*;
pub use text::*;
