//! Developer Tooling: world clock inspector, command buffer dumps, program reports.
//!
//! # Invariants
//! - Tools never apply reports, replay buffers or realize programs.

mod inspector;
mod render;

pub use inspector::{ClockInspector, ClockSummary, LightInfo};
pub use render::{ProgramReport, dump_commands};
