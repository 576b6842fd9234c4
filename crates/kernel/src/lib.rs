//! World Kernel: client-side world clock and ambient state driven by server reports.
//!
//! # Invariants
//! - `globtime` never decreases between non-incremental time reports.
//! - A light, sky or weather report is applied atomically with respect to readers.
//! - Weather effects whose resources are still loading are deferred, never failed.

pub mod astronomy;
pub mod clock;
pub mod light;
pub mod report;
pub mod weather;
pub mod world;

pub use astronomy::{Astronomy, Season};
pub use clock::{ManualClock, MonotonicClock, TimeReconciler, TimeSource};
pub use light::{LightFade, LightState};
pub use report::{GlobMessage, RawReport, ReportError, ServerReport, SkyState};
pub use weather::{Loading, ResourceProvider, Weather, WeatherFactory, WeatherHandle, WeatherMap};
pub use world::WorldClock;
