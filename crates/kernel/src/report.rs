use crate::astronomy::Astronomy;
use crate::light::LightState;
use serde::{Deserialize, Serialize};
use wayfarer_common::{Color, ResourceRef, Value};

/// Errors from decoding one server report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReportError {
    #[error("unknown report kind: {0}")]
    UnknownKind(String),
    #[error("{kind} report is missing argument {index}")]
    MissingArgument { kind: &'static str, index: usize },
    #[error("{kind} report argument {index} is not a {expected}")]
    TypeMismatch {
        kind: &'static str,
        index: usize,
        expected: &'static str,
    },
}

/// One tagged entry of a server message, before decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReport {
    pub kind: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

/// A batch of reports sharing one incremental/full flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobMessage {
    pub incremental: bool,
    pub reports: Vec<RawReport>,
}

/// Sky layers to draw and how far to blend from the first to the second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SkyState {
    pub primary: Option<ResourceRef>,
    pub secondary: Option<ResourceRef>,
    pub blend: f64,
}

/// A decoded server report.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerReport {
    Time { server_time: f64 },
    Astronomy(Astronomy),
    Light(LightState),
    Sky(SkyState),
    Weather(Vec<(ResourceRef, Vec<Value>)>),
}

/// Positional reader over a report's argument list.
struct Args<'a> {
    kind: &'static str,
    args: &'a [Value],
    next: usize,
}

impl<'a> Args<'a> {
    fn new(kind: &'static str, args: &'a [Value]) -> Self {
        Self { kind, args, next: 0 }
    }

    fn remaining(&self) -> usize {
        self.args.len().saturating_sub(self.next)
    }

    fn take(&mut self) -> Result<&'a Value, ReportError> {
        let index = self.next;
        let v = self.args.get(index).ok_or(ReportError::MissingArgument {
            kind: self.kind,
            index,
        })?;
        self.next += 1;
        Ok(v)
    }

    fn mismatch(&self, expected: &'static str) -> ReportError {
        ReportError::TypeMismatch {
            kind: self.kind,
            index: self.next - 1,
            expected,
        }
    }

    fn f64(&mut self) -> Result<f64, ReportError> {
        let v = self.take()?;
        v.as_f64().ok_or_else(|| self.mismatch("number"))
    }

    fn i64(&mut self) -> Result<i64, ReportError> {
        let v = self.take()?;
        v.as_i64().ok_or_else(|| self.mismatch("integer"))
    }

    fn color(&mut self) -> Result<Color, ReportError> {
        let v = self.take()?;
        v.as_color().ok_or_else(|| self.mismatch("color"))
    }

    fn list(&mut self) -> Result<&'a [Value], ReportError> {
        let v = self.take()?;
        v.as_list().ok_or_else(|| self.mismatch("list"))
    }

    fn resource(&mut self) -> Result<ResourceRef, ReportError> {
        let id = self.i64()?;
        u32::try_from(id)
            .map(ResourceRef)
            .map_err(|_| self.mismatch("resource id"))
    }

    fn angle(&mut self) -> Result<f64, ReportError> {
        let v = self.f64()?;
        if v.is_finite() { Ok(v) } else { Err(self.mismatch("finite angle")) }
    }

    fn i32(&mut self, expected: &'static str) -> Result<i32, ReportError> {
        let v = self.i64()?;
        i32::try_from(v).map_err(|_| self.mismatch(expected))
    }

    fn optional_f64(&mut self, default: f64) -> Result<f64, ReportError> {
        if self.remaining() > 0 { self.f64() } else { Ok(default) }
    }
}

impl ServerReport {
    pub fn decode(kind: &str, args: &[Value]) -> Result<ServerReport, ReportError> {
        match kind {
            "tm" => {
                let mut a = Args::new("tm", args);
                Ok(ServerReport::Time {
                    server_time: a.f64()?,
                })
            }
            "astro" => {
                let mut a = Args::new("astro", args);
                let day_time = a.f64()?;
                let moon_phase = a.f64()?;
                let year_time = a.f64()?;
                let night = a.i64()? != 0;
                let moon_color = a.color()?;
                let season_index = if a.remaining() > 0 {
                    a.i32("season index")?
                } else {
                    Astronomy::DEFAULT_SEASON_INDEX
                };
                let season_progress = a.optional_f64(Astronomy::DEFAULT_SEASON_PROGRESS)?;
                let season_day = a.optional_f64(Astronomy::DEFAULT_SEASON_DAY)?;
                Ok(ServerReport::Astronomy(Astronomy {
                    day_time,
                    moon_phase,
                    year_time,
                    night,
                    moon_color,
                    season_index,
                    season_progress,
                    season_day,
                }))
            }
            "light" => {
                let mut a = Args::new("light", args);
                Ok(ServerReport::Light(LightState {
                    ambient: a.color()?,
                    diffuse: a.color()?,
                    specular: a.color()?,
                    angle: a.angle()?,
                    elevation: a.angle()?,
                }))
            }
            "sky" => {
                let mut a = Args::new("sky", args);
                let mut sky = SkyState::default();
                if a.remaining() > 0 {
                    sky.primary = Some(a.resource()?);
                    if a.remaining() > 0 {
                        sky.secondary = Some(a.resource()?);
                        sky.blend = a.f64()?;
                    }
                }
                Ok(ServerReport::Sky(sky))
            }
            "wth" => {
                let mut a = Args::new("wth", args);
                let mut batch = Vec::with_capacity(args.len() / 2);
                while a.remaining() > 0 {
                    let res = a.resource()?;
                    let params = a.list()?.to_vec();
                    batch.push((res, params));
                }
                Ok(ServerReport::Weather(batch))
            }
            other => Err(ReportError::UnknownKind(other.to_string())),
        }
    }
}
