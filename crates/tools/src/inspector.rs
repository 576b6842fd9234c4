use wayfarer_common::{Color, ResourceRef};
use wayfarer_kernel::{LightState, SkyState, WorldClock};

/// World clock inspector for developer tooling.
///
/// Read-only queries against a [`WorldClock`] for debugging and the CLI.
pub struct ClockInspector;

impl ClockInspector {
    /// Produce a summary of the clock and ambient state.
    pub fn summary(clock: &WorldClock) -> ClockSummary {
        let (pending_weather, live_weather) = clock.weather_counts();
        ClockSummary {
            globtime: clock.globtime(),
            raw_time: clock.raw_time(),
            light_fading: clock.light_fading(),
            sky: clock.current_sky(),
            pending_weather,
            live_weather,
            server_time: clock.server_time_text(),
        }
    }

    pub fn light(clock: &WorldClock) -> LightInfo {
        LightInfo::from(clock.current_light())
    }

    pub fn weather(clock: &WorldClock) -> Vec<ResourceRef> {
        clock.weather_resources()
    }
}

#[derive(Debug, Clone)]
pub struct ClockSummary {
    pub globtime: f64,
    pub raw_time: f64,
    pub light_fading: bool,
    pub sky: SkyState,
    pub pending_weather: usize,
    pub live_weather: usize,
    pub server_time: Option<String>,
}

impl ClockSummary {
    /// Reconciled minus raw time.
    pub fn drift(&self) -> f64 {
        self.globtime - self.raw_time
    }
}

fn sky_name(sky: &SkyState) -> String {
    match (sky.primary, sky.secondary) {
        (None, _) => "none".into(),
        (Some(p), None) => p.to_string(),
        (Some(p), Some(s)) => format!("{p}->{s}@{:.2}", sky.blend),
    }
}

impl std::fmt::Display for ClockSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Clock: globtime={:.2} raw={:.2} drift={:+.3} fading={} sky={} weather={}/{}",
            self.globtime,
            self.raw_time,
            self.drift(),
            self.light_fading,
            sky_name(&self.sky),
            self.live_weather,
            self.live_weather + self.pending_weather,
        )?;
        if let Some(text) = &self.server_time {
            write!(f, "\n  {text}")?;
        }
        Ok(())
    }
}

/// Light state in 8-bit color and degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct LightInfo {
    pub ambient: [u8; 4],
    pub diffuse: [u8; 4],
    pub specular: [u8; 4],
    pub angle_deg: f64,
    pub elevation_deg: f64,
}

impl From<LightState> for LightInfo {
    fn from(l: LightState) -> Self {
        Self {
            ambient: l.ambient.to_rgba8(),
            diffuse: l.diffuse.to_rgba8(),
            specular: l.specular.to_rgba8(),
            angle_deg: l.angle.to_degrees(),
            elevation_deg: l.elevation.to_degrees(),
        }
    }
}

fn hex(c: [u8; 4]) -> String {
    format!("#{:02x}{:02x}{:02x}{:02x}", c[0], c[1], c[2], c[3])
}

impl std::fmt::Display for LightInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Light: amb={} dif={} spc={} angle={:.1} elev={:.1}",
            hex(self.ambient),
            hex(self.diffuse),
            hex(self.specular),
            self.angle_deg,
            self.elevation_deg,
        )
    }
}

impl LightInfo {
    pub fn ambient_color(&self) -> Color {
        let [r, g, b, a] = self.ambient;
        Color::from_rgba8(r, g, b, a)
    }
}
