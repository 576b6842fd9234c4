use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use wayfarer_common::{ClientConfig, ResourceRef, Value};
use wayfarer_kernel::{
    GlobMessage, Loading, ManualClock, ResourceProvider, Weather, WeatherFactory, WeatherHandle, WorldClock,
};
use wayfarer_tools::ClockInspector;

/// A server message and the simulated wall-clock second it arrives at.
#[derive(Debug, Deserialize)]
pub struct TimedMessage {
    pub at: f64,
    #[serde(flatten)]
    pub message: GlobMessage,
}

pub fn load_messages(path: &Path) -> anyhow::Result<Vec<TimedMessage>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut messages: Vec<TimedMessage> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    messages.sort_by(|a, b| a.at.total_cmp(&b.at));
    Ok(messages)
}

/// Weather effect that only logs what happens to it.
struct LoggedWeather {
    res: ResourceRef,
    age: f64,
}

impl Weather for LoggedWeather {
    fn update(&mut self, args: &[Value]) {
        tracing::debug!(res = %self.res, ?args, "weather update");
    }

    fn tick(&mut self, dt: f64) {
        self.age += dt;
        tracing::trace!(res = %self.res, age = self.age, "weather tick");
    }
}

struct LoggedFactory(ResourceRef);

impl WeatherFactory for LoggedFactory {
    fn instantiate(&self, args: &[Value]) -> WeatherHandle {
        tracing::info!(res = %self.0, ?args, "weather started");
        Arc::new(parking_lot::Mutex::new(LoggedWeather { res: self.0, age: 0.0 }))
    }
}

/// Every resource is loaded.
struct AlwaysReady;

impl ResourceProvider for AlwaysReady {
    fn weather_factory(&self, res: ResourceRef) -> Result<Arc<dyn WeatherFactory>, Loading> {
        Ok(Arc::new(LoggedFactory(res)))
    }
}

pub fn run(config: &ClientConfig, messages: Vec<TimedMessage>, seconds: f64, step: f64) -> anyhow::Result<()> {
    anyhow::ensure!(step > 0.0, "--step must be positive, got {step}");
    anyhow::ensure!(seconds >= 0.0, "--seconds must not be negative, got {seconds}");

    let time = Arc::new(ManualClock::new(0.0));
    let world = WorldClock::new(&config.clock, time.clone(), Arc::new(AlwaysReady));
    let mut pending = messages.into_iter().peekable();

    let mut t = 0.0;
    loop {
        time.set(t);
        while let Some(m) = pending.next_if(|m| m.at <= t) {
            let applied = world.apply(&m.message);
            tracing::info!(
                at = m.at,
                incremental = m.message.incremental,
                applied,
                total = m.message.reports.len(),
                "applied server message"
            );
        }
        world.tick();
        world.current_weather();

        println!("t={t:>6.2}  {}", ClockInspector::summary(&world));
        println!("          {}", ClockInspector::light(&world));

        if t >= seconds {
            break;
        }
        t = (t + step).min(seconds);
    }

    if pending.peek().is_some() {
        tracing::warn!(unapplied = pending.count(), "messages scheduled after the end of the run");
    }
    Ok(())
}
