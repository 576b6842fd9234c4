use crate::astronomy::Astronomy;
use crate::clock::{TimeReconciler, TimeSource};
use crate::light::{LightFade, LightState};
use crate::report::{GlobMessage, ServerReport, SkyState};
use crate::weather::{ResourceProvider, WeatherHandle, WeatherMap};
use parking_lot::Mutex;
use std::sync::Arc;
use wayfarer_common::{ClockConfig, ResourceRef};

/// Light, sky, weather and astronomy, mutated together under one lock so
/// readers never see a half-applied report.
#[derive(Debug)]
struct Scene {
    light: LightFade,
    sky: SkyState,
    weather: WeatherMap,
    astronomy: Option<Astronomy>,
    last_tick: Option<f64>,
}

/// Client-side view of the server's world clock and ambient state.
///
/// Mutated by the session thread through [`WorldClock::apply`] and read by
/// the frame tick; both may run concurrently.
pub struct WorldClock {
    clock: Arc<dyn TimeSource>,
    resources: Arc<dyn ResourceProvider>,
    time: Mutex<TimeReconciler>,
    scene: Mutex<Scene>,
}

impl std::fmt::Debug for WorldClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldClock")
            .field("time", &*self.time.lock())
            .field("scene", &*self.scene.lock())
            .finish()
    }
}

impl WorldClock {
    pub fn new(
        config: &ClockConfig,
        clock: Arc<dyn TimeSource>,
        resources: Arc<dyn ResourceProvider>,
    ) -> Self {
        let now = clock.now();
        Self {
            time: Mutex::new(TimeReconciler::new(config, now)),
            scene: Mutex::new(Scene {
                light: LightFade::new(config.light_fade_secs),
                sky: SkyState::default(),
                weather: WeatherMap::new(),
                astronomy: None,
                last_tick: None,
            }),
            clock,
            resources,
        }
    }

    /// Decode and apply every report in a server message. Reports that fail
    /// to decode are logged and skipped. Returns how many were applied.
    pub fn apply(&self, msg: &GlobMessage) -> usize {
        let mut applied = 0;
        for raw in &msg.reports {
            match ServerReport::decode(&raw.kind, &raw.args) {
                Ok(report) => {
                    self.handle(report, msg.incremental);
                    applied += 1;
                }
                Err(err) => tracing::warn!(kind = %raw.kind, %err, "ignoring server report"),
            }
        }
        applied
    }

    /// Apply one decoded report.
    pub fn handle(&self, report: ServerReport, incremental: bool) {
        match report {
            ServerReport::Time { server_time } => {
                let now = self.clock.now();
                self.time.lock().report(server_time, now, incremental);
                tracing::trace!(server_time, incremental, "time report");
            }
            ServerReport::Astronomy(ast) => {
                self.scene.lock().astronomy = Some(ast);
            }
            ServerReport::Light(target) => {
                self.scene.lock().light.apply(target, incremental);
            }
            ServerReport::Sky(sky) => {
                self.scene.lock().sky = sky;
            }
            ServerReport::Weather(batch) => {
                tracing::trace!(entries = batch.len(), incremental, "weather report");
                self.scene.lock().weather.apply(incremental, batch);
            }
        }
    }

    /// Reconciled in-world time.
    pub fn globtime(&self) -> f64 {
        let now = self.clock.now();
        self.time.lock().globtime(now)
    }

    /// Unsmoothed extrapolation from the last server time report.
    pub fn raw_time(&self) -> f64 {
        let now = self.clock.now();
        self.time.lock().raw(now)
    }

    /// Per-frame client tick: advances the light fade and live weather by
    /// the wall-clock time since the previous tick (zero on the first).
    pub fn tick(&self) {
        let now = self.clock.now();
        let mut scene = self.scene.lock();
        let dt = scene.last_tick.map_or(0.0, |last| (now - last).max(0.0));
        scene.last_tick = Some(now);
        Self::advance(&mut scene, dt);
    }

    /// Tick by an explicit delta, independent of the time source.
    pub fn tick_by(&self, dt: f64) {
        Self::advance(&mut self.scene.lock(), dt.max(0.0));
    }

    fn advance(scene: &mut Scene, dt: f64) {
        scene.light.tick(dt);
        scene.weather.tick(dt);
    }

    pub fn current_light(&self) -> LightState {
        self.scene.lock().light.current()
    }

    pub fn light_fading(&self) -> bool {
        self.scene.lock().light.is_fading()
    }

    pub fn current_sky(&self) -> SkyState {
        self.scene.lock().sky
    }

    /// Live weather effects. Pending effects whose resources have finished
    /// loading are instantiated here.
    pub fn current_weather(&self) -> Vec<WeatherHandle> {
        let mut scene = self.scene.lock();
        scene.weather.effects(self.resources.as_ref())
    }

    /// Resources with a weather entry, live or pending.
    pub fn weather_resources(&self) -> Vec<ResourceRef> {
        self.scene.lock().weather.keys().collect()
    }

    /// `(pending, live)` weather entry counts.
    pub fn weather_counts(&self) -> (usize, usize) {
        let scene = self.scene.lock();
        (scene.weather.pending_count(), scene.weather.live_count())
    }

    /// Drop one weather effect outside of a server batch.
    pub fn drop_weather(&self, res: ResourceRef) -> bool {
        self.scene.lock().weather.remove(res)
    }

    pub fn astronomy(&self) -> Option<Astronomy> {
        self.scene.lock().astronomy
    }

    /// In-world date/time line for the HUD, once astronomy is known.
    pub fn server_time_text(&self) -> Option<String> {
        let ast = self.astronomy()?;
        Some(ast.describe(self.globtime()))
    }
}
