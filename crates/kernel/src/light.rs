use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use wayfarer_common::Color;

/// Global light parameters as displayed by the scene renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    pub ambient: Color,
    pub diffuse: Color,
    pub specular: Color,
    /// Sun azimuth in radians.
    pub angle: f64,
    /// Sun elevation in radians.
    pub elevation: f64,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            ambient: Color::DEFAULT_AMBIENT,
            diffuse: Color::WHITE,
            specular: Color::WHITE,
            angle: 0.0,
            elevation: 0.0,
        }
    }
}

impl LightState {
    /// Interpolate toward `to`. Colors blend component-wise; angles take the
    /// shortest way around the circle.
    pub fn blend(&self, to: &LightState, a: f64) -> LightState {
        let t = a as f32;
        LightState {
            ambient: self.ambient.lerp(to.ambient, t),
            diffuse: self.diffuse.lerp(to.diffuse, t),
            specular: self.specular.lerp(to.specular, t),
            angle: self.angle + a * wrap_angle(to.angle - self.angle),
            elevation: self.elevation + a * wrap_angle(to.elevation - self.elevation),
        }
    }
}

/// Normalize an angle difference into `[-PI, PI)`. Non-finite input maps
/// to zero.
pub fn wrap_angle(a: f64) -> f64 {
    if !a.is_finite() {
        return 0.0;
    }
    (a + PI).rem_euclid(2.0 * PI) - PI
}

/// Cross-fade between light snapshots.
///
/// Idle while `progress` is `None`; otherwise `progress` holds the seconds
/// elapsed since the fade began.
#[derive(Debug, Clone)]
pub struct LightFade {
    current: LightState,
    start: LightState,
    target: LightState,
    progress: Option<f64>,
    duration: f64,
}

impl LightFade {
    pub fn new(duration: f64) -> Self {
        Self {
            current: LightState::default(),
            start: LightState::default(),
            target: LightState::default(),
            progress: None,
            duration,
        }
    }

    pub fn current(&self) -> LightState {
        self.current
    }

    pub fn target(&self) -> LightState {
        self.target
    }

    pub fn is_fading(&self) -> bool {
        self.progress.is_some()
    }

    /// Elapsed fade seconds, or `None` when idle.
    pub fn progress(&self) -> Option<f64> {
        self.progress
    }

    /// Apply a light report. Incremental reports fade from whatever is
    /// displayed right now; full reports snap.
    pub fn apply(&mut self, target: LightState, incremental: bool) {
        self.target = target;
        if incremental {
            self.start = self.current;
            self.progress = Some(0.0);
        } else {
            self.current = target;
            self.progress = None;
        }
    }

    pub fn tick(&mut self, dt: f64) {
        let Some(elapsed) = self.progress else {
            return;
        };
        let elapsed = elapsed + dt;
        if elapsed >= self.duration {
            self.current = self.target;
            self.progress = None;
        } else {
            self.current = self.start.blend(&self.target, elapsed / self.duration);
            self.progress = Some(elapsed);
        }
    }
}
