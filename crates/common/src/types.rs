use glam::Vec4;
use serde::{Deserialize, Serialize};

/// Opaque reference to a server-side resource (sky, weather effect, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef(pub u32);

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "res#{}", self.0)
    }
}

/// Linear RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color(pub Vec4);

impl Color {
    pub const WHITE: Color = Color(Vec4::ONE);
    pub const BLACK: Color = Color(Vec4::new(0.0, 0.0, 0.0, 1.0));

    /// Ambient light used before the server has sent any light report.
    pub const DEFAULT_AMBIENT: Color = Color(Vec4::new(200.0 / 255.0, 200.0 / 255.0, 200.0 / 255.0, 1.0));

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0)
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let c = (self.0.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
        [c.x as u8, c.y as u8, c.z as u8, c.w as u8]
    }

    /// Component-wise linear interpolation; `t = 0` gives `self`, `t = 1` gives `to`.
    pub fn lerp(self, to: Color, t: f32) -> Color {
        Color(self.0.lerp(to.0, t))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// One argument of a decoded server message.
///
/// Numbers arrive either as integers or floats depending on the sender, so
/// readers go through the `as_*` accessors rather than matching directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Color { rgba: [u8; 4] },
    List(Vec<Value>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Value::Color { rgba: [r, g, b, a] } => Some(Color::from_rgba8(*r, *g, *b, *a)),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn color(r: u8, g: u8, b: u8, a: u8) -> Self {
        Value::Color { rgba: [r, g, b, a] }
    }
}
