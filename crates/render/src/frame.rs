use crate::backend::{GraphicsContext, ShaderStage};
use crate::context::{ProgramContext, ShaderModule};
use crate::program::{ProgramError, ShaderProgram};
use crate::types::{ShaderType, StateSlot, StructType, Uniform};
use glam::Vec3;
use std::sync::Arc;
use wayfarer_kernel::{LightState, WorldClock};

/// Per-frame values read from the world clock once, before drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub globtime: f64,
    pub light: LightState,
}

impl FrameInfo {
    pub fn capture(clock: &WorldClock) -> Self {
        Self {
            globtime: clock.globtime(),
            light: clock.current_light(),
        }
    }

    /// Globtime wrapped so single precision keeps sub-frame resolution.
    pub fn shader_globtime(&self) -> f32 {
        (self.globtime % 10000.0) as f32
    }

    /// Unit vector pointing at the sun.
    pub fn sun_direction(&self) -> Vec3 {
        let (angle, elev) = (self.light.angle as f32, self.light.elevation as f32);
        Vec3::new(elev.cos() * angle.cos(), elev.cos() * angle.sin(), elev.sin())
    }
}

/// Declares the `globtime` uniform. Modules that animate reference it
/// through [`FrameInfoModule::globtime`].
#[derive(Debug, Clone)]
pub struct FrameInfoModule {
    globtime: Uniform,
}

impl Default for FrameInfoModule {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameInfoModule {
    pub fn new() -> Self {
        Self {
            globtime: Uniform::new("globtime", ShaderType::Float, [StateSlot::FRAME_INFO]),
        }
    }

    pub fn uniform(&self) -> &Uniform {
        &self.globtime
    }

    /// Declare `globtime` in `stage` and return its identifier.
    pub fn globtime(&self, prog: &mut ProgramContext, stage: ShaderStage) -> String {
        prog.uniform(stage, &self.globtime)
    }

    /// Upload this frame's globtime. Fails if the program does not use it.
    pub fn upload<C: GraphicsContext>(
        &self,
        ctx: &mut C,
        prog: &ShaderProgram<C>,
        frame: &FrameInfo,
    ) -> Result<(), ProgramError> {
        let id = prog.resolve_uniform(ctx, &self.globtime)?;
        ctx.uniform_1_f32(id.location()?, frame.shader_globtime());
        Ok(())
    }
}

impl ShaderModule for FrameInfoModule {
    fn modify(&self, prog: &mut ProgramContext) {
        self.globtime(prog, ShaderStage::Vertex);
    }
}

/// Declares the `scene_light` struct uniform for fragment lighting.
#[derive(Debug, Clone)]
pub struct SceneLightModule {
    light: Uniform,
}

impl Default for SceneLightModule {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneLightModule {
    pub fn new() -> Self {
        let ty = StructType::new(
            "SceneLight",
            [
                ("ambient", ShaderType::Vec4),
                ("diffuse", ShaderType::Vec4),
                ("specular", ShaderType::Vec4),
                ("direction", ShaderType::Vec3),
            ],
        );
        Self {
            light: Uniform::new("scene_light", ShaderType::Struct(Arc::new(ty)), [StateSlot::LIGHTS]),
        }
    }

    pub fn uniform(&self) -> &Uniform {
        &self.light
    }

    /// Upload the light of `frame`. Fields the program never reads are
    /// skipped.
    pub fn upload<C: GraphicsContext>(
        &self,
        ctx: &mut C,
        prog: &ShaderProgram<C>,
        frame: &FrameInfo,
    ) -> Result<(), ProgramError> {
        let id = prog.resolve_uniform(ctx, &self.light)?;
        let light = &frame.light;
        for (field, color) in [
            ("ambient", light.ambient),
            ("diffuse", light.diffuse),
            ("specular", light.specular),
        ] {
            if let Some(loc) = id.field(field).and_then(|f| f.location().ok()) {
                ctx.uniform_4_f32(loc, color.0.to_array());
            }
        }
        if let Some(loc) = id.field("direction").and_then(|f| f.location().ok()) {
            ctx.uniform_3_f32(loc, frame.sun_direction().to_array());
        }
        Ok(())
    }
}

impl ShaderModule for SceneLightModule {
    fn modify(&self, prog: &mut ProgramContext) {
        let light = prog.uniform(ShaderStage::Fragment, &self.light);
        prog.fragment.function(format!(
            "vec4 scene_shade(vec3 normal) {{ return {light}.ambient + {light}.diffuse * max(dot(normal, {light}.direction), 0.0); }}"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{GlCall, HeadlessContext};
    use crate::types::{Attribute, FragData};
    use std::f64::consts::FRAC_PI_2;
    use wayfarer_common::{Color, RenderConfig};

    #[derive(Debug)]
    struct Wave {
        frame: FrameInfoModule,
        pos: Attribute,
    }

    impl ShaderModule for Wave {
        fn modify(&self, prog: &mut ProgramContext) {
            let t = self.frame.globtime(prog, ShaderStage::Vertex);
            let pos = prog.attribute(&self.pos);
            prog.vertex.statement(format!("gl_Position = {pos} + vec4(sin({t}), 0.0, 0.0, 0.0);"));
        }
    }

    #[derive(Debug)]
    struct Shaded(SceneLightModule);

    impl ShaderModule for Shaded {
        fn modify(&self, prog: &mut ProgramContext) {
            self.0.modify(prog);
            let out = prog.fragdata(&FragData::new("color", ShaderType::Vec4, []));
            prog.fragment.statement(format!("{out} = scene_shade(vec3(0.0, 0.0, 1.0));"));
        }
    }

    fn frame(globtime: f64) -> FrameInfo {
        FrameInfo {
            globtime,
            light: LightState::default(),
        }
    }

    #[test]
    fn shader_globtime_wraps() {
        assert_eq!(frame(12345.5).shader_globtime(), 2345.5);
        assert_eq!(frame(99.0).shader_globtime(), 99.0);
    }

    #[test]
    fn sun_direction_follows_angle_and_elevation() {
        let mut f = frame(0.0);
        assert!((f.sun_direction() - Vec3::X).length() < 1e-6);
        f.light.elevation = FRAC_PI_2;
        assert!((f.sun_direction() - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn globtime_upload_reaches_the_program() {
        let wave = Wave {
            frame: FrameInfoModule::new(),
            pos: Attribute::new("pos", ShaderType::Vec4),
        };
        let prog: ShaderProgram<HeadlessContext> = ShaderProgram::build(&RenderConfig::default(), [&wave as &dyn ShaderModule]);
        let mut gl = HeadlessContext::new();
        let handle = prog.ensure_realized(&mut gl).unwrap().handle();
        gl.take_calls();
        wave.frame.upload(&mut gl, &prog, &frame(10001.0)).unwrap();
        let loc = gl.uniform_location_of(handle, "globtime").unwrap();
        assert_eq!(gl.take_calls(), vec![GlCall::Uniform1f(loc, 1.0)]);
    }

    #[test]
    fn unreferenced_globtime_fails_on_upload() {
        let m = FrameInfoModule::new();
        let prog: ShaderProgram<HeadlessContext> = ShaderProgram::build(&RenderConfig::default(), [&m as &dyn ShaderModule]);
        let mut gl = HeadlessContext::new();
        let err = m.upload(&mut gl, &prog, &frame(1.0)).unwrap_err();
        assert!(matches!(err, ProgramError::UnknownSymbol { .. }));
    }

    #[test]
    fn scene_light_uploads_fields() {
        let shaded = Shaded(SceneLightModule::new());
        let prog: ShaderProgram<HeadlessContext> = ShaderProgram::build(&RenderConfig::default(), [&shaded as &dyn ShaderModule]);
        assert!(prog.fragment_source().contains("struct SceneLight {"));
        let mut gl = HeadlessContext::new();
        prog.ensure_realized(&mut gl).unwrap();
        gl.take_calls();

        let mut f = frame(0.0);
        f.light.ambient = Color::BLACK;
        shaded.0.upload(&mut gl, &prog, &f).unwrap();
        let calls = gl.take_calls();
        assert_eq!(calls.len(), 4);
        assert!(matches!(calls[0], GlCall::Uniform4f(_, v) if v == [0.0, 0.0, 0.0, 1.0]));
        assert!(matches!(calls[3], GlCall::Uniform3f(..)));
    }
}
