//! OpenGL backend for the render core.
//!
//! # Invariants
//! - The wrapped context is current on the thread that owns the
//!   `GlowContext`, and only that thread replays commands against it.

use glow::HasContext;
use wayfarer_render::{GraphicsContext, SamplerKind, ShaderStage};

/// A live `glow` context.
pub struct GlowContext {
    gl: glow::Context,
}

impl std::fmt::Debug for GlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("GlowContext")
    }
}

impl GlowContext {
    /// The context must be current on this thread for as long as the
    /// returned value is used.
    pub fn new(gl: glow::Context) -> Self {
        tracing::info!(version = ?gl.version(), "opengl context");
        Self { gl }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    pub fn into_inner(self) -> glow::Context {
        self.gl
    }
}

pub fn shader_type(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

pub fn texture_target(kind: SamplerKind) -> u32 {
    match kind {
        SamplerKind::Tex2D => glow::TEXTURE_2D,
        SamplerKind::Tex3D => glow::TEXTURE_3D,
        SamplerKind::Cube => glow::TEXTURE_CUBE_MAP,
        SamplerKind::Tex2DArray => glow::TEXTURE_2D_ARRAY,
        SamplerKind::Tex2DMultisample => glow::TEXTURE_2D_MULTISAMPLE,
        SamplerKind::Buffer => glow::TEXTURE_BUFFER,
    }
}

// Every call below requires the context to be current, which `new` demands
// of its caller.
impl GraphicsContext for GlowContext {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type UniformLocation = glow::UniformLocation;

    fn create_shader(&mut self, stage: ShaderStage) -> Result<glow::Shader, String> {
        unsafe { self.gl.create_shader(shader_type(stage)) }
    }

    fn shader_source(&mut self, shader: glow::Shader, source: &str) {
        unsafe { self.gl.shader_source(shader, source) }
    }

    fn compile_shader(&mut self, shader: glow::Shader) {
        unsafe { self.gl.compile_shader(shader) }
    }

    fn compile_status(&self, shader: glow::Shader) -> bool {
        unsafe { self.gl.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&self, shader: glow::Shader) -> String {
        unsafe { self.gl.get_shader_info_log(shader) }
    }

    fn delete_shader(&mut self, shader: glow::Shader) {
        unsafe { self.gl.delete_shader(shader) }
    }

    fn create_program(&mut self) -> Result<glow::Program, String> {
        unsafe { self.gl.create_program() }
    }

    fn attach_shader(&mut self, program: glow::Program, shader: glow::Shader) {
        unsafe { self.gl.attach_shader(program, shader) }
    }

    fn link_program(&mut self, program: glow::Program) {
        unsafe { self.gl.link_program(program) }
    }

    fn link_status(&self, program: glow::Program) -> bool {
        unsafe { self.gl.get_program_link_status(program) }
    }

    fn program_info_log(&self, program: glow::Program) -> String {
        unsafe { self.gl.get_program_info_log(program) }
    }

    fn delete_program(&mut self, program: glow::Program) {
        unsafe { self.gl.delete_program(program) }
    }

    fn uniform_location(&self, program: glow::Program, name: &str) -> Option<glow::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn attrib_location(&self, program: glow::Program, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(program, name) }
    }

    fn use_program(&mut self, program: Option<glow::Program>) {
        unsafe { self.gl.use_program(program) }
    }

    fn active_texture(&mut self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn unbind_texture(&mut self, kind: SamplerKind) {
        unsafe { self.gl.bind_texture(texture_target(kind), None) }
    }

    fn uniform_1_i32(&mut self, location: &glow::UniformLocation, value: i32) {
        unsafe { self.gl.uniform_1_i32(Some(location), value) }
    }

    fn uniform_1_f32(&mut self, location: &glow::UniformLocation, value: f32) {
        unsafe { self.gl.uniform_1_f32(Some(location), value) }
    }

    fn uniform_3_f32(&mut self, location: &glow::UniformLocation, [x, y, z]: [f32; 3]) {
        unsafe { self.gl.uniform_3_f32(Some(location), x, y, z) }
    }

    fn uniform_4_f32(&mut self, location: &glow::UniformLocation, [x, y, z, w]: [f32; 4]) {
        unsafe { self.gl.uniform_4_f32(Some(location), x, y, z, w) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_sampler_kind_has_its_own_target() {
        let kinds = [
            SamplerKind::Tex2D,
            SamplerKind::Tex3D,
            SamplerKind::Cube,
            SamplerKind::Tex2DArray,
            SamplerKind::Tex2DMultisample,
            SamplerKind::Buffer,
        ];
        let mut targets: Vec<u32> = kinds.iter().map(|k| texture_target(*k)).collect();
        targets.sort_unstable();
        targets.dedup();
        assert_eq!(targets.len(), kinds.len());
        assert_eq!(texture_target(SamplerKind::Tex2D), glow::TEXTURE_2D);
    }

    #[test]
    fn stages_map_to_shader_types() {
        assert_eq!(shader_type(ShaderStage::Vertex), glow::VERTEX_SHADER);
        assert_eq!(shader_type(ShaderStage::Fragment), glow::FRAGMENT_SHADER);
    }
}
