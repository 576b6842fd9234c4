use crate::types::SamplerKind;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// A live graphics backend context.
///
/// Only the render-execution thread holds one. Object handles it hands out
/// are plain values and may be shared across threads, but may only be used
/// with the context that created them.
pub trait GraphicsContext {
    type Shader: Copy + fmt::Debug + Send + Sync + 'static;
    type Program: Copy + fmt::Debug + Send + Sync + 'static;
    type UniformLocation: Clone + fmt::Debug + Send + Sync + 'static;

    fn create_shader(&mut self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn shader_source(&mut self, shader: Self::Shader, source: &str);
    fn compile_shader(&mut self, shader: Self::Shader);
    fn compile_status(&self, shader: Self::Shader) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&mut self, shader: Self::Shader);

    fn create_program(&mut self) -> Result<Self::Program, String>;
    fn attach_shader(&mut self, program: Self::Program, shader: Self::Shader);
    fn link_program(&mut self, program: Self::Program);
    fn link_status(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&mut self, program: Self::Program);

    /// `None` when the program has no active uniform by that name.
    fn uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation>;
    /// `None` when the program has no active attribute by that name.
    fn attrib_location(&self, program: Self::Program, name: &str) -> Option<u32>;

    fn use_program(&mut self, program: Option<Self::Program>);
    fn active_texture(&mut self, unit: u32);
    /// Bind nothing to the `kind` target of the active texture unit.
    fn unbind_texture(&mut self, kind: SamplerKind);

    fn uniform_1_i32(&mut self, location: &Self::UniformLocation, value: i32);
    fn uniform_1_f32(&mut self, location: &Self::UniformLocation, value: f32);
    fn uniform_3_f32(&mut self, location: &Self::UniformLocation, value: [f32; 3]);
    fn uniform_4_f32(&mut self, location: &Self::UniformLocation, value: [f32; 4]);
}
