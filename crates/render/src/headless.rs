//! A `GraphicsContext` that needs no GPU.
//!
//! Compilation only rejects `#error` directives and unbalanced braces.
//! Linking checks that every fragment input has a matching vertex output.
//! A uniform or attribute gets a location only if it is declared and also
//! referenced outside its declaration, so unused ones look optimized out.

use crate::backend::{GraphicsContext, ShaderStage};
use crate::types::SamplerKind;
use std::collections::HashMap;

/// One state-changing call, in the order it was made.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateShader(ShaderStage, u32),
    DeleteShader(u32),
    CreateProgram(u32),
    LinkProgram(u32),
    DeleteProgram(u32),
    UseProgram(Option<u32>),
    ActiveTexture(u32),
    UnbindTexture(SamplerKind),
    Uniform1i(u32, i32),
    Uniform1f(u32, f32),
    Uniform3f(u32, [f32; 3]),
    Uniform4f(u32, [f32; 4]),
}

#[derive(Debug)]
struct Shader {
    stage: ShaderStage,
    source: String,
    status: Option<Result<(), String>>,
}

#[derive(Debug, Clone, Copy)]
struct Declared {
    /// Array length; `None` for non-arrays.
    len: Option<usize>,
}

#[derive(Debug, Default)]
struct Program {
    shaders: Vec<u32>,
    status: Option<Result<(), String>>,
    uniforms: HashMap<String, Declared>,
    attributes: HashMap<String, u32>,
}

#[derive(Debug, Default)]
pub struct HeadlessContext {
    next_id: u32,
    shaders: HashMap<u32, Shader>,
    programs: HashMap<u32, Program>,
    current: Option<u32>,
    calls: Vec<GlCall>,
}

/// Parsed `qualifier type name[N];` declaration.
struct Decl<'a> {
    qualifier: &'a str,
    ty: &'a str,
    name: &'a str,
    len: Option<usize>,
}

fn parse_decl(line: &str) -> Option<Decl<'_>> {
    let line = line.trim().strip_suffix(';')?;
    let mut parts = line.split_whitespace();
    let qualifier = parts.next()?;
    if !matches!(qualifier, "uniform" | "in" | "out") {
        return None;
    }
    let ty = parts.next()?;
    let declarator = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let (name, len) = match declarator.split_once('[') {
        Some((name, rest)) => (name, rest.trim_end_matches(']').parse().ok()),
        None => (declarator, None),
    };
    Some(Decl {
        qualifier,
        ty,
        name,
        len,
    })
}

fn identifiers(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|s| !s.is_empty())
}

/// Whether `name` is used anywhere other than a declaration line.
fn referenced(sources: &[&str], name: &str) -> bool {
    sources.iter().any(|src| {
        src.lines()
            .filter(|l| parse_decl(l).is_none())
            .any(|l| identifiers(l).any(|id| id == name))
    })
}

/// 31-bit FNV-1a of a symbol name, stable across runs.
fn location_for(name: &str) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for b in name.bytes() {
        h ^= u32::from(b);
        h = h.wrapping_mul(0x0100_0193);
    }
    h & 0x7fff_ffff
}

fn check_source(source: &str) -> Result<(), String> {
    let mut depth: i64 = 0;
    for (n, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some(msg) = trimmed.strip_prefix("#error") {
            return Err(format!("ERROR: 0:{}: '#error' :{}", n + 1, msg));
        }
        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return Err(format!("ERROR: 0:{}: syntax error: unexpected '}}'", n + 1));
            }
        }
    }
    if depth != 0 {
        return Err("ERROR: 0:0: syntax error: unexpected end of file".into());
    }
    Ok(())
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    pub fn calls(&self) -> &[GlCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GlCall> {
        std::mem::take(&mut self.calls)
    }

    /// Shaders and programs created and not yet deleted.
    pub fn live_objects(&self) -> usize {
        self.shaders.len() + self.programs.len()
    }

    pub fn current_program(&self) -> Option<u32> {
        self.current
    }

    /// Same lookup as [`GraphicsContext::uniform_location`].
    pub fn uniform_location_of(&self, program: u32, name: &str) -> Option<u32> {
        GraphicsContext::uniform_location(self, program, name)
    }

    fn link(&self, program: &Program) -> Result<(HashMap<String, Declared>, HashMap<String, u32>), String> {
        let mut vertex = None;
        let mut fragment = None;
        for id in &program.shaders {
            let shader = self.shaders.get(id).ok_or_else(|| format!("shader {id} was deleted"))?;
            match &shader.status {
                Some(Ok(())) => {}
                _ => return Err(format!("shader {id} is not compiled")),
            }
            let slot = match shader.stage {
                ShaderStage::Vertex => &mut vertex,
                ShaderStage::Fragment => &mut fragment,
            };
            if slot.replace(shader.source.as_str()).is_some() {
                return Err(format!("more than one {} shader attached", shader.stage));
            }
        }
        let vertex = vertex.ok_or("no vertex shader attached")?;
        let fragment = fragment.ok_or("no fragment shader attached")?;

        let outputs: Vec<Decl<'_>> = vertex
            .lines()
            .filter_map(parse_decl)
            .filter(|d| d.qualifier == "out")
            .collect();
        for input in fragment.lines().filter_map(parse_decl).filter(|d| d.qualifier == "in") {
            let matched = outputs.iter().any(|o| o.name == input.name && o.ty == input.ty);
            if !matched {
                return Err(format!(
                    "error: fragment input '{}' ({}) has no matching vertex output",
                    input.name, input.ty
                ));
            }
        }

        let sources = [vertex, fragment];
        let mut uniforms = HashMap::new();
        for src in sources {
            for d in src.lines().filter_map(parse_decl).filter(|d| d.qualifier == "uniform") {
                if referenced(&sources, d.name) {
                    uniforms.insert(d.name.to_string(), Declared { len: d.len });
                }
            }
        }
        let mut attributes = HashMap::new();
        let mut next_attrib = 0;
        for d in vertex.lines().filter_map(parse_decl).filter(|d| d.qualifier == "in") {
            if referenced(&[vertex], d.name) {
                attributes.insert(d.name.to_string(), next_attrib);
                next_attrib += 1;
            }
        }
        Ok((uniforms, attributes))
    }
}

impl GraphicsContext for HeadlessContext {
    type Shader = u32;
    type Program = u32;
    type UniformLocation = u32;

    fn create_shader(&mut self, stage: ShaderStage) -> Result<u32, String> {
        let id = self.next();
        self.shaders.insert(
            id,
            Shader {
                stage,
                source: String::new(),
                status: None,
            },
        );
        self.calls.push(GlCall::CreateShader(stage, id));
        Ok(id)
    }

    fn shader_source(&mut self, shader: u32, source: &str) {
        if let Some(s) = self.shaders.get_mut(&shader) {
            s.source = source.to_string();
            s.status = None;
        }
    }

    fn compile_shader(&mut self, shader: u32) {
        if let Some(s) = self.shaders.get_mut(&shader) {
            s.status = Some(check_source(&s.source));
        }
    }

    fn compile_status(&self, shader: u32) -> bool {
        matches!(self.shaders.get(&shader).and_then(|s| s.status.as_ref()), Some(Ok(())))
    }

    fn shader_info_log(&self, shader: u32) -> String {
        match self.shaders.get(&shader).and_then(|s| s.status.as_ref()) {
            Some(Err(log)) => log.clone(),
            _ => String::new(),
        }
    }

    fn delete_shader(&mut self, shader: u32) {
        if self.shaders.remove(&shader).is_some() {
            self.calls.push(GlCall::DeleteShader(shader));
        }
    }

    fn create_program(&mut self) -> Result<u32, String> {
        let id = self.next();
        self.programs.insert(id, Program::default());
        self.calls.push(GlCall::CreateProgram(id));
        Ok(id)
    }

    fn attach_shader(&mut self, program: u32, shader: u32) {
        if let Some(p) = self.programs.get_mut(&program) {
            p.shaders.push(shader);
        }
    }

    fn link_program(&mut self, program: u32) {
        let Some(p) = self.programs.get(&program) else {
            return;
        };
        let result = self.link(p);
        if let Some(p) = self.programs.get_mut(&program) {
            match result {
                Ok((uniforms, attributes)) => {
                    p.uniforms = uniforms;
                    p.attributes = attributes;
                    p.status = Some(Ok(()));
                }
                Err(log) => p.status = Some(Err(log)),
            }
        }
        self.calls.push(GlCall::LinkProgram(program));
    }

    fn link_status(&self, program: u32) -> bool {
        matches!(self.programs.get(&program).and_then(|p| p.status.as_ref()), Some(Ok(())))
    }

    fn program_info_log(&self, program: u32) -> String {
        match self.programs.get(&program).and_then(|p| p.status.as_ref()) {
            Some(Err(log)) => log.clone(),
            _ => String::new(),
        }
    }

    fn delete_program(&mut self, program: u32) {
        if self.programs.remove(&program).is_some() {
            if self.current == Some(program) {
                self.current = None;
            }
            self.calls.push(GlCall::DeleteProgram(program));
        }
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<u32> {
        let p = self.programs.get(&program)?;
        if !matches!(p.status, Some(Ok(()))) {
            return None;
        }
        let base_end = name.find(['[', '.']).unwrap_or(name.len());
        let declared = p.uniforms.get(&name[..base_end])?;
        let rest = &name[base_end..];
        if let Some(index) = rest.strip_prefix('[') {
            let (index, _) = index.split_once(']')?;
            let index: usize = index.parse().ok()?;
            if declared.len.is_some_and(|len| index >= len) {
                return None;
            }
        }
        Some(location_for(name))
    }

    fn attrib_location(&self, program: u32, name: &str) -> Option<u32> {
        let p = self.programs.get(&program)?;
        p.attributes.get(name).copied()
    }

    fn use_program(&mut self, program: Option<u32>) {
        self.current = program;
        self.calls.push(GlCall::UseProgram(program));
    }

    fn active_texture(&mut self, unit: u32) {
        self.calls.push(GlCall::ActiveTexture(unit));
    }

    fn unbind_texture(&mut self, kind: SamplerKind) {
        self.calls.push(GlCall::UnbindTexture(kind));
    }

    fn uniform_1_i32(&mut self, location: &u32, value: i32) {
        self.calls.push(GlCall::Uniform1i(*location, value));
    }

    fn uniform_1_f32(&mut self, location: &u32, value: f32) {
        self.calls.push(GlCall::Uniform1f(*location, value));
    }

    fn uniform_3_f32(&mut self, location: &u32, value: [f32; 3]) {
        self.calls.push(GlCall::Uniform3f(*location, value));
    }

    fn uniform_4_f32(&mut self, location: &u32, value: [f32; 4]) {
        self.calls.push(GlCall::Uniform4f(*location, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "#version 150\nuniform float t;\nuniform mat4 unused;\nin vec4 pos;\nout vec2 uv;\nvoid main() {\n    gl_Position = pos * t;\n}\n";
    const FS: &str = "#version 150\nuniform float w[3];\nin vec2 uv;\nout vec4 color;\nvoid main() {\n    color = vec4(uv, w[0], 1.0);\n}\n";

    fn linked(gl: &mut HeadlessContext, vs: &str, fs: &str) -> u32 {
        let v = gl.create_shader(ShaderStage::Vertex).unwrap();
        gl.shader_source(v, vs);
        gl.compile_shader(v);
        let f = gl.create_shader(ShaderStage::Fragment).unwrap();
        gl.shader_source(f, fs);
        gl.compile_shader(f);
        let p = gl.create_program().unwrap();
        gl.attach_shader(p, v);
        gl.attach_shader(p, f);
        gl.link_program(p);
        p
    }

    #[test]
    fn active_symbols_only() {
        let mut gl = HeadlessContext::new();
        let p = linked(&mut gl, VS, FS);
        assert!(gl.link_status(p));
        assert!(gl.uniform_location(p, "t").is_some());
        assert!(gl.uniform_location(p, "unused").is_none());
        assert!(gl.uniform_location(p, "w[2]").is_some());
        assert!(gl.uniform_location(p, "w[3]").is_none());
        assert_eq!(gl.attrib_location(p, "pos"), Some(0));
        assert_eq!(gl.attrib_location(p, "normal"), None);
    }

    #[test]
    fn error_directive_fails_compile() {
        let mut gl = HeadlessContext::new();
        let s = gl.create_shader(ShaderStage::Fragment).unwrap();
        gl.shader_source(s, "#version 150\n#error no\nvoid main() {}\n");
        gl.compile_shader(s);
        assert!(!gl.compile_status(s));
        assert!(gl.shader_info_log(s).contains("0:2"));
    }

    #[test]
    fn unbalanced_braces_fail_compile() {
        assert!(check_source("void main() {").is_err());
        assert!(check_source("void main() }{").is_err());
        assert!(check_source("void main() { if (x) { } }").is_ok());
    }

    #[test]
    fn unmatched_varying_fails_link() {
        let mut gl = HeadlessContext::new();
        let p = linked(&mut gl, &VS.replace("out vec2 uv;", "out vec3 uv;"), FS);
        assert!(!gl.link_status(p));
        assert!(gl.program_info_log(p).contains("'uv'"));
        assert!(gl.uniform_location(p, "t").is_none());
    }

    #[test]
    fn locations_are_stable() {
        assert_eq!(location_for("globtime"), location_for("globtime"));
        assert_ne!(location_for("a"), location_for("b"));
        assert!(location_for("anything") < 0x8000_0000);
    }
}
