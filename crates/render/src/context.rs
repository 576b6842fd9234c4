use crate::backend::ShaderStage;
use crate::types::{Attribute, FragData, ShaderType, Uniform};
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Write};

pub const GLSL_VERSION: u32 = 150;

/// Source under construction for one shader stage.
#[derive(Debug, Clone, Default)]
pub struct StageSource {
    declarations: Vec<String>,
    functions: Vec<String>,
    main: Vec<String>,
}

impl StageSource {
    /// Add a top-level declaration. Repeats of an identical line are dropped.
    pub fn declare(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !self.declarations.contains(&line) {
            self.declarations.push(line);
        }
    }

    pub fn function(&mut self, text: impl Into<String>) {
        self.functions.push(text.into());
    }

    /// Append a statement to `main`.
    pub fn statement(&mut self, text: impl Into<String>) {
        self.main.push(text.into());
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty() && self.functions.is_empty() && self.main.is_empty()
    }

    pub fn construct(&self, out: &mut impl Write) -> fmt::Result {
        writeln!(out, "#version {GLSL_VERSION}")?;
        writeln!(out)?;
        for decl in &self.declarations {
            writeln!(out, "{decl}")?;
        }
        if !self.declarations.is_empty() {
            writeln!(out)?;
        }
        for func in &self.functions {
            writeln!(out, "{func}")?;
            writeln!(out)?;
        }
        writeln!(out, "void main() {{")?;
        for stmt in &self.main {
            writeln!(out, "    {stmt}")?;
        }
        writeln!(out, "}}")
    }

    pub fn source(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.construct(&mut out);
        out
    }
}

/// Contributes declarations and code to a program under construction.
pub trait ShaderModule: fmt::Debug + Send + Sync {
    fn modify(&self, prog: &mut ProgramContext);
}

/// Mutable program under construction: both stage sources plus every
/// uniform, attribute and fragment output the modules declared, in
/// declaration order.
#[derive(Debug, Default)]
pub struct ProgramContext {
    pub vertex: StageSource,
    pub fragment: StageSource,
    uniforms: Vec<Uniform>,
    attributes: Vec<Attribute>,
    fragdata: Vec<FragData>,
    symtab: HashMap<String, String>,
    taken: HashSet<String>,
    /// Log the generated sources once the program is built.
    pub dump: bool,
}

impl ProgramContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, stage: ShaderStage) -> &mut StageSource {
        match stage {
            ShaderStage::Vertex => &mut self.vertex,
            ShaderStage::Fragment => &mut self.fragment,
        }
    }

    /// GLSL identifier for `name`, stable for the life of this context.
    /// Distinct names always map to distinct identifiers.
    pub fn symbol(&mut self, name: &str) -> String {
        if let Some(sym) = self.symtab.get(name) {
            return sym.clone();
        }
        let mut base: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        if base.is_empty() || base.starts_with(|c: char| c.is_ascii_digit()) || base.starts_with("gl_") {
            base.insert_str(0, "s_");
        }
        let mut sym = base.clone();
        let mut n = 2;
        while self.taken.contains(&sym) {
            sym = format!("{base}_{n}");
            n += 1;
        }
        self.taken.insert(sym.clone());
        self.symtab.insert(name.to_string(), sym.clone());
        sym
    }

    fn declare_structs(&mut self, stage: ShaderStage, ty: &ShaderType) {
        let mut structs = Vec::new();
        ty.structs(&mut structs);
        for s in structs {
            self.stage(stage).declare(s.definition());
        }
    }

    /// Declare `u` in `stage` and return its identifier.
    pub fn uniform(&mut self, stage: ShaderStage, u: &Uniform) -> String {
        let sym = self.symbol(&u.name);
        if !self.uniforms.contains(u) {
            self.uniforms.push(u.clone());
        }
        self.declare_structs(stage, &u.ty);
        let decl = format!("uniform {};", u.ty.declare(&sym));
        self.stage(stage).declare(decl);
        sym
    }

    /// Declare a vertex shader input and return its identifier.
    pub fn attribute(&mut self, a: &Attribute) -> String {
        let sym = self.symbol(&a.name);
        if !self.attributes.contains(a) {
            self.attributes.push(a.clone());
        }
        self.declare_structs(ShaderStage::Vertex, &a.ty);
        let decl = format!("in {};", a.ty.declare(&sym));
        self.vertex.declare(decl);
        sym
    }

    /// Declare a fragment shader output and return its identifier.
    pub fn fragdata(&mut self, f: &FragData) -> String {
        let sym = self.symbol(&f.name);
        if !self.fragdata.contains(f) {
            self.fragdata.push(f.clone());
        }
        let decl = format!("out {};", f.ty.declare(&sym));
        self.fragment.declare(decl);
        sym
    }

    /// Declare a value passed from the vertex to the fragment stage.
    pub fn varying(&mut self, name: &str, ty: &ShaderType) -> String {
        let sym = self.symbol(name);
        let decl = ty.declare(&sym);
        self.vertex.declare(format!("out {decl};"));
        self.fragment.declare(format!("in {decl};"));
        sym
    }

    pub fn uniforms(&self) -> &[Uniform] {
        &self.uniforms
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn fragdata_list(&self) -> &[FragData] {
        &self.fragdata
    }

    /// Identifier previously assigned to `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.symtab.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SamplerKind, StateSlot};

    #[test]
    fn symbols_are_mangled_and_unique() {
        let mut ctx = ProgramContext::new();
        assert_eq!(ctx.symbol("light.color"), "light_color");
        assert_eq!(ctx.symbol("light-color"), "light_color_2");
        assert_eq!(ctx.symbol("light.color"), "light_color");
        assert_eq!(ctx.symbol("gl_Position"), "s_gl_Position");
        assert_eq!(ctx.symbol("2d"), "s_2d");
        assert_eq!(ctx.lookup("light-color"), Some("light_color_2"));
    }

    #[test]
    fn uniforms_are_recorded_once_in_order() {
        let mut ctx = ProgramContext::new();
        let a = Uniform::new("a", ShaderType::Float, []);
        let b = Uniform::new("tex", ShaderType::Sampler(SamplerKind::Tex2D), [StateSlot::LIGHTS]);
        ctx.uniform(ShaderStage::Vertex, &b);
        ctx.uniform(ShaderStage::Fragment, &a);
        ctx.uniform(ShaderStage::Fragment, &b);
        assert_eq!(ctx.uniforms(), &[b.clone(), a]);
        assert!(ctx.vertex.source().contains("uniform sampler2D tex;"));
        assert!(ctx.fragment.source().contains("uniform sampler2D tex;"));
    }

    #[test]
    fn construct_orders_sections() {
        let mut ctx = ProgramContext::new();
        let pos = Attribute::new("pos", ShaderType::Vec4);
        let sym = ctx.attribute(&pos);
        ctx.vertex.function("float twice(float x) { return x * 2.0; }");
        ctx.vertex.statement(format!("gl_Position = {sym};"));
        let src = ctx.vertex.source();
        let version = src.find("#version 150").unwrap();
        let decl = src.find("in vec4 pos;").unwrap();
        let func = src.find("float twice").unwrap();
        let main = src.find("void main() {\n    gl_Position = pos;\n}").unwrap();
        assert!(version < decl && decl < func && func < main);
    }

    #[test]
    fn varyings_declare_both_sides() {
        let mut ctx = ProgramContext::new();
        let sym = ctx.varying("tex coord", &ShaderType::Vec2);
        assert_eq!(sym, "tex_coord");
        assert!(ctx.vertex.source().contains("out vec2 tex_coord;"));
        assert!(ctx.fragment.source().contains("in vec2 tex_coord;"));
    }
}
