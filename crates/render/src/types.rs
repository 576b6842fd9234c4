use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Texture dimensionality a sampler uniform reads from. Two sampler
/// uniforms may share a texture unit only if their kinds are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    Tex2D,
    Tex3D,
    Cube,
    Tex2DArray,
    Tex2DMultisample,
    Buffer,
}

impl SamplerKind {
    pub fn glsl_name(self) -> &'static str {
        match self {
            SamplerKind::Tex2D => "sampler2D",
            SamplerKind::Tex3D => "sampler3D",
            SamplerKind::Cube => "samplerCube",
            SamplerKind::Tex2DArray => "sampler2DArray",
            SamplerKind::Tex2DMultisample => "sampler2DMS",
            SamplerKind::Buffer => "samplerBuffer",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: ShaderType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<StructField>,
}

impl StructType {
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = (&'static str, ShaderType)>) -> Self {
        Self {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(name, ty)| StructField {
                    name: name.to_string(),
                    ty,
                })
                .collect(),
        }
    }

    /// GLSL definition of this struct.
    pub fn definition(&self) -> String {
        let mut out = format!("struct {} {{", self.name);
        for f in &self.fields {
            out.push_str(&format!(" {};", f.ty.declare(&f.name)));
        }
        out.push_str(" };");
        out
    }
}

/// Type of a shader variable.
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderType {
    Float,
    Int,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    Mat3,
    Mat4,
    Sampler(SamplerKind),
    /// `len == 0` declares an unsized array.
    Array { element: Box<ShaderType>, len: usize },
    Struct(Arc<StructType>),
}

impl ShaderType {
    pub fn array(element: ShaderType, len: usize) -> Self {
        ShaderType::Array {
            element: Box::new(element),
            len,
        }
    }

    pub fn glsl_name(&self) -> String {
        match self {
            ShaderType::Float => "float".into(),
            ShaderType::Int => "int".into(),
            ShaderType::Bool => "bool".into(),
            ShaderType::Vec2 => "vec2".into(),
            ShaderType::Vec3 => "vec3".into(),
            ShaderType::Vec4 => "vec4".into(),
            ShaderType::IVec2 => "ivec2".into(),
            ShaderType::IVec3 => "ivec3".into(),
            ShaderType::IVec4 => "ivec4".into(),
            ShaderType::Mat3 => "mat3".into(),
            ShaderType::Mat4 => "mat4".into(),
            ShaderType::Sampler(kind) => kind.glsl_name().into(),
            ShaderType::Array { element, .. } => element.glsl_name(),
            ShaderType::Struct(s) => s.name.clone(),
        }
    }

    /// Declarator for a variable of this type, e.g. `vec4 color` or
    /// `float weights[4]`.
    pub fn declare(&self, name: &str) -> String {
        match self {
            ShaderType::Array { element, len } if *len > 0 => {
                format!("{}[{len}]", element.declare(name))
            }
            ShaderType::Array { element, .. } => format!("{}[]", element.declare(name)),
            _ => format!("{} {name}", self.glsl_name()),
        }
    }

    pub fn sampler_kind(&self) -> Option<SamplerKind> {
        match self {
            ShaderType::Sampler(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Struct types this type depends on, innermost first.
    pub fn structs(&self, out: &mut Vec<Arc<StructType>>) {
        match self {
            ShaderType::Array { element, .. } => element.structs(out),
            ShaderType::Struct(s) => {
                for f in &s.fields {
                    f.ty.structs(out);
                }
                if !out.iter().any(|o| o.name == s.name) {
                    out.push(s.clone());
                }
            }
            _ => {}
        }
    }
}

/// Render-state category a shader input depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateSlot(pub u32);

impl StateSlot {
    /// Every program's fragment outputs depend on the depth buffer.
    pub const DEPTH_BUFFER: StateSlot = StateSlot(0);
    pub const FRAME_INFO: StateSlot = StateSlot(1);
    pub const LIGHTS: StateSlot = StateSlot(2);
}

/// Implements identity semantics on a shared declaration: two handles are
/// equal only if they were cloned from the same declaration.
macro_rules! descriptor_handle {
    ($(#[$meta:meta])* $handle:ident => $decl:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $handle(Arc<$decl>);

        impl std::ops::Deref for $handle {
            type Target = $decl;

            fn deref(&self) -> &$decl {
                &self.0
            }
        }

        impl PartialEq for $handle {
            fn eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl Eq for $handle {}

        impl Hash for $handle {
            fn hash<H: Hasher>(&self, state: &mut H) {
                std::ptr::hash(Arc::as_ptr(&self.0), state)
            }
        }

        impl fmt::Debug for $handle {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({}: {})", stringify!($handle), self.0.name, self.0.ty.glsl_name())
            }
        }
    };
}

#[derive(Debug)]
pub struct UniformDecl {
    pub name: String,
    pub ty: ShaderType,
    pub deps: Vec<StateSlot>,
}

#[derive(Debug)]
pub struct AttributeDecl {
    pub name: String,
    pub ty: ShaderType,
}

#[derive(Debug)]
pub struct FragDataDecl {
    pub name: String,
    pub ty: ShaderType,
    pub deps: Vec<StateSlot>,
}

descriptor_handle!(
    /// Abstract uniform variable.
    Uniform => UniformDecl
);
descriptor_handle!(
    /// Abstract per-vertex input.
    Attribute => AttributeDecl
);
descriptor_handle!(
    /// Abstract fragment shader output.
    FragData => FragDataDecl
);

impl Uniform {
    pub fn new(name: impl Into<String>, ty: ShaderType, deps: impl IntoIterator<Item = StateSlot>) -> Self {
        Self(Arc::new(UniformDecl {
            name: name.into(),
            ty,
            deps: deps.into_iter().collect(),
        }))
    }

    pub fn is_sampler(&self) -> bool {
        self.ty.sampler_kind().is_some()
    }
}

impl Attribute {
    pub fn new(name: impl Into<String>, ty: ShaderType) -> Self {
        Self(Arc::new(AttributeDecl {
            name: name.into(),
            ty,
        }))
    }
}

impl FragData {
    pub fn new(name: impl Into<String>, ty: ShaderType, deps: impl IntoIterator<Item = StateSlot>) -> Self {
        Self(Arc::new(FragDataDecl {
            name: name.into(),
            ty,
            deps: deps.into_iter().collect(),
        }))
    }
}
