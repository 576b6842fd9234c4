use crate::backend::GraphicsContext;
use crate::program::{ProgramError, ProgramId};
use crate::types::ShaderType;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Uniform,
    Attribute,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SymbolKind::Uniform => "uniform",
            SymbolKind::Attribute => "attribute",
        })
    }
}

/// A uniform resolved against one realized program.
///
/// A uniform the linker optimized out still resolves; asking for its
/// location is what fails.
pub struct UniformId<C: GraphicsContext> {
    name: String,
    program: ProgramId,
    location: Option<C::UniformLocation>,
    children: Vec<UniformId<C>>,
    sampler: Option<usize>,
}

impl<C: GraphicsContext> fmt::Debug for UniformId<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformId")
            .field("name", &self.name)
            .field("program", &self.program)
            .field("location", &self.location)
            .field("children", &self.children)
            .field("sampler", &self.sampler)
            .finish()
    }
}

impl<C: GraphicsContext> UniformId<C> {
    /// Query locations for `name` and, for arrays and structs, every
    /// element and field beneath it.
    pub(crate) fn resolve(
        ctx: &C,
        handle: C::Program,
        program: ProgramId,
        ty: &ShaderType,
        name: String,
        sampler: Option<usize>,
    ) -> Self {
        let children = match ty {
            ShaderType::Array { element, len } => (0..*len)
                .map(|i| Self::resolve(ctx, handle, program, element, format!("{name}[{i}]"), None))
                .collect(),
            ShaderType::Struct(s) => s
                .fields
                .iter()
                .map(|f| Self::resolve(ctx, handle, program, &f.ty, format!("{name}.{}", f.name), None))
                .collect(),
            _ => Vec::new(),
        };
        let location = ctx.uniform_location(handle, &name);
        Self {
            name,
            program,
            location,
            children,
            sampler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.location.is_some()
    }

    pub fn location(&self) -> Result<&C::UniformLocation, ProgramError> {
        self.location.as_ref().ok_or_else(|| ProgramError::UnknownSymbol {
            program: self.program,
            kind: SymbolKind::Uniform,
            symbol: self.name.clone(),
        })
    }

    /// Array elements or struct fields, in declaration order.
    pub fn children(&self) -> &[UniformId<C>] {
        &self.children
    }

    pub fn element(&self, index: usize) -> Option<&UniformId<C>> {
        let want = format!("{}[{index}]", self.name);
        self.children.iter().find(|c| c.name == want)
    }

    pub fn field(&self, field: &str) -> Option<&UniformId<C>> {
        let want = format!("{}.{field}", self.name);
        self.children.iter().find(|c| c.name == want)
    }

    /// Texture unit assigned to this uniform if it is a sampler.
    pub fn sampler_unit(&self) -> Option<usize> {
        self.sampler
    }
}

/// An attribute resolved against one realized program.
#[derive(Debug, Clone)]
pub struct AttribId {
    name: String,
    program: ProgramId,
    location: Option<u32>,
}

impl AttribId {
    pub(crate) fn resolve<C: GraphicsContext>(ctx: &C, handle: C::Program, program: ProgramId, name: String) -> Self {
        let location = ctx.attrib_location(handle, &name);
        Self {
            name,
            program,
            location,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.location.is_some()
    }

    pub fn location(&self) -> Result<u32, ProgramError> {
        self.location.ok_or_else(|| ProgramError::UnknownSymbol {
            program: self.program,
            kind: SymbolKind::Attribute,
            symbol: self.name.clone(),
        })
    }
}
