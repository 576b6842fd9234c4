use crate::backend::{GraphicsContext, ShaderStage};
use crate::context::{ProgramContext, ShaderModule};
use crate::symbol::{AttribId, SymbolKind, UniformId};
use crate::types::{Attribute, FragData, SamplerKind, StateSlot, Uniform};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use wayfarer_common::RenderConfig;

/// Process-unique program identity, used in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(u64);

impl ProgramId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ProgramId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prog#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgramError {
    #[error("{program}: {stage} shader failed to compile:\n{log}")]
    Compile {
        program: ProgramId,
        stage: ShaderStage,
        log: String,
    },
    #[error("{program}: link failed:\n{log}")]
    Link { program: ProgramId, log: String },
    #[error("{program}: {kind} `{symbol}` has no location")]
    UnknownSymbol {
        program: ProgramId,
        kind: SymbolKind,
        symbol: String,
    },
    #[error("backend error: {0}")]
    Backend(String),
}

/// Backend objects of one realized program and the symbols resolved
/// against them.
pub struct LinkedProgram<C: GraphicsContext> {
    handle: C::Program,
    shaders: [C::Shader; 2],
    uniforms: Mutex<HashMap<Uniform, Arc<UniformId<C>>>>,
    attributes: Mutex<HashMap<Attribute, Arc<AttribId>>>,
}

impl<C: GraphicsContext> fmt::Debug for LinkedProgram<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedProgram")
            .field("handle", &self.handle)
            .field("shaders", &self.shaders)
            .field("uniforms", &self.uniforms.lock().len())
            .field("attributes", &self.attributes.lock().len())
            .finish()
    }
}

impl<C: GraphicsContext> LinkedProgram<C> {
    pub fn handle(&self) -> C::Program {
        self.handle
    }

    fn create(prog: &ShaderProgram<C>, ctx: &mut C) -> Result<Self, ProgramError> {
        let _span = tracing::debug_span!("program_realize", program = %prog.id).entered();
        let vs = compile(ctx, prog.id, ShaderStage::Vertex, &prog.vertex_source)?;
        let fs = match compile(ctx, prog.id, ShaderStage::Fragment, &prog.fragment_source) {
            Ok(fs) => fs,
            Err(err) => {
                ctx.delete_shader(vs);
                return Err(err);
            }
        };
        let handle = match ctx.create_program() {
            Ok(handle) => handle,
            Err(msg) => {
                ctx.delete_shader(vs);
                ctx.delete_shader(fs);
                return Err(ProgramError::Backend(msg));
            }
        };
        ctx.attach_shader(handle, vs);
        ctx.attach_shader(handle, fs);
        ctx.link_program(handle);
        if !ctx.link_status(handle) {
            let log = ctx.program_info_log(handle);
            ctx.delete_program(handle);
            ctx.delete_shader(vs);
            ctx.delete_shader(fs);
            return Err(ProgramError::Link {
                program: prog.id,
                log,
            });
        }

        let mut uniforms = HashMap::with_capacity(prog.uniforms.len());
        for u in &prog.uniforms {
            let name = prog.uniform_symbol(u).to_string();
            let unit = prog.sampler_unit(u);
            let id = UniformId::resolve(ctx, handle, prog.id, &u.ty, name, unit);
            if !id.is_active() {
                tracing::debug!(program = %prog.id, uniform = %u.name, "uniform optimized out");
            }
            uniforms.insert(u.clone(), Arc::new(id));
        }
        let mut attributes = HashMap::with_capacity(prog.attributes.len());
        for a in &prog.attributes {
            let name = prog.attribute_symbol(a).to_string();
            attributes.insert(a.clone(), Arc::new(AttribId::resolve(ctx, handle, prog.id, name)));
        }
        tracing::debug!(
            program = %prog.id,
            uniforms = uniforms.len(),
            attributes = attributes.len(),
            "linked program"
        );
        Ok(Self {
            handle,
            shaders: [vs, fs],
            uniforms: Mutex::new(uniforms),
            attributes: Mutex::new(attributes),
        })
    }

    fn uniform(&self, ctx: &C, prog: &ShaderProgram<C>, u: &Uniform) -> Arc<UniformId<C>> {
        self.uniforms
            .lock()
            .entry(u.clone())
            .or_insert_with(|| {
                let name = prog.uniform_symbol(u).to_string();
                Arc::new(UniformId::resolve(ctx, self.handle, prog.id, &u.ty, name, None))
            })
            .clone()
    }

    fn attribute(&self, ctx: &C, prog: &ShaderProgram<C>, a: &Attribute) -> Arc<AttribId> {
        self.attributes
            .lock()
            .entry(a.clone())
            .or_insert_with(|| {
                let name = prog.attribute_symbol(a).to_string();
                Arc::new(AttribId::resolve(ctx, self.handle, prog.id, name))
            })
            .clone()
    }
}

fn compile<C: GraphicsContext>(
    ctx: &mut C,
    program: ProgramId,
    stage: ShaderStage,
    source: &str,
) -> Result<C::Shader, ProgramError> {
    let shader = ctx.create_shader(stage).map_err(ProgramError::Backend)?;
    ctx.shader_source(shader, source);
    ctx.compile_shader(shader);
    if !ctx.compile_status(shader) {
        let log = ctx.shader_info_log(shader);
        ctx.delete_shader(shader);
        return Err(ProgramError::Compile {
            program,
            stage,
            log,
        });
    }
    Ok(shader)
}

/// An immutable vertex + fragment program generated from a module set.
///
/// Building is pure. Backend objects are created on the first
/// [`ShaderProgram::ensure_realized`] and reused until
/// [`ShaderProgram::dispose`]. A failed realization is remembered the same
/// way, so a broken program is compiled once, not once per use.
pub struct ShaderProgram<C: GraphicsContext> {
    id: ProgramId,
    vertex_source: String,
    fragment_source: String,
    uniforms: Vec<Uniform>,
    attributes: Vec<Attribute>,
    fragdata: Vec<FragData>,
    symbols: HashMap<String, String>,
    slot_uniforms: BTreeMap<StateSlot, Vec<usize>>,
    fragment_slots: BTreeSet<StateSlot>,
    samplers: Vec<(Uniform, SamplerKind)>,
    locks: AtomicUsize,
    linked: RwLock<Option<Result<Arc<LinkedProgram<C>>, ProgramError>>>,
}

impl<C: GraphicsContext> fmt::Debug for ShaderProgram<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("id", &self.id)
            .field("uniforms", &self.uniforms)
            .field("attributes", &self.attributes)
            .field("fragdata", &self.fragdata)
            .field("samplers", &self.samplers.len())
            .field("locks", &self.lock_count())
            .field("realized", &self.is_realized())
            .finish()
    }
}

impl<C: GraphicsContext> ShaderProgram<C> {
    /// Run every module over a fresh [`ProgramContext`] and freeze the result.
    pub fn build<'a, M>(config: &RenderConfig, modules: impl IntoIterator<Item = &'a M>) -> Self
    where
        M: ShaderModule + ?Sized + 'a,
    {
        let mut ctx = ProgramContext::new();
        let mut names = Vec::new();
        for module in modules {
            names.push(format!("{module:?}"));
            module.modify(&mut ctx);
        }
        let dump = config.dump_shaders || ctx.dump;
        let prog = Self::from_context(ctx);
        if dump {
            tracing::info!(
                program = %prog.id,
                modules = ?names,
                "vertex shader:\n{}\nfragment shader:\n{}",
                prog.vertex_source,
                prog.fragment_source
            );
        }
        prog
    }

    pub fn from_context(ctx: ProgramContext) -> Self {
        let uniforms = ctx.uniforms().to_vec();
        let attributes = ctx.attributes().to_vec();
        let fragdata = ctx.fragdata_list().to_vec();

        let mut symbols = HashMap::new();
        let names = uniforms
            .iter()
            .map(|u| &u.name)
            .chain(attributes.iter().map(|a| &a.name))
            .chain(fragdata.iter().map(|f| &f.name));
        for name in names {
            if let Some(sym) = ctx.lookup(name) {
                symbols.insert(name.clone(), sym.to_string());
            }
        }

        let mut slot_uniforms: BTreeMap<StateSlot, Vec<usize>> = BTreeMap::new();
        for (i, u) in uniforms.iter().enumerate() {
            for slot in &u.deps {
                let list = slot_uniforms.entry(*slot).or_default();
                if !list.contains(&i) {
                    list.push(i);
                }
            }
        }
        let mut fragment_slots = BTreeSet::from([StateSlot::DEPTH_BUFFER]);
        for f in &fragdata {
            fragment_slots.extend(f.deps.iter().copied());
        }
        let samplers = uniforms
            .iter()
            .filter_map(|u| u.ty.sampler_kind().map(|kind| (u.clone(), kind)))
            .collect();

        Self {
            id: ProgramId::next(),
            vertex_source: ctx.vertex.source(),
            fragment_source: ctx.fragment.source(),
            uniforms,
            attributes,
            fragdata,
            symbols,
            slot_uniforms,
            fragment_slots,
            samplers,
            locks: AtomicUsize::new(0),
            linked: RwLock::new(None),
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn uniforms(&self) -> &[Uniform] {
        &self.uniforms
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn fragdata(&self) -> &[FragData] {
        &self.fragdata
    }

    /// Sampler uniforms in texture-unit order.
    pub fn samplers(&self) -> impl Iterator<Item = &Uniform> {
        self.samplers.iter().map(|(u, _)| u)
    }

    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    pub fn sampler_unit(&self, u: &Uniform) -> Option<usize> {
        self.samplers.iter().position(|(s, _)| s == u)
    }

    /// Uniforms that must be re-uploaded when `slot` changes.
    pub fn uniforms_for_slot(&self, slot: StateSlot) -> impl Iterator<Item = &Uniform> {
        self.slot_uniforms
            .get(&slot)
            .into_iter()
            .flatten()
            .filter_map(|i| self.uniforms.get(*i))
    }

    pub fn fragment_depends_on(&self, slot: StateSlot) -> bool {
        self.fragment_slots.contains(&slot)
    }

    fn uniform_symbol<'a>(&'a self, u: &'a Uniform) -> &'a str {
        self.symbols.get(&u.name).map_or(u.name.as_str(), String::as_str)
    }

    fn attribute_symbol<'a>(&'a self, a: &'a Attribute) -> &'a str {
        self.symbols.get(&a.name).map_or(a.name.as_str(), String::as_str)
    }

    pub fn is_realized(&self) -> bool {
        matches!(*self.linked.read(), Some(Ok(_)))
    }

    /// The error of the last realization attempt, until [`Self::dispose`].
    pub fn realize_error(&self) -> Option<ProgramError> {
        match self.linked.read().as_ref() {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    /// Compile and link on first use. Concurrent callers wait for one
    /// attempt. Its outcome, success or failure, is returned to every later
    /// caller until [`Self::dispose`].
    pub fn ensure_realized(&self, ctx: &mut C) -> Result<Arc<LinkedProgram<C>>, ProgramError> {
        if let Some(outcome) = self.linked.read().as_ref() {
            return outcome.clone();
        }
        let mut slot = self.linked.write();
        if let Some(outcome) = slot.as_ref() {
            return outcome.clone();
        }
        let outcome = LinkedProgram::create(self, ctx).map(Arc::new);
        if let Err(err) = &outcome {
            tracing::error!(program = %self.id, %err, "program unusable until disposed");
        }
        *slot = Some(outcome.clone());
        outcome
    }

    /// Memoized per realization: the same descriptor yields the same `Arc`.
    pub fn resolve_uniform(&self, ctx: &mut C, u: &Uniform) -> Result<Arc<UniformId<C>>, ProgramError> {
        let linked = self.ensure_realized(ctx)?;
        Ok(linked.uniform(ctx, self, u))
    }

    pub fn resolve_attribute(&self, ctx: &mut C, a: &Attribute) -> Result<Arc<AttribId>, ProgramError> {
        let linked = self.ensure_realized(ctx)?;
        Ok(linked.attribute(ctx, self, a))
    }

    /// Switch the current program from `from` to `to`.
    ///
    /// Texture units `from` used are cleared when `to` has no sampler on
    /// that unit or has one of a different kind. Every sampler of `to` is
    /// then pointed at its unit.
    pub fn bind_for_draw(ctx: &mut C, from: Option<&Self>, to: Option<&Self>) -> Result<(), ProgramError> {
        let linked = match to {
            Some(prog) => Some(prog.ensure_realized(ctx)?),
            None => None,
        };
        ctx.use_program(linked.as_ref().map(|l| l.handle));

        if let Some(from) = from {
            for (unit, (_, old)) in from.samplers.iter().enumerate() {
                let compatible = to
                    .and_then(|t| t.samplers.get(unit))
                    .is_some_and(|(_, new)| new == old);
                if !compatible {
                    ctx.active_texture(unit as u32);
                    ctx.unbind_texture(*old);
                }
            }
        }

        if let (Some(to), Some(linked)) = (to, linked) {
            for (unit, (u, _)) in to.samplers.iter().enumerate() {
                let id = linked.uniform(ctx, to, u);
                match id.location() {
                    Ok(loc) => ctx.uniform_1_i32(loc, unit as i32),
                    Err(_) => tracing::trace!(program = %to.id, sampler = %u.name, "sampler optimized out"),
                }
            }
        }
        Ok(())
    }

    pub fn lock(&self) {
        self.locks.fetch_add(1, Ordering::AcqRel);
    }

    /// Never drops below zero.
    pub fn unlock(&self) {
        let _ = self
            .locks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)));
    }

    pub fn lock_count(&self) -> usize {
        self.locks.load(Ordering::Acquire)
    }

    /// Release the backend objects, if any, and forget a failed
    /// realization. The next use realizes again.
    pub fn dispose(&self, ctx: &mut C) {
        let taken = self.linked.write().take();
        if let Some(Ok(linked)) = taken {
            ctx.delete_program(linked.handle);
            for shader in linked.shaders {
                ctx.delete_shader(shader);
            }
            tracing::debug!(program = %self.id, "disposed program");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{GlCall, HeadlessContext};
    use crate::types::ShaderType;

    #[derive(Debug)]
    struct Globtime {
        globtime: Uniform,
        pos: Attribute,
    }

    impl ShaderModule for Globtime {
        fn modify(&self, prog: &mut ProgramContext) {
            let t = prog.uniform(ShaderStage::Vertex, &self.globtime);
            let pos = prog.attribute(&self.pos);
            prog.vertex.statement(format!("gl_Position = {pos} * {t};"));
        }
    }

    fn globtime_module() -> Globtime {
        Globtime {
            globtime: Uniform::new("globtime", ShaderType::Float, [StateSlot::FRAME_INFO]),
            pos: Attribute::new("pos", ShaderType::Vec4),
        }
    }

    /// Declares samplers and samples every one so none is optimized out.
    #[derive(Debug)]
    struct Samplers(Vec<Uniform>);

    impl Samplers {
        fn new(kinds: &[SamplerKind]) -> Self {
            Self(
                kinds
                    .iter()
                    .enumerate()
                    .map(|(i, k)| Uniform::new(format!("tex{i}"), ShaderType::Sampler(*k), []))
                    .collect(),
            )
        }
    }

    impl ShaderModule for Samplers {
        fn modify(&self, prog: &mut ProgramContext) {
            let out = prog.fragdata(&FragData::new("color", ShaderType::Vec4, []));
            let mut terms = Vec::new();
            for u in &self.0 {
                let sym = prog.uniform(ShaderStage::Fragment, u);
                terms.push(format!("use_sampler({sym})"));
            }
            if terms.is_empty() {
                terms.push("vec4(1.0)".into());
            }
            prog.fragment.statement(format!("{out} = {};", terms.join(" + ")));
        }
    }

    fn build(modules: &[&dyn ShaderModule]) -> ShaderProgram<HeadlessContext> {
        ShaderProgram::build(&RenderConfig::default(), modules.iter().copied())
    }

    #[test]
    fn globtime_and_pos_resolve_and_foo_fails_lazily() {
        let m = globtime_module();
        let prog = build(&[&m]);
        let mut gl = HeadlessContext::new();
        prog.ensure_realized(&mut gl).unwrap();

        let t = prog.resolve_uniform(&mut gl, &m.globtime).unwrap();
        assert!(t.location().is_ok());
        let pos = prog.resolve_attribute(&mut gl, &m.pos).unwrap();
        assert!(pos.location().is_ok());

        let foo = Uniform::new("foo", ShaderType::Float, []);
        let id = prog.resolve_uniform(&mut gl, &foo).unwrap();
        let err = id.location().unwrap_err();
        assert!(matches!(
            err,
            ProgramError::UnknownSymbol { kind: SymbolKind::Uniform, ref symbol, .. } if symbol == "foo"
        ));
    }

    #[test]
    fn resolution_is_memoized() {
        let m = globtime_module();
        let prog = build(&[&m]);
        let mut gl = HeadlessContext::new();
        let a = prog.resolve_uniform(&mut gl, &m.globtime).unwrap();
        let b = prog.resolve_uniform(&mut gl, &m.globtime).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let foo = Uniform::new("foo", ShaderType::Float, []);
        let c = prog.resolve_uniform(&mut gl, &foo).unwrap();
        let d = prog.resolve_uniform(&mut gl, &foo).unwrap();
        assert!(Arc::ptr_eq(&c, &d));
    }

    #[test]
    fn realization_happens_once() {
        let m = globtime_module();
        let prog = build(&[&m]);
        let mut gl = HeadlessContext::new();
        let a = prog.ensure_realized(&mut gl).unwrap();
        let b = prog.ensure_realized(&mut gl).unwrap();
        assert_eq!(a.handle(), b.handle());
        let links = gl.calls().iter().filter(|c| matches!(c, GlCall::LinkProgram(_))).count();
        assert_eq!(links, 1);
    }

    #[test]
    fn dispose_then_realize_creates_new_objects() {
        let m = globtime_module();
        let prog = build(&[&m]);
        let mut gl = HeadlessContext::new();
        let first = prog.ensure_realized(&mut gl).unwrap().handle();
        assert_eq!(gl.live_objects(), 3);
        prog.dispose(&mut gl);
        prog.dispose(&mut gl);
        assert!(!prog.is_realized());
        assert_eq!(gl.live_objects(), 0);
        let second = prog.ensure_realized(&mut gl).unwrap().handle();
        assert_ne!(first, second);
    }

    #[derive(Debug)]
    struct Broken;

    impl ShaderModule for Broken {
        fn modify(&self, prog: &mut ProgramContext) {
            prog.fragment.declare("#error unsupported lighting model");
        }
    }

    #[test]
    fn compile_failure_names_stage_and_cleans_up() {
        let prog = build(&[&globtime_module(), &Broken]);
        let mut gl = HeadlessContext::new();
        let err = prog.ensure_realized(&mut gl).unwrap_err();
        match err {
            ProgramError::Compile { stage, ref log, .. } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("unsupported lighting model"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(gl.live_objects(), 0);
        assert!(!prog.is_realized());
    }

    #[derive(Debug)]
    struct DanglingInput;

    impl ShaderModule for DanglingInput {
        fn modify(&self, prog: &mut ProgramContext) {
            prog.fragment.declare("in vec2 uv;");
        }
    }

    #[test]
    fn link_failure_is_distinct() {
        let prog = build(&[&globtime_module(), &DanglingInput]);
        let mut gl = HeadlessContext::new();
        let err = prog.ensure_realized(&mut gl).unwrap_err();
        assert!(matches!(err, ProgramError::Link { ref log, .. } if log.contains("uv")));
        assert_eq!(gl.live_objects(), 0);
    }

    fn link_calls(gl: &HeadlessContext) -> usize {
        gl.calls().iter().filter(|c| matches!(c, GlCall::LinkProgram(_))).count()
    }

    #[test]
    fn link_failure_is_remembered_across_binds() {
        let prog = build(&[&globtime_module(), &DanglingInput]);
        let mut gl = HeadlessContext::new();
        for _ in 0..3 {
            let err = ShaderProgram::bind_for_draw(&mut gl, None, Some(&prog)).unwrap_err();
            assert!(matches!(err, ProgramError::Link { .. }));
        }
        assert_eq!(link_calls(&gl), 1);
        assert!(!prog.is_realized());
        assert!(matches!(prog.realize_error(), Some(ProgramError::Link { .. })));
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn compile_failure_is_remembered_until_dispose() {
        let prog = build(&[&globtime_module(), &Broken]);
        let mut gl = HeadlessContext::new();
        prog.ensure_realized(&mut gl).unwrap_err();
        let u = Uniform::new("globtime", ShaderType::Float, []);
        assert!(matches!(prog.resolve_uniform(&mut gl, &u), Err(ProgramError::Compile { .. })));
        let created = gl
            .calls()
            .iter()
            .filter(|c| matches!(c, GlCall::CreateShader(..)))
            .count();
        assert_eq!(created, 2);

        prog.dispose(&mut gl);
        assert!(prog.realize_error().is_none());
        prog.ensure_realized(&mut gl).unwrap_err();
        let created = gl
            .calls()
            .iter()
            .filter(|c| matches!(c, GlCall::CreateShader(..)))
            .count();
        assert_eq!(created, 4);
    }

    #[test]
    fn struct_and_array_uniforms_resolve_children() {
        #[derive(Debug)]
        struct Lights(Uniform);
        impl ShaderModule for Lights {
            fn modify(&self, prog: &mut ProgramContext) {
                let sym = prog.uniform(ShaderStage::Vertex, &self.0);
                prog.vertex.statement(format!("gl_Position = {sym}[0].dir;"));
            }
        }
        let light = Arc::new(crate::types::StructType::new(
            "Light",
            [("dir", ShaderType::Vec4), ("power", ShaderType::Float)],
        ));
        let u = Uniform::new("lights", ShaderType::array(ShaderType::Struct(light), 2), [StateSlot::LIGHTS]);
        let m = Lights(u.clone());
        let prog = build(&[&m]);
        let mut gl = HeadlessContext::new();
        let id = prog.resolve_uniform(&mut gl, &u).unwrap();
        assert_eq!(id.children().len(), 2);
        let second = id.element(1).unwrap();
        assert_eq!(second.name(), "lights[1]");
        let power = second.field("power").unwrap();
        assert_eq!(power.name(), "lights[1].power");
        assert!(power.location().is_ok());
        assert!(id.element(2).is_none());
        assert_eq!(prog.uniforms_for_slot(StateSlot::LIGHTS).count(), 1);
    }

    #[test]
    fn dependency_maps() {
        let m = globtime_module();
        let s = Samplers::new(&[SamplerKind::Tex2D]);
        let prog = build(&[&m, &s]);
        assert!(prog.fragment_depends_on(StateSlot::DEPTH_BUFFER));
        assert!(!prog.fragment_depends_on(StateSlot::LIGHTS));
        let frame: Vec<_> = prog.uniforms_for_slot(StateSlot::FRAME_INFO).collect();
        assert_eq!(frame, vec![&m.globtime]);
        assert_eq!(prog.uniforms_for_slot(StateSlot::LIGHTS).count(), 0);
    }

    #[test]
    fn sampler_units_follow_uniform_order() {
        let s = Samplers::new(&[SamplerKind::Tex2D, SamplerKind::Cube]);
        let prog = build(&[&globtime_module(), &s]);
        assert_eq!(prog.sampler_unit(&s.0[0]), Some(0));
        assert_eq!(prog.sampler_unit(&s.0[1]), Some(1));
        assert_eq!(prog.sampler_count(), 2);
    }

    #[test]
    fn bind_from_none_sets_sampler_units() {
        let s = Samplers::new(&[SamplerKind::Tex2D, SamplerKind::Cube]);
        let prog = build(&[&globtime_module(), &s]);
        let mut gl = HeadlessContext::new();
        let handle = prog.ensure_realized(&mut gl).unwrap().handle();
        gl.take_calls();

        ShaderProgram::bind_for_draw(&mut gl, None, Some(&prog)).unwrap();
        let l0 = gl.uniform_location_of(handle, "tex0").unwrap();
        let l1 = gl.uniform_location_of(handle, "tex1").unwrap();
        assert_eq!(
            gl.take_calls(),
            vec![
                GlCall::UseProgram(Some(handle)),
                GlCall::Uniform1i(l0, 0),
                GlCall::Uniform1i(l1, 1),
            ]
        );
    }

    #[test]
    fn bind_clears_incompatible_and_surplus_units() {
        let a = Samplers::new(&[SamplerKind::Tex2D, SamplerKind::Cube, SamplerKind::Tex3D]);
        let b = Samplers::new(&[SamplerKind::Tex2D, SamplerKind::Tex2DArray]);
        let from = build(&[&globtime_module(), &a]);
        let to = build(&[&globtime_module(), &b]);
        let mut gl = HeadlessContext::new();
        from.ensure_realized(&mut gl).unwrap();
        let handle = to.ensure_realized(&mut gl).unwrap().handle();
        gl.take_calls();

        ShaderProgram::bind_for_draw(&mut gl, Some(&from), Some(&to)).unwrap();
        let l0 = gl.uniform_location_of(handle, "tex0").unwrap();
        let l1 = gl.uniform_location_of(handle, "tex1").unwrap();
        assert_eq!(
            gl.take_calls(),
            vec![
                GlCall::UseProgram(Some(handle)),
                GlCall::ActiveTexture(1),
                GlCall::UnbindTexture(SamplerKind::Cube),
                GlCall::ActiveTexture(2),
                GlCall::UnbindTexture(SamplerKind::Tex3D),
                GlCall::Uniform1i(l0, 0),
                GlCall::Uniform1i(l1, 1),
            ]
        );
    }

    #[test]
    fn bind_to_none_clears_every_unit() {
        let a = Samplers::new(&[SamplerKind::Tex2D, SamplerKind::Buffer]);
        let from = build(&[&globtime_module(), &a]);
        let mut gl = HeadlessContext::new();
        from.ensure_realized(&mut gl).unwrap();
        gl.take_calls();

        ShaderProgram::bind_for_draw(&mut gl, Some(&from), None).unwrap();
        assert_eq!(
            gl.take_calls(),
            vec![
                GlCall::UseProgram(None),
                GlCall::ActiveTexture(0),
                GlCall::UnbindTexture(SamplerKind::Tex2D),
                GlCall::ActiveTexture(1),
                GlCall::UnbindTexture(SamplerKind::Buffer),
            ]
        );
    }

    #[test]
    fn bind_skips_optimized_out_sampler() {
        #[derive(Debug)]
        struct Unused(Uniform);
        impl ShaderModule for Unused {
            fn modify(&self, prog: &mut ProgramContext) {
                prog.uniform(ShaderStage::Fragment, &self.0);
            }
        }
        let m = Unused(Uniform::new("shadow", ShaderType::Sampler(SamplerKind::Tex2D), []));
        let prog = build(&[&globtime_module(), &m]);
        let mut gl = HeadlessContext::new();
        let handle = prog.ensure_realized(&mut gl).unwrap().handle();
        gl.take_calls();
        ShaderProgram::bind_for_draw(&mut gl, None, Some(&prog)).unwrap();
        assert_eq!(gl.take_calls(), vec![GlCall::UseProgram(Some(handle))]);
    }

    #[test]
    fn lock_count_never_goes_negative() {
        let prog = build(&[&globtime_module()]);
        prog.unlock();
        assert_eq!(prog.lock_count(), 0);
        prog.lock();
        prog.lock();
        prog.unlock();
        assert_eq!(prog.lock_count(), 1);
    }

    #[test]
    fn concurrent_realization_links_once() {
        // Each thread brings its own context, so the only thing serializing
        // them is the program's realization slot. Exactly one context may
        // end up with a linked program.
        const THREADS: usize = 8;
        let prog = Arc::new(build(&[&globtime_module()]));
        let barrier = Arc::new(std::sync::Barrier::new(THREADS));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let prog = prog.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let mut gl = HeadlessContext::new();
                    barrier.wait();
                    let linked = prog.ensure_realized(&mut gl).unwrap();
                    (linked, gl)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0].0, &w[1].0)));
        let links: usize = results.iter().map(|(_, gl)| link_calls(gl)).sum();
        assert_eq!(links, 1);
    }
}
