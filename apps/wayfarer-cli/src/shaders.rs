use std::sync::Arc;
use wayfarer_common::ClientConfig;
use wayfarer_kernel::LightState;
use wayfarer_render::{
    Attribute, BindProgram, CommandBuffer, CommandError, FnCommand, FragData, FrameInfo, FrameInfoModule,
    HeadlessContext, ProgramCache, ProgramContext, SamplerKind, SceneLightModule, ShaderModule, ShaderProgram,
    ShaderStage, ShaderType, StateSlot, Uniform,
};
use wayfarer_tools::{ProgramReport, dump_commands};

/// Vertex position and normal, swayed by globtime.
#[derive(Debug)]
struct Surface {
    frame: FrameInfoModule,
    pos: Attribute,
    normal: Attribute,
}

impl ShaderModule for Surface {
    fn modify(&self, prog: &mut ProgramContext) {
        let t = self.frame.globtime(prog, ShaderStage::Vertex);
        let pos = prog.attribute(&self.pos);
        let normal = prog.attribute(&self.normal);
        let v_normal = prog.varying("v_normal", &ShaderType::Vec3);
        prog.vertex.statement(format!("{v_normal} = {normal};"));
        prog.vertex
            .statement(format!("gl_Position = {pos} + vec4(0.05 * sin({t}), 0.0, 0.0, 0.0);"));
    }
}

/// Lit fragment color modulated by every sampler.
#[derive(Debug)]
struct Shade {
    samplers: Vec<Uniform>,
    color: FragData,
}

impl Shade {
    fn new(kinds: &[(&str, SamplerKind)]) -> Self {
        Self {
            samplers: kinds
                .iter()
                .map(|(name, kind)| Uniform::new(*name, ShaderType::Sampler(*kind), [StateSlot(3)]))
                .collect(),
            color: FragData::new("color", ShaderType::Vec4, []),
        }
    }
}

impl ShaderModule for Shade {
    fn modify(&self, prog: &mut ProgramContext) {
        let v_normal = prog.varying("v_normal", &ShaderType::Vec3);
        let out = prog.fragdata(&self.color);
        let mut expr = format!("scene_shade(normalize({v_normal}))");
        for u in &self.samplers {
            let sym = prog.uniform(ShaderStage::Fragment, u);
            let coord = match u.ty.sampler_kind() {
                Some(SamplerKind::Tex2D) => format!("{v_normal}.xy"),
                _ => v_normal.clone(),
            };
            expr.push_str(&format!(" * texture({sym}, {coord})"));
        }
        prog.fragment.statement(format!("{out} = {expr};"));
    }
}

/// Records binds and uploads for two programs, replays them headlessly and
/// reports what happened.
pub fn run(config: &ClientConfig) -> anyhow::Result<()> {
    let frame_module = FrameInfoModule::new();
    let light = SceneLightModule::new();
    let surface: Arc<dyn ShaderModule> = Arc::new(Surface {
        frame: frame_module.clone(),
        pos: Attribute::new("pos", ShaderType::Vec4),
        normal: Attribute::new("normal", ShaderType::Vec3),
    });
    let lit: Arc<dyn ShaderModule> = Arc::new(light.clone());
    let ground: Arc<dyn ShaderModule> = Arc::new(Shade::new(&[("albedo", SamplerKind::Tex2D)]));
    let sky: Arc<dyn ShaderModule> = Arc::new(Shade::new(&[
        ("albedo", SamplerKind::Tex2DArray),
        ("env", SamplerKind::Cube),
    ]));

    let cache: ProgramCache<HeadlessContext> = ProgramCache::new(&config.render);
    let a = cache.get(&[surface.clone(), lit.clone(), ground]);
    let b = cache.get(&[surface, lit, sky]);

    let frame = FrameInfo {
        globtime: 45123.5,
        light: LightState::default(),
    };
    let mut buf = CommandBuffer::new(&config.render);
    buf.append(BindProgram::new(None, Some(a.clone())))?;
    buf.append(upload("upload a", &frame_module, &light, &a, frame))?;
    buf.append(BindProgram::new(Some(a.clone()), Some(b.clone())))?;
    buf.append(upload("upload b", &frame_module, &light, &b, frame))?;
    buf.append(BindProgram::new(Some(b.clone()), None))?;
    buf.trim();

    println!("Recorded {} commands:", buf.len());
    for line in dump_commands(&buf) {
        println!("{line}");
    }

    let mut gl = HeadlessContext::new();
    buf.replay(&mut gl).map_err(|failure| failure.abort_remaining())?;
    println!("Replayed: {} backend calls", gl.calls().len());
    for call in gl.calls() {
        tracing::debug!(?call, "backend call");
    }

    print!("{}", ProgramReport::of(&a));
    print!("{}", ProgramReport::of(&b));

    cache.clear(&mut gl);
    println!("After clear: {} live backend objects", gl.live_objects());
    Ok(())
}

fn upload(
    name: &str,
    frame_module: &FrameInfoModule,
    light: &SceneLightModule,
    prog: &Arc<ShaderProgram<HeadlessContext>>,
    frame: FrameInfo,
) -> FnCommand<impl FnMut(&mut HeadlessContext) -> Result<(), CommandError> + Send + 'static> {
    let (frame_module, light, prog) = (frame_module.clone(), light.clone(), prog.clone());
    FnCommand::new(name, move |gl: &mut HeadlessContext| -> Result<(), CommandError> {
        frame_module.upload(gl, &*prog, &frame)?;
        light.upload(gl, &*prog, &frame)?;
        Ok(())
    })
}
