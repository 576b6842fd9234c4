use wayfarer_render::{CommandBuffer, GraphicsContext, ShaderProgram, StateSlot};

/// One line per recorded command, without consuming the buffer.
pub fn dump_commands<C>(buf: &CommandBuffer<C>) -> Vec<String> {
    buf.snapshot()
        .enumerate()
        .map(|(i, cmd)| format!("{i:>4}: {cmd:?}"))
        .collect()
}

/// What a built program declares and whether it is live on the backend.
#[derive(Debug, Clone)]
pub struct ProgramReport {
    pub id: String,
    pub realized: bool,
    pub locks: usize,
    pub uniforms: Vec<String>,
    pub attributes: Vec<String>,
    pub samplers: Vec<(usize, String)>,
    pub vertex_lines: usize,
    pub fragment_lines: usize,
}

impl ProgramReport {
    pub fn of<C: GraphicsContext>(prog: &ShaderProgram<C>) -> Self {
        Self {
            id: prog.id().to_string(),
            realized: prog.is_realized(),
            locks: prog.lock_count(),
            uniforms: prog
                .uniforms()
                .iter()
                .map(|u| {
                    let deps: Vec<String> = u.deps.iter().map(|StateSlot(s)| s.to_string()).collect();
                    format!("{} {} [{}]", u.ty.glsl_name(), u.name, deps.join(","))
                })
                .collect(),
            attributes: prog
                .attributes()
                .iter()
                .map(|a| format!("{} {}", a.ty.glsl_name(), a.name))
                .collect(),
            samplers: prog
                .samplers()
                .enumerate()
                .map(|(unit, u)| (unit, u.name.clone()))
                .collect(),
            vertex_lines: prog.vertex_source().lines().count(),
            fragment_lines: prog.fragment_source().lines().count(),
        }
    }
}

impl std::fmt::Display for ProgramReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Program {}: realized={} locks={} vs={} lines fs={} lines",
            self.id, self.realized, self.locks, self.vertex_lines, self.fragment_lines
        )?;
        for u in &self.uniforms {
            writeln!(f, "  uniform {u}")?;
        }
        for a in &self.attributes {
            writeln!(f, "  attribute {a}")?;
        }
        for (unit, name) in &self.samplers {
            writeln!(f, "  unit {unit}: {name}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_common::RenderConfig;
    use wayfarer_render::{FnCommand, FrameInfoModule, HeadlessContext, ShaderModule};

    #[test]
    fn dump_lists_commands_in_order() {
        let mut buf: CommandBuffer<Vec<u32>> = CommandBuffer::with_capacity(2);
        buf.append(FnCommand::new("first", |_: &mut Vec<u32>| Ok(()))).unwrap();
        buf.append(FnCommand::new("second", |_: &mut Vec<u32>| Ok(()))).unwrap();
        let lines = dump_commands(&buf);
        assert_eq!(lines, ["   0: FnCommand(first)", "   1: FnCommand(second)"]);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn report_describes_program() {
        let m = FrameInfoModule::new();
        let prog: ShaderProgram<HeadlessContext> =
            ShaderProgram::build(&RenderConfig::default(), [&m as &dyn ShaderModule]);
        let report = ProgramReport::of(&prog);
        assert!(!report.realized);
        assert_eq!(report.uniforms, ["float globtime [1]"]);
        assert!(report.samplers.is_empty());
        assert!(format!("{report}").contains("uniform float globtime"));
    }
}
