use crate::backend::GraphicsContext;
use crate::context::ShaderModule;
use crate::program::ShaderProgram;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wayfarer_common::RenderConfig;

/// Identity of an ordered module set. Entries hold their modules alive, so
/// an address is never reused while its key is in the cache.
type ModuleKey = Vec<usize>;

fn key(modules: &[Arc<dyn ShaderModule>]) -> ModuleKey {
    modules
        .iter()
        .map(|m| Arc::as_ptr(m) as *const () as usize)
        .collect()
}

struct Entry<C: GraphicsContext> {
    _modules: Vec<Arc<dyn ShaderModule>>,
    program: Arc<ShaderProgram<C>>,
}

/// Built programs, one per distinct module set.
pub struct ProgramCache<C: GraphicsContext> {
    config: RenderConfig,
    programs: Mutex<HashMap<ModuleKey, Entry<C>>>,
}

impl<C: GraphicsContext> std::fmt::Debug for ProgramCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgramCache")
            .field("programs", &self.len())
            .finish()
    }
}

impl<C: GraphicsContext> ProgramCache<C> {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            config: config.clone(),
            programs: Mutex::new(HashMap::new()),
        }
    }

    /// The program for `modules`, building it on first request.
    pub fn get(&self, modules: &[Arc<dyn ShaderModule>]) -> Arc<ShaderProgram<C>> {
        let mut programs = self.programs.lock();
        programs
            .entry(key(modules))
            .or_insert_with(|| {
                let program = Arc::new(ShaderProgram::build(&self.config, modules.iter().map(|m| m.as_ref())));
                tracing::debug!(program = %program.id(), modules = modules.len(), "built program");
                Entry {
                    _modules: modules.to_vec(),
                    program,
                }
            })
            .program
            .clone()
    }

    pub fn len(&self) -> usize {
        self.programs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose and drop every program that is unlocked and referenced only
    /// by the cache. Returns how many were evicted.
    pub fn sweep(&self, ctx: &mut C) -> usize {
        let mut evicted = Vec::new();
        self.programs.lock().retain(|_, e| {
            let idle = e.program.lock_count() == 0 && Arc::strong_count(&e.program) == 1;
            if idle {
                evicted.push(e.program.clone());
            }
            !idle
        });
        for program in &evicted {
            program.dispose(ctx);
        }
        if !evicted.is_empty() {
            tracing::debug!(evicted = evicted.len(), "swept program cache");
        }
        evicted.len()
    }

    /// Dispose every program and empty the cache.
    pub fn clear(&self, ctx: &mut C) {
        let drained: Vec<_> = self.programs.lock().drain().map(|(_, e)| e.program).collect();
        for program in drained {
            program.dispose(ctx);
        }
    }
}
