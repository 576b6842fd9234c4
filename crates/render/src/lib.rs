//! Render core: deferred command buffers and shader programs.
//!
//! # Invariants
//! - A command buffer replays its commands in recording order, at most once.
//! - A shader program creates its backend objects at most once per
//!   realization, however many threads ask for it.
//! - A resolved symbol missing from the linked program fails only when its
//!   location is read.
//! - Only the thread holding the `GraphicsContext` touches backend state.

pub mod backend;
pub mod cache;
pub mod command;
pub mod context;
pub mod frame;
pub mod headless;
pub mod program;
pub mod symbol;
pub mod types;

pub use backend::{GraphicsContext, ShaderStage};
pub use cache::ProgramCache;
pub use command::{
    AbortError, BindProgram, BufferError, BufferId, Command, CommandBuffer, CommandError, FnCommand, ReplayError,
    ReplayFailure,
};
pub use context::{ProgramContext, ShaderModule, StageSource};
pub use frame::{FrameInfo, FrameInfoModule, SceneLightModule};
pub use headless::{GlCall, HeadlessContext};
pub use program::{LinkedProgram, ProgramError, ProgramId, ShaderProgram};
pub use symbol::{AttribId, SymbolKind, UniformId};
pub use types::{Attribute, FragData, SamplerKind, ShaderType, StateSlot, StructType, Uniform};
