use crate::backend::GraphicsContext;
use crate::program::{ProgramError, ShaderProgram};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use wayfarer_common::RenderConfig;

/// A unit of deferred work against a context of type `C`.
pub trait Command<C>: fmt::Debug + Send {
    fn run(&mut self, ctx: &mut C) -> Result<(), CommandError>;

    /// Called instead of [`Command::run`] when the command will never run.
    fn abort(&mut self) -> Result<(), CommandError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u64);

impl BufferId {
    pub const FROZEN: BufferId = BufferId(0);

    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        BufferId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == BufferId::FROZEN {
            f.write_str("buf#frozen")
        } else {
            write!(f, "buf#{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("{0} is frozen and accepts no commands")]
    Frozen(BufferId),
}

/// A command failed during replay. Commands before it already ran.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{buffer}: command {index} ({command}) failed")]
pub struct ReplayError {
    pub buffer: BufferId,
    pub index: usize,
    pub command: String,
    #[source]
    pub source: CommandError,
}

/// A failed replay, plus the commands after the failing one. They have
/// neither run nor been aborted.
pub struct ReplayFailure<C> {
    pub error: ReplayError,
    pub remaining: CommandBuffer<C>,
}

impl<C> ReplayFailure<C> {
    /// Abort the unexecuted remainder and keep only the replay error.
    pub fn abort_remaining(self) -> ReplayError {
        if let Err(err) = self.remaining.abort() {
            tracing::warn!(%err, "abort after failed replay");
        }
        self.error
    }
}

impl<C> fmt::Debug for ReplayFailure<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayFailure")
            .field("error", &self.error)
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl<C> fmt::Display for ReplayFailure<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} commands not run)", self.error, self.remaining.len())
    }
}

impl<C> std::error::Error for ReplayFailure<C> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Abort is best-effort: every command is notified even if some fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{buffer}: {failed} command(s) failed to abort; first at {index}: {first}")]
pub struct AbortError {
    pub buffer: BufferId,
    pub failed: usize,
    pub index: usize,
    pub first: CommandError,
}

/// An append-only list of deferred commands, replayed or aborted once.
pub struct CommandBuffer<C> {
    id: BufferId,
    list: Vec<Box<dyn Command<C>>>,
    frozen: bool,
}

impl<C> fmt::Debug for CommandBuffer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("id", &self.id)
            .field("len", &self.list.len())
            .field("capacity", &self.list.capacity())
            .field("frozen", &self.frozen)
            .finish()
    }
}

impl<C> CommandBuffer<C> {
    pub fn new(config: &RenderConfig) -> Self {
        Self::with_capacity(config.command_buffer_capacity)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            id: BufferId::next(),
            list: Vec::with_capacity(capacity),
            frozen: false,
        }
    }

    /// The empty sentinel buffer. Appending to it is a usage error.
    pub fn frozen() -> Self {
        Self {
            id: BufferId::FROZEN,
            list: Vec::new(),
            frozen: true,
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn append(&mut self, cmd: impl Command<C> + 'static) -> Result<(), BufferError> {
        self.append_boxed(Box::new(cmd))
    }

    pub fn append_boxed(&mut self, cmd: Box<dyn Command<C>>) -> Result<(), BufferError> {
        if self.frozen {
            tracing::error!(buffer = %self.id, command = ?cmd, "append to frozen command buffer");
            return Err(BufferError::Frozen(self.id));
        }
        if self.list.len() == self.list.capacity() {
            let grow = self.list.capacity().max(1);
            self.list.reserve_exact(grow);
        }
        self.list.push(cmd);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.list.capacity()
    }

    /// Shrink storage to the recorded length.
    pub fn trim(&mut self) {
        self.list.shrink_to_fit();
    }

    /// Recorded commands in order, without consuming the buffer.
    pub fn snapshot(&self) -> impl ExactSizeIterator<Item = &dyn Command<C>> + '_ {
        self.list.iter().map(|cmd| cmd.as_ref())
    }

    /// Run every command in recording order, stopping at the first failure.
    pub fn replay(self, ctx: &mut C) -> Result<(), ReplayFailure<C>> {
        let _span = tracing::debug_span!("command_replay", buffer = %self.id, commands = self.list.len()).entered();
        let id = self.id;
        let mut cmds = self.list.into_iter().enumerate();
        while let Some((index, mut cmd)) = cmds.next() {
            if let Err(source) = cmd.run(ctx) {
                let error = ReplayError {
                    buffer: id,
                    index,
                    command: format!("{cmd:?}"),
                    source,
                };
                tracing::warn!(%error, "command replay stopped");
                let remaining = CommandBuffer {
                    id,
                    list: cmds.map(|(_, cmd)| cmd).collect(),
                    frozen: false,
                };
                return Err(ReplayFailure { error, remaining });
            }
        }
        Ok(())
    }

    /// Notify every command, in recording order, that it will never run.
    pub fn abort(self) -> Result<(), AbortError> {
        let mut failed = 0;
        let mut first = None;
        for (index, mut cmd) in self.list.into_iter().enumerate() {
            if let Err(err) = cmd.abort() {
                tracing::warn!(buffer = %self.id, index, command = ?cmd, %err, "command abort failed");
                failed += 1;
                first.get_or_insert((index, err));
            }
        }
        match first {
            None => Ok(()),
            Some((index, first)) => Err(AbortError {
                buffer: self.id,
                failed,
                index,
                first,
            }),
        }
    }
}

/// A named closure run as a command.
pub struct FnCommand<F> {
    name: String,
    f: F,
}

impl<F> FnCommand<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> fmt::Debug for FnCommand<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnCommand({})", self.name)
    }
}

impl<C, F> Command<C> for FnCommand<F>
where
    F: FnMut(&mut C) -> Result<(), CommandError> + Send,
{
    fn run(&mut self, ctx: &mut C) -> Result<(), CommandError> {
        (self.f)(ctx)
    }
}

/// Switches programs at replay time, so realization happens on the thread
/// that owns the context. Both programs stay locked until the command runs,
/// is aborted or is dropped.
pub struct BindProgram<C: GraphicsContext> {
    from: Option<Arc<ShaderProgram<C>>>,
    to: Option<Arc<ShaderProgram<C>>>,
    held: bool,
}

impl<C: GraphicsContext> BindProgram<C> {
    pub fn new(from: Option<Arc<ShaderProgram<C>>>, to: Option<Arc<ShaderProgram<C>>>) -> Self {
        for prog in from.iter().chain(to.iter()) {
            prog.lock();
        }
        Self { from, to, held: true }
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.held) {
            for prog in self.from.iter().chain(self.to.iter()) {
                prog.unlock();
            }
        }
    }
}

impl<C: GraphicsContext> Drop for BindProgram<C> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<C: GraphicsContext> fmt::Debug for BindProgram<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindProgram")
            .field("from", &self.from.as_ref().map(|p| p.id()))
            .field("to", &self.to.as_ref().map(|p| p.id()))
            .finish()
    }
}

impl<C: GraphicsContext> Command<C> for BindProgram<C> {
    fn run(&mut self, ctx: &mut C) -> Result<(), CommandError> {
        let res = ShaderProgram::bind_for_draw(ctx, self.from.as_deref(), self.to.as_deref());
        self.release();
        Ok(res?)
    }

    fn abort(&mut self) -> Result<(), CommandError> {
        self.release();
        Ok(())
    }
}
