//! Run-scoped state shared by every component of one grading run.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::channel::OutputChannel;
use crate::compare::StructuralComparator;
use crate::config::GraderConfig;
use crate::error::GraderResult;
use crate::invoker::DualInvoker;
use crate::resolver::ArgumentResolver;
use crate::universe::UniversePair;

/// Everything one submission's run needs: configuration, both type
/// universes, the resolution session and the output channel.
///
/// Created at suite start and dropped at suite end; nothing in it is shared
/// between submissions.
pub struct RunContext {
    pub run_id: Uuid,
    pub config: GraderConfig,
    pub universes: UniversePair,
    pub resolver: ArgumentResolver,
    pub channel: OutputChannel,
    pub comparator: StructuralComparator,
    started: Instant,
}

impl RunContext {
    pub fn new(config: GraderConfig, universes: UniversePair) -> GraderResult<Self> {
        let channel = OutputChannel::new(&config.output_marker, config.max_output_length)?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            config,
            universes,
            resolver: ArgumentResolver::new(),
            channel,
            comparator: StructuralComparator::default(),
            started: Instant::now(),
        })
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn invoker(&self) -> DualInvoker<'_> {
        DualInvoker::new(self)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
