//! Error types for the pipelining passes.

use snafu::Snafu;
use stowage_ir::OpId;

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Building or erasing an op failed.
    #[snafu(display("IR error: {source}"))]
    Ir {
        #[snafu(source)]
        source: stowage_ir::Error,
    },

    /// The pass was pointed at something other than a `for` op.
    #[snafu(display("{op} is not a loop"))]
    NotALoop { op: OpId },

    /// The descriptor lowering collaborator rejected the loop.
    #[snafu(display("descriptor lowering failed for {op}: {source}"))]
    DescriptorLowering {
        op: OpId,
        #[snafu(source)]
        source: Box<PipelineError>,
    },

    /// The function no longer verifies after pipelining a loop.
    #[snafu(display("function invalid after pipelining {op}: {source}"))]
    Verify {
        op: OpId,
        #[snafu(source)]
        source: stowage_ir::Error,
    },
}

impl From<stowage_ir::Error> for PipelineError {
    fn from(source: stowage_ir::Error) -> Self {
        Self::Ir { source }
    }
}
