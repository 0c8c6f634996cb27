//! Whole-function driver.

use snafu::ResultExt;
use stowage_ir::prelude::*;

use crate::async_store::{DescriptorLowering, pipeline_async_stores};
use crate::config::PipelineConfig;
use crate::error::{Result, VerifySnafu};

/// Pipeline the stores of every loop in `func`, innermost loops first.
/// Returns the number of loops that changed.
#[tracing::instrument(skip_all, fields(func = func.name()))]
pub fn pipeline_function(
    func: &mut Function,
    config: &PipelineConfig,
    lowering: &mut dyn DescriptorLowering,
) -> Result<usize> {
    if !config.enabled {
        tracing::debug!("store pipelining disabled");
        return Ok(0);
    }

    let mut changed = 0;
    for for_op in func.loops_post_order(func.entry()) {
        if !func.is_live(for_op) {
            continue;
        }
        if pipeline_async_stores(func, for_op, config, lowering)? {
            changed += 1;
            if config.verify {
                stowage_ir::verify(func).context(VerifySnafu { op: for_op })?;
            }
        }
    }

    tracing::debug!(changed, "pipelined loops");
    Ok(changed)
}
