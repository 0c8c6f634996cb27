//! Asynchronous TMA store pipelining for stowage tile loops.
//!
//! Synchronous descriptor stores in a loop body stall the compute stream
//! until the write reaches global memory. This crate turns them into staged
//! copies executed by the copy engine, so the next iteration's compute
//! overlaps the previous iteration's writes.
//!
//! # Module Organization
//!
//! - [`async_store`] - The per-loop transform and its phases
//! - [`encoding`] - Staging buffer layouts and copy coordinates
//! - [`multibuffer`] - Default ring lowering of device-side descriptors
//! - [`driver`] - Apply the transform to every loop of a function
//! - [`config`] - Configuration with builder and environment fallbacks
//! - [`error`] - Error types and result handling
//!
//! # Example
//!
//! ```rust,ignore
//! use stowage_pipeline::{PipelineConfig, RingDescriptorLowering, pipeline_function};
//!
//! let changed = pipeline_function(&mut func, &PipelineConfig::from_env(), &mut RingDescriptorLowering)?;
//! ```

pub mod async_store;
pub mod config;
pub mod driver;
pub mod encoding;
pub mod error;
pub mod multibuffer;


pub use async_store::{
    BufferKey, BufferPlan, CoarseSchedule, DescriptorLowering, StoreKind, StoreRecord, pipeline_async_stores,
};
pub use config::PipelineConfig;
pub use driver::pipeline_function;
pub use encoding::{encoding_from_descriptor, translate_indices};
pub use error::{PipelineError, Result};
pub use multibuffer::RingDescriptorLowering;
