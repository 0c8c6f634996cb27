//! Pipelining configuration.
//!
//! Built explicitly with bon builders or read from environment variables.

use bon::bon;

/// Default depth of the device-side descriptor ring.
pub const DEFAULT_DESCRIPTOR_STAGES: usize = 3;

/// Configuration for [`pipeline_function`](crate::pipeline_function).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Run the store pipelining pass at all.
    pub enabled: bool,
    /// Number of stages requested from descriptor multi-buffering when a
    /// loop stores through device-side descriptors.
    pub descriptor_stages: usize,
    /// Verify the function after every changed loop.
    pub verify: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { enabled: true, descriptor_stages: DEFAULT_DESCRIPTOR_STAGES, verify: false }
    }
}

#[bon]
impl PipelineConfig {
    /// Create a pipelining configuration with builder pattern.
    #[builder]
    pub fn builder(
        #[builder(default = true)] enabled: bool,
        #[builder(default = DEFAULT_DESCRIPTOR_STAGES)] descriptor_stages: usize,
        #[builder(default = false)] verify: bool,
    ) -> Self {
        Self { enabled, descriptor_stages, verify }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `STOWAGE_NO_STORE_PIPELINE` - Disable the pass if set
    /// * `STOWAGE_DESC_STAGES` - Descriptor ring depth (default: 3, must be > 0)
    /// * `STOWAGE_VERIFY` - Verify after each changed loop if set
    pub fn from_env() -> Self {
        let enabled = std::env::var("STOWAGE_NO_STORE_PIPELINE").is_err();
        let descriptor_stages = std::env::var("STOWAGE_DESC_STAGES")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&stages: &usize| stages > 0)
            .unwrap_or(DEFAULT_DESCRIPTOR_STAGES);
        let verify = std::env::var("STOWAGE_VERIFY").is_ok();

        Self { enabled, descriptor_stages, verify }
    }
}

// ============================================================================
// TESTS
// ============================================================================
