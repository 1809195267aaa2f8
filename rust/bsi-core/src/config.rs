use bsi_common::{Result, verify_arg};

/// Plane count at which per-plane mutations start fanning out to the thread pool.
const DEFAULT_PARALLEL_PLANE_THRESHOLD: usize = 16;

/// Upper bound on an explicit degree of parallelism.
const MAX_PARALLELISM: usize = 4096;

/// Execution parameters of a [`Bsi`](crate::Bsi).
///
/// The configuration never affects results, only how the work is scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BsiConfig {
    /// Degree of parallelism suggested to callers of the batch operations
    /// (`compare_value`, `transpose`, `batch_equal`, `min_max`).
    /// Zero means "use every worker thread".
    pub parallelism: usize,

    /// Per-plane mutations (`set_value`, `clear_values`, `par_or`, retain) run
    /// sequentially when the index has fewer planes than this.
    pub parallel_plane_threshold: usize,
}

impl Default for BsiConfig {
    fn default() -> Self {
        BsiConfig {
            parallelism: 0,
            parallel_plane_threshold: DEFAULT_PARALLEL_PLANE_THRESHOLD,
        }
    }
}

impl BsiConfig {
    /// Creates a fully specified configuration.
    pub fn with_all_parameters(
        parallelism: usize,
        parallel_plane_threshold: usize,
    ) -> Result<BsiConfig> {
        let config = BsiConfig {
            parallelism,
            parallel_plane_threshold,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        verify_arg!(parallelism, self.parallelism <= MAX_PARALLELISM);
        Ok(())
    }

    /// Whether a per-plane mutation over `plane_count` planes should fan out.
    #[inline]
    pub(crate) fn fan_out_planes(&self, plane_count: usize) -> bool {
        plane_count >= self.parallel_plane_threshold.max(2)
    }
}
