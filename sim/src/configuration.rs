use bon::Builder;

/// Configuration struct containing options affecting the simulation time
/// decisions.
#[derive(Debug, Clone, Copy, Builder)]
pub struct RuntimeConfig {
    /// overrides the iteration bound stored in the schedule
    pub converge_limit: Option<u32>,
    /// seed of the generator behind `$urandom` and `randomize()`
    #[builder(default)]
    pub seed: u64,
    /// stop [run](crate::Simulator::run) before advancing past this time
    pub max_time: Option<u64>,
    /// statements a single activation may execute before it is considered
    /// stuck
    #[builder(default = 1_000_000)]
    pub max_steps: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.seed, 0);
        assert_eq!(cfg.max_steps, 1_000_000);
        assert!(cfg.converge_limit.is_none());
        let cfg = RuntimeConfig::builder().converge_limit(4).seed(7).build();
        assert_eq!(cfg.converge_limit, Some(4));
        assert_eq!(cfg.seed, 7);
    }
}
