use once_cell::sync::Lazy;

static TRACE_LAYOUT: Lazy<bool> = Lazy::new(|| env_flag("RFLAYOUT_TRACE_LAYOUT"));

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| {
            let value = value.trim();
            value == "1" || value.eq_ignore_ascii_case("true")
        })
        .unwrap_or(false)
}

/// Per-node measure/arrange tracing, switched on with `RFLAYOUT_TRACE_LAYOUT=1`.
pub fn trace_layout_enabled() -> bool {
    *TRACE_LAYOUT
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutConfig {
    pub scale_factor: f32,
    pub use_layout_rounding: bool,
    pub cycle_limit: u32,
    pub diagnostic_window: u32,
    pub max_depth: usize,
    pub transition_delta_threshold: f32,
    pub animations_enabled: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutConfig {
    pub const DEFAULT_CYCLE_LIMIT: u32 = 250;
    pub const DEFAULT_DIAGNOSTIC_WINDOW: u32 = 8;
    pub const DEFAULT_MAX_DEPTH: usize = 250;
    pub const DEFAULT_TRANSITION_DELTA: f32 = 5.0;

    pub const fn new() -> Self {
        Self {
            scale_factor: 1.0,
            use_layout_rounding: true,
            cycle_limit: Self::DEFAULT_CYCLE_LIMIT,
            diagnostic_window: Self::DEFAULT_DIAGNOSTIC_WINDOW,
            max_depth: Self::DEFAULT_MAX_DEPTH,
            transition_delta_threshold: Self::DEFAULT_TRANSITION_DELTA,
            animations_enabled: true,
        }
    }

    /// Defaults, overridden by `RFLAYOUT_SCALE_FACTOR` and
    /// `RFLAYOUT_DISABLE_ANIMATIONS` when they are set.
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Some(scale) = std::env::var("RFLAYOUT_SCALE_FACTOR")
            .ok()
            .and_then(|value| value.trim().parse::<f32>().ok())
            .filter(|scale| scale.is_finite() && *scale > 0.0)
        {
            config.scale_factor = scale;
        }
        if env_flag("RFLAYOUT_DISABLE_ANIMATIONS") {
            config.animations_enabled = false;
        }
        config
    }

    pub const fn scale_factor(mut self, scale_factor: f32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub const fn layout_rounding(mut self, enabled: bool) -> Self {
        self.use_layout_rounding = enabled;
        self
    }

    pub const fn cycle_limit(mut self, cycle_limit: u32) -> Self {
        self.cycle_limit = cycle_limit;
        self
    }

    pub const fn diagnostic_window(mut self, window: u32) -> Self {
        self.diagnostic_window = window;
        self
    }

    pub const fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub const fn transition_delta_threshold(mut self, threshold: f32) -> Self {
        self.transition_delta_threshold = threshold;
        self
    }

    pub const fn animations(mut self, enabled: bool) -> Self {
        self.animations_enabled = enabled;
        self
    }
}
