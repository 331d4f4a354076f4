use std::time::{Duration, Instant};

use tracing::info;

use crate::config::LayoutConfig;
use crate::error::LayoutResult;
use crate::style::Size;
use crate::transition::{LayoutTransitionSnapshot, RunResult};
use crate::view::{LayoutManager, LayoutTree, RenderInvalidation};

/// Host-side owner of one tree and its layout manager: the viewport size,
/// the scale factor, redraw requests and the transition clock.
pub struct Viewport {
    tree: LayoutTree,
    manager: LayoutManager,
    width: u32,
    height: u32,
    redraw_requested: bool,
    last_transition_tick: Option<Instant>,
    layout_stats: LayoutStats,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new()
    }
}

impl Viewport {
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::default())
    }

    pub fn with_config(config: LayoutConfig) -> Self {
        Self {
            tree: LayoutTree::new(config),
            manager: LayoutManager::new(),
            width: 1,
            height: 1,
            redraw_requested: false,
            last_transition_tick: None,
            layout_stats: LayoutStats::new_from_env(),
        }
    }

    /// Viewport configured from `RFLAYOUT_*` environment variables.
    pub fn from_env() -> Self {
        Self::with_config(LayoutConfig::from_env())
    }

    pub fn tree(&self) -> &LayoutTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut LayoutTree {
        &mut self.tree
    }

    pub fn manager(&self) -> &LayoutManager {
        &self.manager
    }

    /// Zero dimensions are clamped to one pixel.
    pub fn set_size(&mut self, mut width: u32, mut height: u32) {
        if width == 0 {
            width = 1;
        }
        if height == 0 {
            height = 1;
        }
        if self.width == width && self.height == height {
            return;
        }
        self.width = width;
        self.height = height;
        self.redraw_requested = true;
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }

    pub fn set_scale_factor(&mut self, scale_factor: f32) {
        let before = self.tree.config().scale_factor;
        self.tree.set_scale_factor(scale_factor);
        if self.tree.config().scale_factor != before {
            self.redraw_requested = true;
        }
    }

    pub fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }

    pub fn redraw_requested(&self) -> bool {
        self.redraw_requested
    }

    pub fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }

    pub fn update_layout(&mut self) -> LayoutResult<()> {
        let started = Instant::now();
        let size = self.size();
        let result = self.manager.update_layout(&mut self.tree, size);
        self.layout_stats.record_update(started.elapsed());
        result
    }

    /// Advances transitions by the wall-clock time since the previous call.
    pub fn run_transitions(&mut self) -> RunResult {
        let now = Instant::now();
        let dt = self
            .last_transition_tick
            .map(|last| (now - last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_transition_tick = Some(now);
        self.advance_transitions(dt)
    }

    /// Advances transitions by an explicit `dt_seconds`.
    pub fn advance_transitions(&mut self, dt_seconds: f32) -> RunResult {
        let result = self
            .manager
            .advance_transitions(&mut self.tree, dt_seconds);
        if !result.keep_running {
            self.last_transition_tick = None;
        }
        if result.needs_paint || result.needs_layout {
            self.redraw_requested = true;
        }
        result
    }

    /// One host frame: layout, then transitions. Returns whether another
    /// frame should follow.
    pub fn frame(&mut self) -> LayoutResult<bool> {
        self.update_layout()?;
        let result = self.run_transitions();
        if result.needs_layout {
            self.update_layout()?;
        }
        Ok(result.keep_running || self.redraw_requested)
    }

    pub fn take_render_invalidations(&mut self) -> Vec<RenderInvalidation> {
        self.manager.take_render_invalidations()
    }

    pub fn take_transition_snapshots(&mut self) -> Vec<LayoutTransitionSnapshot> {
        self.manager.take_transition_snapshots()
    }
}

/// Update timing, reported once a second when `RFLAYOUT_TRACE_STATS` is set.
struct LayoutStats {
    enabled: bool,
    last_report_at: Instant,
    updates: u32,
    total_update_time: Duration,
}

impl LayoutStats {
    fn new_from_env() -> Self {
        Self {
            enabled: std::env::var("RFLAYOUT_TRACE_STATS").is_ok(),
            last_report_at: Instant::now(),
            updates: 0,
            total_update_time: Duration::ZERO,
        }
    }

    fn record_update(&mut self, update_time: Duration) {
        if !self.enabled {
            return;
        }
        self.updates += 1;
        self.total_update_time += update_time;

        let elapsed = self.last_report_at.elapsed();
        if elapsed < Duration::from_secs(1) {
            return;
        }
        let avg_ms = (self.total_update_time.as_secs_f64() * 1000.0) / f64::from(self.updates);
        info!(updates = self.updates, avg_ms, "layout stats");

        self.last_report_at = Instant::now();
        self.updates = 0;
        self.total_update_time = Duration::ZERO;
    }
}
