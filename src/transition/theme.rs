use glam::Vec2;

use super::{GhostField, LayoutTransition, StaggerFunction, StoryboardSpec, TransitionTrigger};
use crate::style::{Rect, Size};
use crate::view::NodeId;

/// Captured geometry handed to a theme transition when its storyboards are
/// built. Offsets are relative to the node's parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StoryboardRequest {
    pub node: NodeId,
    pub trigger: TransitionTrigger,
    pub size_start: Size,
    pub size_destination: Size,
    pub transform_start: Vec2,
    pub transform_destination: Vec2,
    pub opacity_start: f32,
    pub opacity_destination: f32,
    pub scale_start: f32,
}

impl StoryboardRequest {
    /// Ghost translation at the start of the animation.
    pub fn translate_start(&self) -> Vec2 {
        self.transform_start - self.transform_destination
    }
}

/// A reusable recipe that turns a captured layout change into storyboards.
pub trait ThemeTransition: 'static {
    fn participates(&self, trigger: TransitionTrigger) -> bool;

    fn create_storyboards(&self, request: &StoryboardRequest) -> Vec<StoryboardSpec>;

    /// Begin delays for nodes realized together, one per slot.
    fn stagger_delays(&self, slots: &[Rect]) -> Vec<u32> {
        vec![0; slots.len()]
    }
}

fn translate_home(spec: StoryboardSpec, from: Vec2, timing: LayoutTransition) -> StoryboardSpec {
    spec.track(GhostField::TranslateX, from.x, 0.0, timing)
        .track(GhostField::TranslateY, from.y, 0.0, timing)
}

/// Slides a node from where it was to where layout put it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RepositionThemeTransition {
    pub timing: LayoutTransition,
}

impl Default for RepositionThemeTransition {
    fn default() -> Self {
        Self {
            timing: LayoutTransition::new(300),
        }
    }
}

impl ThemeTransition for RepositionThemeTransition {
    fn participates(&self, trigger: TransitionTrigger) -> bool {
        matches!(trigger, TransitionTrigger::Layout | TransitionTrigger::Reparent)
    }

    fn create_storyboards(&self, request: &StoryboardRequest) -> Vec<StoryboardSpec> {
        let mut spec = translate_home(StoryboardSpec::new(), request.translate_start(), self.timing);
        if request.trigger == TransitionTrigger::Reparent {
            spec = spec.track(
                GhostField::Opacity,
                request.opacity_start,
                request.opacity_destination,
                self.timing,
            );
        }
        vec![spec]
    }
}

/// Fades a node in while it slides from an offset to its slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntranceThemeTransition {
    pub from_horizontal_offset: f32,
    pub from_vertical_offset: f32,
    pub is_staggering_enabled: bool,
    pub stagger: StaggerFunction,
    pub timing: LayoutTransition,
}

impl Default for EntranceThemeTransition {
    fn default() -> Self {
        Self {
            from_horizontal_offset: 40.0,
            from_vertical_offset: 0.0,
            is_staggering_enabled: true,
            stagger: StaggerFunction::default(),
            timing: LayoutTransition::new(300),
        }
    }
}

impl EntranceThemeTransition {
    pub fn from_offset(mut self, horizontal: f32, vertical: f32) -> Self {
        self.from_horizontal_offset = horizontal;
        self.from_vertical_offset = vertical;
        self
    }

    pub fn staggering(mut self, enabled: bool) -> Self {
        self.is_staggering_enabled = enabled;
        self
    }
}

impl ThemeTransition for EntranceThemeTransition {
    fn participates(&self, trigger: TransitionTrigger) -> bool {
        trigger == TransitionTrigger::Load
    }

    fn create_storyboards(&self, request: &StoryboardRequest) -> Vec<StoryboardSpec> {
        let offset = Vec2::new(self.from_horizontal_offset, self.from_vertical_offset);
        let spec = translate_home(StoryboardSpec::new(), offset, self.timing).track(
            GhostField::Opacity,
            0.0,
            request.opacity_destination,
            self.timing,
        );
        vec![spec]
    }

    fn stagger_delays(&self, slots: &[Rect]) -> Vec<u32> {
        if self.is_staggering_enabled {
            self.stagger.delays(slots)
        } else {
            vec![0; slots.len()]
        }
    }
}

/// Fades nodes in on load and out on unload, and slides them on layout
/// changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AddDeleteThemeTransition {
    pub timing: LayoutTransition,
}

impl Default for AddDeleteThemeTransition {
    fn default() -> Self {
        Self {
            timing: LayoutTransition::new(250),
        }
    }
}

impl ThemeTransition for AddDeleteThemeTransition {
    fn participates(&self, trigger: TransitionTrigger) -> bool {
        matches!(
            trigger,
            TransitionTrigger::Load | TransitionTrigger::Unload | TransitionTrigger::Layout
        )
    }

    fn create_storyboards(&self, request: &StoryboardRequest) -> Vec<StoryboardSpec> {
        let spec = match request.trigger {
            TransitionTrigger::Load => StoryboardSpec::new()
                .track(GhostField::Opacity, 0.0, request.opacity_destination, self.timing)
                .track(GhostField::Scale, 0.9, 1.0, self.timing),
            TransitionTrigger::Unload => StoryboardSpec::new()
                .track(GhostField::Opacity, request.opacity_start, 0.0, self.timing)
                .track(GhostField::Scale, request.scale_start, 0.9, self.timing),
            TransitionTrigger::Layout => {
                translate_home(StoryboardSpec::new(), request.translate_start(), self.timing)
            }
            TransitionTrigger::None | TransitionTrigger::Reparent => return Vec::new(),
        };
        vec![spec]
    }
}
