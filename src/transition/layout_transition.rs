use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::{
    ChannelId, ClaimMode, RunResult, StartTrackError, TimeFunction, TrackKey, TrackTarget,
    Transition, TransitionFrame, TransitionHost, TransitionPluginId, normalized_timeline_progress,
};

pub const CHANNEL_GHOST_TRANSLATE_X: ChannelId = ChannelId(20_001);
pub const CHANNEL_GHOST_TRANSLATE_Y: ChannelId = ChannelId(20_002);
pub const CHANNEL_GHOST_OPACITY: ChannelId = ChannelId(20_003);
pub const CHANNEL_GHOST_SCALE: ChannelId = ChannelId(20_004);

/// Animatable property of a [`TransitionGhost`](super::TransitionGhost).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GhostField {
    TranslateX,
    TranslateY,
    Opacity,
    Scale,
}

impl GhostField {
    pub const ALL: [Self; 4] = [Self::TranslateX, Self::TranslateY, Self::Opacity, Self::Scale];

    pub const fn channel_id(self) -> ChannelId {
        match self {
            Self::TranslateX => CHANNEL_GHOST_TRANSLATE_X,
            Self::TranslateY => CHANNEL_GHOST_TRANSLATE_Y,
            Self::Opacity => CHANNEL_GHOST_OPACITY,
            Self::Scale => CHANNEL_GHOST_SCALE,
        }
    }

    pub fn from_channel(channel: ChannelId) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.channel_id() == channel)
    }
}

/// Timing of one storyboard track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutTransition {
    pub duration_ms: u32,
    pub delay_ms: u32,
    pub timing: TimeFunction,
}

impl Default for LayoutTransition {
    fn default() -> Self {
        Self::new(300)
    }
}

impl LayoutTransition {
    pub const fn new(duration_ms: u32) -> Self {
        Self {
            duration_ms,
            delay_ms: 0,
            timing: TimeFunction::EaseOut,
        }
    }

    pub const fn delay(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub const fn timing(mut self, timing: TimeFunction) -> Self {
        self.timing = timing;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GhostTrackSpec {
    pub field: GhostField,
    pub from: f32,
    pub to: f32,
    pub transition: LayoutTransition,
}

/// Tracks that start together and complete as one unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StoryboardSpec {
    pub tracks: Vec<GhostTrackSpec>,
}

impl StoryboardSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(mut self, field: GhostField, from: f32, to: f32, transition: LayoutTransition) -> Self {
        self.tracks.push(GhostTrackSpec {
            field,
            from,
            to,
            transition,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoryboardId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GhostSample {
    pub target: TrackTarget,
    pub field: GhostField,
    pub value: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct GhostTrackState {
    storyboard: StoryboardId,
    from: f32,
    to: f32,
    elapsed_seconds: f32,
    delay_seconds: f32,
    transition: LayoutTransition,
}

#[derive(Clone, Debug, PartialEq)]
struct StoryboardState {
    target: TrackTarget,
    begin_delay_seconds: f32,
    elapsed_seconds: f32,
    begun: bool,
    keys: Vec<TrackKey<TrackTarget>>,
}

/// Plays storyboards on ghost channels. Each storyboard owns one track per
/// channel of its target; claiming a channel replaces whatever track held
/// it before.
#[derive(Debug)]
pub struct LayoutTransitionPlugin {
    plugin_id: TransitionPluginId,
    next_storyboard: u64,
    storyboards: HashMap<StoryboardId, StoryboardState>,
    tracks: HashMap<TrackKey<TrackTarget>, GhostTrackState>,
    frame_samples: Vec<GhostSample>,
    begun: Vec<(StoryboardId, TrackTarget)>,
    completed: Vec<(StoryboardId, TrackTarget)>,
}

impl Default for LayoutTransitionPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutTransitionPlugin {
    pub const BUILTIN_PLUGIN_ID: TransitionPluginId = TransitionPluginId(2);

    pub fn new() -> Self {
        Self::with_plugin_id(Self::BUILTIN_PLUGIN_ID)
    }

    pub fn with_plugin_id(plugin_id: TransitionPluginId) -> Self {
        Self {
            plugin_id,
            next_storyboard: 1,
            storyboards: HashMap::new(),
            tracks: HashMap::new(),
            frame_samples: Vec::new(),
            begun: Vec::new(),
            completed: Vec::new(),
        }
    }

    /// Starts every track of `spec` on `target`. All channels are checked
    /// before any claim is taken, so a rejected storyboard leaves no tracks
    /// behind.
    pub fn start_storyboard(
        &mut self,
        host: &mut dyn TransitionHost<TrackTarget>,
        target: TrackTarget,
        spec: &StoryboardSpec,
        begin_delay_ms: u32,
    ) -> Result<StoryboardId, StartTrackError<TrackTarget>> {
        if spec.is_empty() {
            return Err(StartTrackError::InvalidInput("storyboard without tracks"));
        }
        if let Some(track) = spec
            .tracks
            .iter()
            .find(|track| !host.is_channel_registered(track.field.channel_id()))
        {
            return Err(StartTrackError::ChannelNotRegistered(track.field.channel_id()));
        }

        let id = StoryboardId(self.next_storyboard);
        self.next_storyboard += 1;
        let begin_delay_seconds = begin_delay_ms as f32 / 1000.0;
        let mut keys = Vec::with_capacity(spec.tracks.len());

        for track in &spec.tracks {
            let key = TrackKey {
                target,
                channel: track.field.channel_id(),
            };
            if !host.claim_track(self.plugin_id, key, ClaimMode::Replace) {
                for key in keys.drain(..) {
                    self.tracks.remove(&key);
                    host.release_track_claim(self.plugin_id, key);
                }
                return Err(StartTrackError::ClaimRejected(key));
            }
            if let Some(previous) = self.tracks.remove(&key) {
                self.detach_track(previous.storyboard, key);
            }
            self.tracks.insert(
                key,
                GhostTrackState {
                    storyboard: id,
                    from: track.from,
                    to: track.to,
                    elapsed_seconds: 0.0,
                    delay_seconds: begin_delay_seconds + track.transition.delay_ms as f32 / 1000.0,
                    transition: track.transition,
                },
            );
            keys.push(key);
        }

        self.storyboards.insert(
            id,
            StoryboardState {
                target,
                begin_delay_seconds,
                elapsed_seconds: 0.0,
                begun: false,
                keys,
            },
        );
        Ok(id)
    }

    /// Drops a storyboard without reporting it as completed.
    pub fn cancel_storyboard(&mut self, host: &mut dyn TransitionHost<TrackTarget>, id: StoryboardId) {
        let Some(storyboard) = self.storyboards.remove(&id) else {
            return;
        };
        for key in storyboard.keys {
            self.tracks.remove(&key);
            host.release_track_claim(self.plugin_id, key);
        }
    }

    pub fn is_running(&self, id: StoryboardId) -> bool {
        self.storyboards.contains_key(&id)
    }

    pub fn take_samples(&mut self) -> Vec<GhostSample> {
        std::mem::take(&mut self.frame_samples)
    }

    /// Storyboards whose begin delay elapsed during the last run.
    pub fn take_begun(&mut self) -> Vec<(StoryboardId, TrackTarget)> {
        std::mem::take(&mut self.begun)
    }

    pub fn take_completed(&mut self) -> Vec<(StoryboardId, TrackTarget)> {
        std::mem::take(&mut self.completed)
    }

    fn detach_track(&mut self, id: StoryboardId, key: TrackKey<TrackTarget>) {
        let Some(storyboard) = self.storyboards.get_mut(&id) else {
            return;
        };
        storyboard.keys.retain(|held| *held != key);
        if storyboard.keys.is_empty() {
            self.storyboards.remove(&id);
        }
    }
}

impl Transition<TrackTarget> for LayoutTransitionPlugin {
    fn plugin_id(&self) -> TransitionPluginId {
        self.plugin_id
    }

    fn observed_channels(&self, _target: TrackTarget) -> Vec<ChannelId> {
        GhostField::ALL.map(GhostField::channel_id).to_vec()
    }

    fn start_track(
        &mut self,
        key: TrackKey<TrackTarget>,
        host: &mut dyn TransitionHost<TrackTarget>,
    ) -> Result<(), StartTrackError<TrackTarget>> {
        let field = GhostField::from_channel(key.channel)
            .ok_or(StartTrackError::ChannelNotRegistered(key.channel))?;
        let spec = StoryboardSpec::new().track(field, 0.0, 0.0, LayoutTransition::new(0));
        self.start_storyboard(host, key.target, &spec, 0).map(|_| ())
    }

    fn cancel_track(
        &mut self,
        key: TrackKey<TrackTarget>,
        host: &mut dyn TransitionHost<TrackTarget>,
    ) {
        if let Some(state) = self.tracks.remove(&key) {
            self.detach_track(state.storyboard, key);
        }
        host.release_track_claim(self.plugin_id, key);
    }

    fn run_tracks(
        &mut self,
        frame: TransitionFrame,
        host: &mut dyn TransitionHost<TrackTarget>,
    ) -> RunResult {
        self.frame_samples.clear();
        let dt = frame.dt_seconds.max(0.0);

        for (id, storyboard) in &mut self.storyboards {
            storyboard.elapsed_seconds += dt;
            if !storyboard.begun && storyboard.elapsed_seconds >= storyboard.begin_delay_seconds {
                storyboard.begun = true;
                self.begun.push((*id, storyboard.target));
            }
        }

        let mut finished = Vec::new();
        for (key, state) in &mut self.tracks {
            state.elapsed_seconds += dt;
            let duration = state.transition.duration_ms as f32 / 1000.0;
            let Some(progress) =
                normalized_timeline_progress(state.elapsed_seconds, state.delay_seconds, duration)
            else {
                continue;
            };
            let Some(field) = GhostField::from_channel(key.channel) else {
                continue;
            };
            self.frame_samples.push(GhostSample {
                target: key.target,
                field,
                value: state.transition.timing.interpolate(state.from, state.to, progress),
            });
            if progress >= 1.0 {
                finished.push((*key, state.storyboard));
            }
        }

        let mut completed = Vec::new();
        for (key, id) in finished {
            self.tracks.remove(&key);
            host.release_track_claim(self.plugin_id, key);
            if let Some(storyboard) = self.storyboards.get_mut(&id) {
                storyboard.keys.retain(|held| *held != key);
                if storyboard.keys.is_empty() {
                    let target = storyboard.target;
                    self.storyboards.remove(&id);
                    completed.push((id, target));
                }
            }
        }
        completed.sort_by_key(|(id, _)| *id);
        if !completed.is_empty() {
            debug!(count = completed.len(), "storyboards completed");
        }
        self.begun.sort_by_key(|(id, _)| *id);
        self.completed.extend(completed);

        RunResult {
            needs_layout: !self.completed.is_empty(),
            needs_paint: !self.frame_samples.is_empty(),
            keep_running: !self.storyboards.is_empty(),
        }
    }
}

struct TransitionHostAdapter<'a> {
    registered_channels: &'a HashSet<ChannelId>,
    claims: &'a mut HashMap<TrackKey<TrackTarget>, TransitionPluginId>,
}

impl TransitionHost<TrackTarget> for TransitionHostAdapter<'_> {
    fn is_channel_registered(&self, channel: ChannelId) -> bool {
        self.registered_channels.contains(&channel)
    }

    fn claim_track(
        &mut self,
        plugin_id: TransitionPluginId,
        key: TrackKey<TrackTarget>,
        mode: ClaimMode,
    ) -> bool {
        if let Some(current) = self.claims.get(&key).copied() {
            if current == plugin_id {
                return true;
            }
            if matches!(mode, ClaimMode::Replace) {
                self.claims.insert(key, plugin_id);
                return true;
            }
            return false;
        }
        self.claims.insert(key, plugin_id);
        true
    }

    fn release_track_claim(&mut self, plugin_id: TransitionPluginId, key: TrackKey<TrackTarget>) {
        if self.claims.get(&key).copied() == Some(plugin_id) {
            self.claims.remove(&key);
        }
    }

    fn release_all_claims(&mut self, plugin_id: TransitionPluginId) {
        self.claims.retain(|_, owner| *owner != plugin_id);
    }
}

/// The animation side owned by a layout manager: ghost channels, their
/// claims and the storyboard plugin.
pub(crate) struct StoryboardRuntime {
    channels: HashSet<ChannelId>,
    claims: HashMap<TrackKey<TrackTarget>, TransitionPluginId>,
    plugin: LayoutTransitionPlugin,
}

impl StoryboardRuntime {
    pub(crate) fn new() -> Self {
        Self {
            channels: GhostField::ALL.map(GhostField::channel_id).into_iter().collect(),
            claims: HashMap::new(),
            plugin: LayoutTransitionPlugin::new(),
        }
    }

    pub(crate) fn start(
        &mut self,
        target: TrackTarget,
        spec: &StoryboardSpec,
        begin_delay_ms: u32,
    ) -> Result<StoryboardId, StartTrackError<TrackTarget>> {
        let mut host = TransitionHostAdapter {
            registered_channels: &self.channels,
            claims: &mut self.claims,
        };
        self.plugin
            .start_storyboard(&mut host, target, spec, begin_delay_ms)
    }

    pub(crate) fn cancel(&mut self, id: StoryboardId) {
        let mut host = TransitionHostAdapter {
            registered_channels: &self.channels,
            claims: &mut self.claims,
        };
        self.plugin.cancel_storyboard(&mut host, id);
    }

    pub(crate) fn run(&mut self, dt_seconds: f32) -> RunResult {
        let mut host = TransitionHostAdapter {
            registered_channels: &self.channels,
            claims: &mut self.claims,
        };
        self.plugin
            .run_tracks(TransitionFrame { dt_seconds }, &mut host)
    }

    pub(crate) fn is_running(&self, id: StoryboardId) -> bool {
        self.plugin.is_running(id)
    }

    #[cfg(test)]
    pub(crate) fn claim_count(&self) -> usize {
        self.claims.len()
    }

    pub(crate) fn take_samples(&mut self) -> Vec<GhostSample> {
        self.plugin.take_samples()
    }

    pub(crate) fn take_begun(&mut self) -> Vec<(StoryboardId, TrackTarget)> {
        self.plugin.take_begun()
    }

    pub(crate) fn take_completed(&mut self) -> Vec<(StoryboardId, TrackTarget)> {
        self.plugin.take_completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fade(duration_ms: u32) -> StoryboardSpec {
        StoryboardSpec::new().track(
            GhostField::Opacity,
            0.0,
            1.0,
            LayoutTransition::new(duration_ms).timing(TimeFunction::Linear),
        )
    }

    #[test]
    fn storyboard_samples_and_completes() {
        let mut runtime = StoryboardRuntime::new();
        let id = runtime.start(7, &fade(1000), 0).unwrap();

        runtime.run(0.5);
        assert_eq!(
            runtime.take_samples(),
            vec![GhostSample {
                target: 7,
                field: GhostField::Opacity,
                value: 0.5,
            }]
        );
        assert!(runtime.take_completed().is_empty());
        assert!(runtime.is_running(id));

        let result = runtime.run(0.5);
        assert_eq!(runtime.take_completed(), vec![(id, 7)]);
        assert!(!result.keep_running);
        assert_eq!(runtime.claim_count(), 0);
    }

    #[test]
    fn begin_delay_holds_samples_back() {
        let mut runtime = StoryboardRuntime::new();
        let id = runtime.start(3, &fade(100), 250).unwrap();

        runtime.run(0.125);
        assert!(runtime.take_samples().is_empty());
        assert!(runtime.take_begun().is_empty());

        runtime.run(0.125);
        assert_eq!(runtime.take_begun(), vec![(id, 3)]);
    }

    #[test]
    fn newer_storyboard_replaces_the_channel() {
        let mut runtime = StoryboardRuntime::new();
        let first = runtime.start(1, &fade(1000), 0).unwrap();
        let second = runtime.start(1, &fade(1000), 0).unwrap();

        assert!(!runtime.is_running(first));
        assert!(runtime.is_running(second));
        assert_eq!(runtime.claim_count(), 1);

        runtime.cancel(second);
        assert_eq!(runtime.claim_count(), 0);
        assert!(!runtime.run(0.1).keep_running);
        assert!(runtime.take_completed().is_empty());
    }

    #[test]
    fn empty_storyboards_are_rejected() {
        let mut runtime = StoryboardRuntime::new();
        assert_eq!(
            runtime.start(1, &StoryboardSpec::new(), 0),
            Err(StartTrackError::InvalidInput("storyboard without tracks"))
        );
    }

    #[test]
    fn unknown_channels_are_rejected() {
        let channels = HashSet::new();
        let mut claims = HashMap::new();
        let mut host = TransitionHostAdapter {
            registered_channels: &channels,
            claims: &mut claims,
        };
        let mut plugin = LayoutTransitionPlugin::new();
        assert_eq!(
            plugin.start_storyboard(&mut host, 1, &fade(10), 0),
            Err(StartTrackError::ChannelNotRegistered(CHANNEL_GHOST_OPACITY))
        );
        assert!(claims.is_empty());
    }
}
