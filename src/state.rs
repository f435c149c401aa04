//! Typed project state and change notifications.
//!
//! A typed port of the host's path-addressed observable map: coarse-grained
//! subscriptions keyed by a change-kind enum, with same-value writes
//! coalesced. The event bus carries the core's outbound notifications.

use std::collections::HashMap;

use crate::{
    color::ColorSpace,
    core::{Canvas, FrameIndex, Fps},
    error::{PrismatteError, PrismatteResult},
};

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ColorPreset {
    #[default]
    Direct709,
    Rec2020Linear,
    DisplayP3Direct,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProjectSettings {
    pub canvas: Canvas,
    pub frame_rate: Fps,
    #[serde(default)]
    pub working_space: ColorSpace,
    #[serde(default)]
    pub output_space: ColorSpace,
    #[serde(default)]
    pub linear_compositing: bool,
    #[serde(default)]
    pub color_aware_effects: bool,
    #[serde(default)]
    pub color_preset: ColorPreset,
}

impl ProjectSettings {
    pub fn new(canvas: Canvas, frame_rate: Fps) -> Self {
        Self {
            canvas,
            frame_rate,
            working_space: ColorSpace::default(),
            output_space: ColorSpace::default(),
            linear_compositing: false,
            color_aware_effects: true,
            color_preset: ColorPreset::default(),
        }
    }

    pub fn validate(&self) -> PrismatteResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(PrismatteError::invalid("canvas", "width and height must be > 0"));
        }
        if self.frame_rate.num == 0 || self.frame_rate.den == 0 {
            return Err(PrismatteError::invalid("frame rate", "num and den must be > 0"));
        }
        Ok(())
    }
}

/// What changed in the store. Subscriptions are per kind, matching the
/// coarse-grained prefix subscriptions of the host's path observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Canvas,
    FrameRate,
    WorkingSpace,
    OutputSpace,
    LinearCompositing,
    ColorAwareEffects,
    ColorPreset,
    PlaybackFrame,
}

type ChangeCallback = Box<dyn Fn(ChangeKind)>;

/// Observable snapshot of the project-level state the core reads. Writes with
/// an unchanged value are coalesced and do not notify.
#[derive(Default)]
pub struct StateStore {
    settings: Option<ProjectSettings>,
    playback_frame: FrameIndex,
    subscribers: Vec<(ChangeKind, ChangeCallback)>,
}

impl StateStore {
    pub fn new(settings: ProjectSettings) -> Self {
        Self {
            settings: Some(settings),
            playback_frame: FrameIndex(0),
            subscribers: Vec::new(),
        }
    }

    pub fn settings(&self) -> Option<&ProjectSettings> {
        self.settings.as_ref()
    }

    pub fn playback_frame(&self) -> FrameIndex {
        self.playback_frame
    }

    pub fn subscribe(&mut self, kind: ChangeKind, callback: impl Fn(ChangeKind) + 'static) {
        self.subscribers.push((kind, Box::new(callback)));
    }

    fn notify(&self, kind: ChangeKind) {
        for (k, cb) in &self.subscribers {
            if *k == kind {
                cb(kind);
            }
        }
    }

    pub fn set_playback_frame(&mut self, frame: FrameIndex) {
        if self.playback_frame == frame {
            return;
        }
        self.playback_frame = frame;
        self.notify(ChangeKind::PlaybackFrame);
    }

    pub fn set_settings(&mut self, settings: ProjectSettings) {
        let new = settings.clone();
        let old = self.settings.replace(settings);
        let Some(old) = old else {
            for kind in [
                ChangeKind::Canvas,
                ChangeKind::FrameRate,
                ChangeKind::WorkingSpace,
                ChangeKind::OutputSpace,
                ChangeKind::LinearCompositing,
                ChangeKind::ColorAwareEffects,
                ChangeKind::ColorPreset,
            ] {
                self.notify(kind);
            }
            return;
        };
        if old.canvas != new.canvas {
            self.notify(ChangeKind::Canvas);
        }
        if old.frame_rate != new.frame_rate {
            self.notify(ChangeKind::FrameRate);
        }
        if old.working_space != new.working_space {
            self.notify(ChangeKind::WorkingSpace);
        }
        if old.output_space != new.output_space {
            self.notify(ChangeKind::OutputSpace);
        }
        if old.linear_compositing != new.linear_compositing {
            self.notify(ChangeKind::LinearCompositing);
        }
        if old.color_aware_effects != new.color_aware_effects {
            self.notify(ChangeKind::ColorAwareEffects);
        }
        if old.color_preset != new.color_preset {
            self.notify(ChangeKind::ColorPreset);
        }
    }
}

/// Topics on the host event bus the core publishes to or listens on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    TimelineUpdated,
    SelectionChanged,
    JobProgress,
    JobFinished,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BusEvent {
    /// Emitted whenever an effect parameter, keyframe, mask, or stroke
    /// changes.
    TimelineUpdated { clip_id: Option<String> },
    SelectionChanged { clip_ids: Vec<String> },
    JobProgress { job: String, done: i64, total: i64 },
    JobFinished { job: String, ok: bool },
}

impl BusEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::TimelineUpdated { .. } => Topic::TimelineUpdated,
            Self::SelectionChanged { .. } => Topic::SelectionChanged,
            Self::JobProgress { .. } => Topic::JobProgress,
            Self::JobFinished { .. } => Topic::JobFinished,
        }
    }
}

type BusCallback = Box<dyn Fn(&BusEvent)>;

#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<Topic, Vec<BusCallback>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, topic: Topic, handler: impl Fn(&BusEvent) + 'static) {
        self.handlers.entry(topic).or_default().push(Box::new(handler));
    }

    pub fn publish(&self, event: &BusEvent) {
        if let Some(handlers) = self.handlers.get(&event.topic()) {
            for h in handlers {
                h(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    fn settings() -> ProjectSettings {
        ProjectSettings::new(
            Canvas {
                width: 1920,
                height: 1080,
            },
            Fps::new(30, 1).unwrap(),
        )
    }

    #[test]
    fn same_value_writes_are_coalesced() {
        let hits = Rc::new(RefCell::new(0));
        let mut store = StateStore::new(settings());
        let h = hits.clone();
        store.subscribe(ChangeKind::PlaybackFrame, move |_| *h.borrow_mut() += 1);

        store.set_playback_frame(FrameIndex(5));
        store.set_playback_frame(FrameIndex(5));
        store.set_playback_frame(FrameIndex(6));
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn settings_diff_notifies_only_changed_kinds() {
        let kinds = Rc::new(RefCell::new(Vec::new()));
        let mut store = StateStore::new(settings());
        for kind in [ChangeKind::Canvas, ChangeKind::LinearCompositing] {
            let k = kinds.clone();
            store.subscribe(kind, move |c| k.borrow_mut().push(c));
        }

        let mut s = settings();
        s.linear_compositing = true;
        store.set_settings(s);
        assert_eq!(&*kinds.borrow(), &[ChangeKind::LinearCompositing]);
    }

    #[test]
    fn bus_routes_by_topic() {
        let hits = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new();
        let h = hits.clone();
        bus.subscribe(Topic::TimelineUpdated, move |_| *h.borrow_mut() += 1);

        bus.publish(&BusEvent::TimelineUpdated { clip_id: None });
        bus.publish(&BusEvent::JobFinished {
            job: "track".into(),
            ok: true,
        });
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn settings_validate() {
        let mut s = settings();
        assert!(s.validate().is_ok());
        s.canvas.width = 0;
        assert!(s.validate().is_err());
    }
}
