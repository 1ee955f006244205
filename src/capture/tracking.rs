//! Per-component tap tracking.
//!
//! Any pressable can be wrapped in [`Tracked`]; the wrapper registers a tap
//! with the engine before the component's own handler runs.

use crate::models::{TapEvent, TapOrigin};

use super::engine::CaptureEngine;

/// A press delivered to a component, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Press {
    pub x: f64,
    pub y: f64,
}

pub trait Pressable {
    fn on_press(&mut self, press: Press);

    fn tracking_label(&self) -> Option<String> {
        None
    }

    fn tracking_category(&self) -> Option<String> {
        None
    }
}

pub struct Tracked<P> {
    inner: P,
    engine: CaptureEngine,
    screen: Option<String>,
}

impl<P: Pressable> Tracked<P> {
    pub fn new(inner: P, engine: CaptureEngine) -> Self {
        Self {
            inner,
            engine,
            screen: None,
        }
    }

    pub fn on_screen(mut self, screen: impl Into<String>) -> Self {
        self.screen = Some(screen.into());
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: Pressable> Pressable for Tracked<P> {
    fn on_press(&mut self, press: Press) {
        self.engine.register_tap(TapEvent {
            x: Some(press.x),
            y: Some(press.y),
            screen: self.screen.clone(),
            label: self.inner.tracking_label(),
            category: self.inner.tracking_category(),
            origin: TapOrigin::Auto,
            ..TapEvent::default()
        });
        self.inner.on_press(press);
    }

    fn tracking_label(&self) -> Option<String> {
        self.inner.tracking_label()
    }

    fn tracking_category(&self) -> Option<String> {
        self.inner.tracking_category()
    }
}
