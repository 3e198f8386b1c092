//! Hardware seams: GPIO-level traits and demo implementations.
//!
//! The real device drives one TX output pin per band, a momentary button, and
//! an LED (active-low on this hardware revision). On a host machine the demo
//! implementations stand in so the whole pipeline runs without hardware,
//! logging what a pin would have done.

/// A GPIO output line.
pub trait OutputPin: Send {
    fn set(&mut self, high: bool);
}

/// A momentary button input. Implementations take care of pull-up polarity;
/// `is_pressed` is true while the button is physically held.
pub trait ButtonPin: Send {
    fn is_pressed(&self) -> bool;
}

/// A status LED.
pub trait LedPin: Send {
    fn set_lit(&mut self, lit: bool);
}

/// Adapter for an LED wired active-low: driving the pin low lights it.
pub struct ActiveLowLed<P: OutputPin> {
    pin: P,
}

impl<P: OutputPin> ActiveLowLed<P> {
    pub fn new(mut pin: P) -> Self {
        pin.set(true); // off
        Self { pin }
    }
}

impl<P: OutputPin> LedPin for ActiveLowLed<P> {
    fn set_lit(&mut self, lit: bool) {
        self.pin.set(!lit);
    }
}

/// Output pin that only logs. Used in demo mode.
pub struct DemoPin {
    label: &'static str,
}

impl DemoPin {
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }
}

impl OutputPin for DemoPin {
    fn set(&mut self, high: bool) {
        tracing::trace!(pin = self.label, high, "demo pin write");
    }
}

/// Button that is never pressed. Used in demo mode.
pub struct DemoButton;

impl ButtonPin for DemoButton {
    fn is_pressed(&self) -> bool {
        false
    }
}
