//! Simulated display manager

use crate::platform::DisplayDiscovery;
use crate::types::DisplayDescriptor;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// Display set that tests and the simulator can hot-plug by hand
pub struct SimulatedDisplays {
    displays: watch::Sender<Vec<DisplayDescriptor>>,
    listening: AtomicBool,
}

impl SimulatedDisplays {
    /// Starts with only the built-in `default` display connected.
    pub fn new(default: DisplayDescriptor) -> Self {
        let (displays, _) = watch::channel(vec![default]);
        Self {
            displays,
            listening: AtomicBool::new(false),
        }
    }

    /// Connect `display`. Reconnecting a known id is ignored.
    pub fn connect(&self, display: DisplayDescriptor) {
        self.displays.send_if_modified(|displays| {
            if displays.iter().any(|d| d.id == display.id) {
                return false;
            }
            log::debug!("Simulated display connected: {}", display.id);
            displays.push(display);
            true
        });
    }

    pub fn disconnect(&self, id: u32) {
        self.displays.send_if_modified(|displays| {
            let before = displays.len();
            displays.retain(|d| d.id != id);
            before != displays.len()
        });
    }

    pub fn displays(&self) -> Vec<DisplayDescriptor> {
        self.displays.borrow().clone()
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

impl DisplayDiscovery for SimulatedDisplays {
    fn connected_displays(&self) -> watch::Receiver<Vec<DisplayDescriptor>> {
        self.displays.subscribe()
    }

    fn start_listening(&self) {
        self.listening.store(true, Ordering::SeqCst);
    }

    fn stop_listening(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hotplug_updates_set() {
        let displays = SimulatedDisplays::new(DisplayDescriptor::new(0, "Built-in"));
        let rx = displays.connected_displays();

        displays.connect(DisplayDescriptor::new(1, "HDMI"));
        displays.connect(DisplayDescriptor::new(1, "HDMI again"));
        assert_eq!(rx.borrow().len(), 2);

        displays.disconnect(1);
        displays.disconnect(1);
        assert_eq!(displays.displays(), vec![DisplayDescriptor::new(0, "Built-in")]);
    }
}
