//! Display hot-plug monitoring
//!
//! Watches the display discovery provider, diffs the connected display set into
//! connect/disconnect events and derives the external display: the first
//! connected display other than the system default. Every transition of that
//! derived value (present/absent or identity change) is forwarded to the
//! session controller, which drives the surface router from it.

use crate::errors::MirrorCamError;
use crate::platform::DisplayDiscovery;
use crate::session::CameraController;
use crate::types::DisplayDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Display event types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    Connected(DisplayDescriptor),
    Disconnected(u32), // Display ID
}

/// First connected display whose id differs from `default_display_id`.
pub fn external_display(
    displays: &[DisplayDescriptor],
    default_display_id: u32,
) -> Option<DisplayDescriptor> {
    displays
        .iter()
        .find(|display| display.id != default_display_id)
        .cloned()
}

/// Monitor for connected output displays
pub struct DisplayMonitor {
    default_display_id: u32,
    active_displays: Arc<RwLock<HashMap<u32, DisplayDescriptor>>>,
    external: watch::Sender<Option<DisplayDescriptor>>,
    event_sender: mpsc::UnboundedSender<DisplayEvent>,
    event_receiver: Arc<RwLock<mpsc::UnboundedReceiver<DisplayEvent>>>,
    is_monitoring: Arc<RwLock<bool>>,
    task: Mutex<Option<JoinHandle<()>>>,
    stop_listening: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl DisplayMonitor {
    pub fn new(default_display_id: u32) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (external, _) = watch::channel(None);

        Self {
            default_display_id,
            active_displays: Arc::new(RwLock::new(HashMap::new())),
            external,
            event_sender: tx,
            event_receiver: Arc::new(RwLock::new(rx)),
            is_monitoring: Arc::new(RwLock::new(false)),
            task: Mutex::new(None),
            stop_listening: Mutex::new(None),
        }
    }

    /// Start listening to `discovery` and forwarding external display
    /// transitions to `controller`.
    pub async fn start_monitoring<D: DisplayDiscovery>(
        &self,
        discovery: Arc<D>,
        controller: CameraController,
    ) -> Result<(), MirrorCamError> {
        let mut is_monitoring = self.is_monitoring.write().await;
        if *is_monitoring {
            return Ok(());
        }

        log::info!(
            "Starting display monitoring (default display {})",
            self.default_display_id
        );

        discovery.start_listening();
        let mut displays = discovery.connected_displays();

        let active_displays = self.active_displays.clone();
        let event_sender = self.event_sender.clone();
        let external = self.external.clone();
        let default_display_id = self.default_display_id;

        let task = tokio::spawn(async move {
            loop {
                let current = displays.borrow_and_update().clone();
                update_active_displays(&active_displays, &event_sender, &current).await;

                let next = external_display(&current, default_display_id);
                let changed = external.send_if_modified(|last| {
                    let same = last.as_ref().map(|d| d.id) == next.as_ref().map(|d| d.id);
                    if same {
                        false
                    } else {
                        *last = next.clone();
                        true
                    }
                });
                if changed {
                    match &next {
                        Some(display) => {
                            log::info!("External display present: {} ({})", display.name, display.id)
                        }
                        None => log::info!("External display gone"),
                    }
                    controller.external_display_changed(next);
                }

                if displays.changed().await.is_err() {
                    log::debug!("Display discovery closed");
                    break;
                }
            }
        });

        *self.task.lock().await = Some(task);
        let stopper = discovery.clone();
        *self.stop_listening.lock().await = Some(Box::new(move || stopper.stop_listening()));
        *is_monitoring = true;
        Ok(())
    }

    /// Stop monitoring. The last derived external display stays readable.
    pub async fn stop_monitoring(&self) -> Result<(), MirrorCamError> {
        let mut is_monitoring = self.is_monitoring.write().await;
        if !*is_monitoring {
            return Ok(());
        }

        log::info!("Stopping display monitoring");
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
        }
        if let Some(stop) = self.stop_listening.lock().await.take() {
            stop();
        }
        *is_monitoring = false;
        Ok(())
    }

    pub async fn is_monitoring(&self) -> bool {
        *self.is_monitoring.read().await
    }

    /// Get next display event (non-blocking)
    pub async fn poll_event(&self) -> Option<DisplayEvent> {
        let mut rx = self.event_receiver.write().await;
        rx.try_recv().ok()
    }

    /// Wait for next display event
    pub async fn wait_for_event(&self) -> Option<DisplayEvent> {
        let mut rx = self.event_receiver.write().await;
        rx.recv().await
    }

    /// Currently connected displays, ordered by id
    pub async fn get_active_displays(&self) -> Vec<DisplayDescriptor> {
        let displays = self.active_displays.read().await;
        let mut list: Vec<DisplayDescriptor> = displays.values().cloned().collect();
        list.sort_by_key(|d| d.id);
        list
    }

    /// Last derived external display state
    pub fn external_display(&self) -> Option<DisplayDescriptor> {
        self.external.borrow().clone()
    }

    pub fn watch_external_display(&self) -> watch::Receiver<Option<DisplayDescriptor>> {
        self.external.subscribe()
    }
}

impl Drop for DisplayMonitor {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.try_lock() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
    }
}

async fn update_active_displays(
    active_displays: &RwLock<HashMap<u32, DisplayDescriptor>>,
    event_sender: &mpsc::UnboundedSender<DisplayEvent>,
    new_displays: &[DisplayDescriptor],
) {
    let mut active = active_displays.write().await;
    let old_ids: Vec<u32> = active.keys().copied().collect();
    let new_ids: Vec<u32> = new_displays.iter().map(|d| d.id).collect();

    for old_id in &old_ids {
        if !new_ids.contains(old_id) {
            log::info!("Display disconnected: {}", old_id);
            let _ = event_sender.send(DisplayEvent::Disconnected(*old_id));
        }
    }

    for display in new_displays {
        if !old_ids.contains(&display.id) {
            log::info!("Display connected: {} ({})", display.name, display.id);
            let _ = event_sender.send(DisplayEvent::Connected(display.clone()));
        }
        active.insert(display.id, display.clone());
    }

    active.retain(|id, _| new_ids.contains(id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ControllerOptions;
    use crate::testing::{SimulatedDisplays, SimulatedProvider};
    use std::time::Duration;

    fn builtin() -> DisplayDescriptor {
        DisplayDescriptor::new(0, "Built-in screen")
    }

    #[test]
    fn test_external_display_skips_default() {
        let hdmi = DisplayDescriptor::new(2, "HDMI");
        assert_eq!(external_display(&[builtin()], 0), None);
        assert_eq!(external_display(&[builtin(), hdmi.clone()], 0), Some(hdmi.clone()));
        assert_eq!(external_display(&[hdmi.clone(), builtin()], 0), Some(hdmi));
        assert_eq!(external_display(&[], 0), None);
    }

    #[tokio::test]
    async fn test_events_follow_display_set() {
        let displays = Arc::new(SimulatedDisplays::new(builtin()));
        let controller =
            CameraController::spawn(SimulatedProvider::new(), ControllerOptions::default());
        let monitor = DisplayMonitor::new(0);
        let mut external = monitor.watch_external_display();

        monitor
            .start_monitoring(displays.clone(), controller.clone())
            .await
            .unwrap();
        assert!(displays.is_listening());
        assert_eq!(
            monitor.wait_for_event().await,
            Some(DisplayEvent::Connected(builtin()))
        );

        displays.connect(DisplayDescriptor::new(3, "Projector"));
        tokio::time::timeout(Duration::from_secs(1), external.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(monitor.external_display().map(|d| d.id), Some(3));
        assert_eq!(
            monitor.wait_for_event().await,
            Some(DisplayEvent::Connected(DisplayDescriptor::new(3, "Projector")))
        );

        displays.disconnect(3);
        tokio::time::timeout(Duration::from_secs(1), external.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(monitor.external_display(), None);
        assert_eq!(monitor.wait_for_event().await, Some(DisplayEvent::Disconnected(3)));
        assert_eq!(monitor.get_active_displays().await, vec![builtin()]);

        monitor.stop_monitoring().await.unwrap();
        assert!(!monitor.is_monitoring().await);
        assert!(!displays.is_listening());
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let displays = Arc::new(SimulatedDisplays::new(builtin()));
        let controller =
            CameraController::spawn(SimulatedProvider::new(), ControllerOptions::default());
        let monitor = DisplayMonitor::new(0);
        monitor
            .start_monitoring(displays.clone(), controller.clone())
            .await
            .unwrap();
        monitor
            .start_monitoring(displays, controller.clone())
            .await
            .unwrap();
        assert!(monitor.is_monitoring().await);
        monitor.stop_monitoring().await.unwrap();
        monitor.stop_monitoring().await.unwrap();
        controller.shutdown().await;
    }
}
