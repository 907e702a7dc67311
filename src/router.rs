//! Surface router: which sink the single logical preview output feeds.
//!
//! The router owns the attachment state. The UI never attaches a sink itself;
//! it reports display transitions and surface readiness, and the router walks
//! the external route through `NoExternal -> AwaitingSurface -> Attached`.
//! Handoffs always detach the current writer before attaching the next one.

use crate::assert_invariant;
use crate::errors::{ControlOp, Fault, HardwareError};
use crate::platform::PreviewOutput;
use crate::sink::SinkHandle;
use crate::types::DisplayDescriptor;
use serde::Serialize;

/// The sink currently receiving frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveSink {
    None,
    Primary(SinkHandle),
    External(SinkHandle),
}

impl ActiveSink {
    pub fn role(&self) -> SinkRole {
        match self {
            ActiveSink::None => SinkRole::None,
            ActiveSink::Primary(_) => SinkRole::Primary,
            ActiveSink::External(_) => SinkRole::External,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SinkRole {
    None,
    Primary,
    External,
}

/// Progress of the external display handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalRoute {
    NoExternal,
    /// Display present, presentation surface not created yet.
    AwaitingSurface { display: DisplayDescriptor },
    Attached {
        display: DisplayDescriptor,
        sink: SinkHandle,
    },
}

impl ExternalRoute {
    pub fn display(&self) -> Option<&DisplayDescriptor> {
        match self {
            ExternalRoute::NoExternal => None,
            ExternalRoute::AwaitingSurface { display } | ExternalRoute::Attached { display, .. } => {
                Some(display)
            }
        }
    }
}

/// Published, read-only view of the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterState {
    pub external_display: Option<DisplayDescriptor>,
    pub external_attached: bool,
    pub active: SinkRole,
}

impl Default for RouterState {
    fn default() -> Self {
        Self {
            external_display: None,
            external_attached: false,
            active: SinkRole::None,
        }
    }
}

#[derive(Debug)]
pub struct SurfaceRouter {
    primary: Option<SinkHandle>,
    active: ActiveSink,
    route: ExternalRoute,
}

impl Default for SurfaceRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl SurfaceRouter {
    pub fn new() -> Self {
        Self {
            primary: None,
            active: ActiveSink::None,
            route: ExternalRoute::NoExternal,
        }
    }

    pub fn active(&self) -> &ActiveSink {
        &self.active
    }

    pub fn route(&self) -> &ExternalRoute {
        &self.route
    }

    pub fn primary(&self) -> Option<&SinkHandle> {
        self.primary.as_ref()
    }

    pub fn state(&self) -> RouterState {
        RouterState {
            external_display: self.route.display().cloned(),
            external_attached: matches!(self.route, ExternalRoute::Attached { .. }),
            active: self.active.role(),
        }
    }

    pub fn remember_primary(&mut self, sink: SinkHandle) {
        self.primary = Some(sink);
    }

    /// Sink a fresh session should bind to: the external sink while one is
    /// attached, the primary sink otherwise.
    pub fn bind_target(&self) -> Option<SinkHandle> {
        match &self.route {
            ExternalRoute::Attached { sink, .. } => Some(sink.clone()),
            _ => self.primary.clone(),
        }
    }

    /// Records that a bind attached `sink` to the new session's output.
    pub fn on_session_bound(&mut self, sink: &SinkHandle) {
        self.active = match &self.route {
            ExternalRoute::Attached { sink: external, .. } if external == sink => {
                ActiveSink::External(sink.clone())
            }
            _ => ActiveSink::Primary(sink.clone()),
        };
    }

    pub fn on_session_unbound(&mut self) {
        self.active = ActiveSink::None;
    }

    /// Detach the primary sink, then attach `sink`. If the external attach
    /// is refused the remembered primary sink is reattached.
    pub fn attach_external<O: PreviewOutput + ?Sized>(
        &mut self,
        output: &mut O,
        sink: &SinkHandle,
    ) -> Vec<Fault> {
        let mut faults = Vec::new();
        if let Err(fault) = self.set_main_sink(output, None) {
            faults.push(fault);
        }
        assert_invariant!(
            !matches!(self.active, ActiveSink::Primary(_)),
            "Primary sink detached before external attach",
            "SurfaceRouter::attach_external"
        );
        if let Err(fault) = self.set_external_sink(output, Some(sink)) {
            faults.push(fault);
            match self.primary.clone() {
                Some(primary) => {
                    log::warn!(
                        "External sink {} refused; falling back to primary sink {}",
                        sink.id(),
                        primary.id()
                    );
                    if let Err(fault) = self.set_main_sink(output, Some(&primary)) {
                        faults.push(fault);
                    }
                }
                None => {
                    log::warn!("External sink {} refused and no primary sink remembered", sink.id());
                }
            }
        }
        faults
    }

    /// Detach the external sink, then reattach the remembered primary sink.
    /// Without a remembered primary the output stays unattached.
    pub fn detach_external<O: PreviewOutput + ?Sized>(&mut self, output: &mut O) -> Vec<Fault> {
        let mut faults = Vec::new();
        if let Err(fault) = self.set_external_sink(output, None) {
            faults.push(fault);
        }
        assert_invariant!(
            !matches!(self.active, ActiveSink::External(_)),
            "External sink detached before primary reattach",
            "SurfaceRouter::detach_external"
        );
        match self.primary.clone() {
            Some(primary) => {
                if let Err(fault) = self.set_main_sink(output, Some(&primary)) {
                    faults.push(fault);
                }
            }
            None => {
                log::warn!("No primary sink remembered; preview output left unattached");
            }
        }
        faults
    }

    pub fn set_main_sink<O: PreviewOutput + ?Sized>(
        &mut self,
        output: &mut O,
        sink: Option<&SinkHandle>,
    ) -> Result<(), Fault> {
        let result = output.set_main_sink(sink);
        self.record(result, sink, ControlOp::SetMainSink, ActiveSink::Primary)
    }

    pub fn set_external_sink<O: PreviewOutput + ?Sized>(
        &mut self,
        output: &mut O,
        sink: Option<&SinkHandle>,
    ) -> Result<(), Fault> {
        let result = output.set_external_sink(sink);
        self.record(result, sink, ControlOp::SetExternalSink, ActiveSink::External)
    }

    fn record(
        &mut self,
        result: Result<(), HardwareError>,
        sink: Option<&SinkHandle>,
        operation: ControlOp,
        attached: fn(SinkHandle) -> ActiveSink,
    ) -> Result<(), Fault> {
        match (result, sink) {
            (Ok(()), Some(sink)) => {
                log::debug!("{}: attached sink {}", operation, sink.id());
                self.active = attached(sink.clone());
                Ok(())
            }
            (Ok(()), None) => {
                self.active = ActiveSink::None;
                Ok(())
            }
            (Err(err), sink) => {
                if sink.is_none() {
                    // A rejected detach still leaves the output without this writer.
                    self.active = ActiveSink::None;
                }
                match &err {
                    HardwareError::SinkNotReady(_) => log::warn!("{}: {}", operation, err),
                    _ => log::error!("{}: {}", operation, err),
                }
                Err(Fault::control(operation, err.to_string()))
            }
        }
    }

    /// React to a change of the derived external display state. `output` is
    /// the bound session's preview output, if any.
    pub fn on_display_changed<O: PreviewOutput + ?Sized>(
        &mut self,
        output: Option<&mut O>,
        display: Option<DisplayDescriptor>,
    ) -> Vec<Fault> {
        let current_id = self.route.display().map(|d| d.id);
        if current_id == display.as_ref().map(|d| d.id) {
            return Vec::new();
        }

        let mut faults = Vec::new();
        if matches!(self.route, ExternalRoute::Attached { .. }) {
            if let Some(output) = output {
                faults = self.detach_external(output);
            }
        }

        self.route = match display {
            Some(display) => {
                log::info!("Awaiting presentation surface on display {}", display.id);
                ExternalRoute::AwaitingSurface { display }
            }
            None => ExternalRoute::NoExternal,
        };
        faults
    }

    /// The presentation window on `display_id` has a ready surface.
    pub fn on_surface_ready<O: PreviewOutput + ?Sized>(
        &mut self,
        output: Option<&mut O>,
        display_id: u32,
        sink: SinkHandle,
    ) -> Vec<Fault> {
        let display = match &self.route {
            ExternalRoute::AwaitingSurface { display } if display.id == display_id => {
                display.clone()
            }
            other => {
                log::warn!(
                    "Ignoring surface for display {} while route is {:?}",
                    display_id,
                    other
                );
                return Vec::new();
            }
        };

        let faults = match output {
            Some(output) => {
                let faults = self.attach_external(output, &sink);
                if !matches!(&self.active, ActiveSink::External(active) if *active == sink) {
                    // Stay in the handshake so a fresh surface can retry.
                    return faults;
                }
                faults
            }
            None => Vec::new(),
        };
        self.route = ExternalRoute::Attached { display, sink };
        faults
    }

    /// The presentation surface on `display_id` went away while the display
    /// itself is still connected.
    pub fn on_surface_lost<O: PreviewOutput + ?Sized>(
        &mut self,
        output: Option<&mut O>,
        display_id: u32,
    ) -> Vec<Fault> {
        let display = match &self.route {
            ExternalRoute::Attached { display, .. } if display.id == display_id => display.clone(),
            _ => return Vec::new(),
        };

        let faults = match output {
            Some(output) => self.detach_external(output),
            None => Vec::new(),
        };
        self.route = ExternalRoute::AwaitingSurface { display };
        faults
    }
}
