//! Host-backed [`Renderer`] owning the instruction and event buffers.

use crate::Renderer;
use crate::visitor::Reconciler;
use vg_core::RenderError;
use vg_core::RenderResult;
use vg_core::RendererConfig;
use vg_event::EventBuffer;
use vg_event::EventDispatcher;
use vg_event::EventRouter;
use vg_event::RouteOutcome;
use vg_instr::BatchSink;
use vg_instr::InstructionList;
use vg_tree::BuildOut;

/// Host side of the render protocol.
///
/// `execute` receives every flushed instruction batch. `wait_event` blocks until
/// the host has written an event record into `events` and returns false once
/// the host is shutting down.
pub trait HostDocument: BatchSink {
    fn is_available(&self) -> bool;

    fn wait_event(&mut self, events: &mut EventBuffer) -> RenderResult<bool>;

    /// Called after handlers ran, with the response flags in `events`. Hosts
    /// that share memory with the page copy the header back here.
    fn event_complete(&mut self, _events: &EventBuffer) -> RenderResult<()> {
        Ok(())
    }
}

pub struct DomRenderer<H> {
    config: RendererConfig,
    instructions: InstructionList<H>,
    events: EventBuffer,
    router: EventRouter,
    passes: u64,
}

impl<H: HostDocument> DomRenderer<H> {
    pub fn new(config: RendererConfig, host: H) -> RenderResult<Self> {
        config.validate()?;
        let instructions = InstructionList::new(config.instruction_buffer_bytes, host)?;
        let events = EventBuffer::new(config.event_buffer_bytes)?;
        log::debug!(
            "renderer created: mount `{}`, instruction buffer {} bytes, event buffer {} bytes",
            config.mount_selector,
            config.instruction_buffer_bytes,
            config.event_buffer_bytes
        );

        Ok(Self {
            config,
            instructions,
            events,
            router: EventRouter::new(),
            passes: 0,
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        self.instructions.sink()
    }

    pub fn host_mut(&mut self) -> &mut H {
        self.instructions.sink_mut()
    }

    pub fn into_host(self) -> H {
        self.instructions.into_sink()
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Successful render passes so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    fn render_pass(&mut self, build_out: &BuildOut) -> RenderResult<()> {
        let mut reconciler =
            Reconciler::new(&mut self.instructions, build_out, &self.config.mount_selector);
        reconciler.visit_first()?;
        let table = reconciler.into_table();
        self.instructions.flush()?;
        self.router.install_table(table);
        Ok(())
    }
}

impl<H: HostDocument> Renderer for DomRenderer<H> {
    fn render(&mut self, build_out: &BuildOut) -> RenderResult<()> {
        if !self.host().is_available() {
            return Err(RenderError::new(
                "host.unavailable",
                "host document is not available for rendering",
            ));
        }

        match self.render_pass(build_out) {
            Ok(()) => {
                self.passes += 1;
                let stats = self.instructions.take_stats();
                log::debug!(
                    "render pass {} wrote {} instructions ({} bytes, {} flushes), {} handlers",
                    self.passes,
                    stats.instructions,
                    stats.bytes,
                    stats.flushes,
                    self.router.table().len()
                );
                Ok(())
            }
            Err(error) => {
                self.instructions.discard_pending();
                self.instructions.take_stats();
                // positions from the previous pass no longer describe the host
                self.router.clear();
                log::warn!("render pass aborted: {error}");
                Err(error)
            }
        }
    }

    fn event_wait(&mut self, dispatcher: &mut dyn EventDispatcher) -> RenderResult<bool> {
        if !self.host().is_available() {
            log::debug!("host unavailable, leaving event wait");
            return Ok(false);
        }

        if !self.instructions.sink_mut().wait_event(&mut self.events)? {
            return Ok(false);
        }

        let outcome = self.router.handle(&mut self.events, dispatcher);
        self.instructions.sink_mut().event_complete(&self.events)?;
        match outcome? {
            RouteOutcome::NoEvent => {}
            RouteOutcome::Unrouted => log::trace!("event had no registered handler"),
            RouteOutcome::Dispatched { handlers } => {
                log::trace!("event dispatched to {handlers} handlers");
            }
        }
        Ok(true)
    }
}
