//! Render pipeline from a virtual tree to host DOM instructions.

mod renderer;
mod structural;
mod visitor;

pub use renderer::DomRenderer;
pub use renderer::HostDocument;
pub use visitor::Reconciler;

use vg_core::RenderResult;
use vg_event::EventDispatcher;
use vg_tree::BuildOut;

/// Synchronizes a host document with successive render passes.
pub trait Renderer {
    fn render(&mut self, build_out: &BuildOut) -> RenderResult<()>;

    /// Blocks until an event has been handled. Returns false when the render
    /// loop should exit.
    fn event_wait(&mut self, dispatcher: &mut dyn EventDispatcher) -> RenderResult<bool>;
}

/// Upstream component system: builds one tree per pass and handles the events
/// routed back to it.
pub trait Producer: EventDispatcher {
    fn build(&mut self) -> RenderResult<BuildOut>;
}

/// Runs build, render and wait until the renderer reports the host is gone.
/// Returns the number of completed passes.
pub fn run_render_loop<R, P>(renderer: &mut R, producer: &mut P) -> RenderResult<u64>
where
    R: Renderer + ?Sized,
    P: Producer,
{
    let mut passes = 0_u64;
    loop {
        let build_out = producer.build()?;
        renderer.render(&build_out)?;
        passes += 1;

        if !renderer.event_wait(producer)? {
            log::debug!("render loop exiting after {passes} passes");
            return Ok(passes);
        }
    }
}
