//! Event-driven render loop for the browser.

use crate::host::JsHost;
use crate::host::WakeSlot;
use std::cell::RefCell;
use std::rc::Rc;
use vg_core::RenderResult;
use vg_core::RendererConfig;
use vg_renderer::DomRenderer;
use vg_renderer::Producer;
use vg_renderer::Renderer;
use wasm_bindgen::JsValue;

struct App<P> {
    renderer: DomRenderer<JsHost>,
    producer: P,
}

impl<P: Producer> App<P> {
    /// Handles every queued event, re-rendering after each one.
    fn drain(&mut self) -> RenderResult<u64> {
        let mut passes = 0_u64;
        while self.renderer.event_wait(&mut self.producer)? {
            let build_out = self.producer.build()?;
            self.renderer.render(&build_out)?;
            passes += 1;
        }
        Ok(passes)
    }
}

/// A mounted producer. The event callback keeps it alive until
/// [`BrowserApp::unmount`] is called.
pub struct BrowserApp<P> {
    state: Rc<RefCell<App<P>>>,
    wake: WakeSlot,
}

impl<P> BrowserApp<P> {
    /// Render passes completed so far, or `None` while a pass is running.
    pub fn passes(&self) -> Option<u64> {
        self.state
            .try_borrow()
            .ok()
            .map(|app| app.renderer.passes())
    }

    /// Stops reacting to page events and hands the producer back.
    pub fn unmount(self) -> Option<P> {
        self.wake.borrow_mut().take();
        Rc::try_unwrap(self.state)
            .ok()
            .map(|state| state.into_inner().producer)
    }
}

/// Renders `producer` once and re-renders after every event the page reports.
pub fn mount<P: Producer + 'static>(
    config: RendererConfig,
    mut producer: P,
) -> RenderResult<BrowserApp<P>> {
    let host = JsHost::new(config.event_buffer_bytes)?;
    let wake = host.wake_slot();
    let mut renderer = DomRenderer::new(config, host)?;
    let build_out = producer.build()?;
    renderer.render(&build_out)?;

    let state = Rc::new(RefCell::new(App { renderer, producer }));
    let drain_state = Rc::clone(&state);
    *wake.borrow_mut() = Some(Box::new(move || {
        let Ok(mut app) = drain_state.try_borrow_mut() else {
            return;
        };
        match app.drain() {
            Ok(passes) => log::trace!("event callback rendered {passes} passes"),
            Err(error) => {
                log::error!("render loop failed: {error}");
                web_sys::console::error_1(&JsValue::from_str(&error.to_string()));
            }
        }
    }));

    Ok(BrowserApp { state, wake })
}
