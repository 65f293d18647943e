//! [`HostDocument`] over the page's JavaScript globals.
//!
//! Response flags reach the page only for events handled while its callback is
//! still running. An event the page raises during a render is queued and
//! handled once the running drain gets to it, after that callback has already
//! returned, so prevent-default and stop-propagation from its handlers are
//! lost. The page sees the record length still set when it reads the flags of
//! such an event.

use js_sys::Function;
use js_sys::Reflect;
use js_sys::Uint8Array;
use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;
use vg_core::RenderError;
use vg_core::RenderResult;
use vg_event::EVENT_HEADER_BYTES;
use vg_event::EventBuffer;
use vg_instr::BatchSink;
use vg_renderer::HostDocument;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::closure::Closure;
use web_sys::Window;

const RENDER_FN: &str = "vgRender";
const SET_HANDLER_FN: &str = "vgSetEventHandlerAndBuffer";

pub(crate) type WakeSlot = Rc<RefCell<Option<Box<dyn FnMut()>>>>;

pub struct JsHost {
    window: Window,
    render_fn: Function,
    shared: Uint8Array,
    signals: Rc<Cell<u32>>,
    wake: WakeSlot,
    _handler: Closure<dyn FnMut()>,
}

impl JsHost {
    /// Looks up the page globals and registers the event callback together with
    /// a shared buffer of `event_buffer_bytes`.
    pub fn new(event_buffer_bytes: usize) -> RenderResult<Self> {
        let window = web_sys::window().ok_or_else(|| {
            RenderError::new("host.unavailable", "no browser window in this context")
        })?;
        let render_fn = global_fn(&window, RENDER_FN)?;
        let set_handler = global_fn(&window, SET_HANDLER_FN)?;

        let len = u32::try_from(event_buffer_bytes).map_err(|_| {
            RenderError::new(
                "config.buffer_too_large",
                "event buffer does not fit a typed array",
            )
        })?;
        let shared = Uint8Array::new_with_length(len);
        let signals = Rc::new(Cell::new(0_u32));
        let wake: WakeSlot = Rc::new(RefCell::new(None));

        let handler = {
            let signals = Rc::clone(&signals);
            let wake = Rc::clone(&wake);
            Closure::wrap(Box::new(move || {
                signals.set(signals.get().saturating_add(1));
                // a callback raised while already draining stays queued
                if let Ok(mut slot) = wake.try_borrow_mut() {
                    if let Some(hook) = slot.as_mut() {
                        hook();
                    }
                }
            }) as Box<dyn FnMut()>)
        };

        set_handler
            .call2(&JsValue::NULL, handler.as_ref(), &shared)
            .map_err(|error| js_error("host.register_failed", SET_HANDLER_FN, &error))?;
        log::debug!("registered event handler with a {event_buffer_bytes}-byte buffer");

        Ok(Self {
            window,
            render_fn,
            shared,
            signals,
            wake,
            _handler: handler,
        })
    }

    /// Event callbacks received but not yet consumed by `wait_event`.
    pub fn pending_signals(&self) -> u32 {
        self.signals.get()
    }

    pub(crate) fn wake_slot(&self) -> WakeSlot {
        Rc::clone(&self.wake)
    }
}

impl BatchSink for JsHost {
    fn execute(&mut self, batch: &[u8]) -> RenderResult<()> {
        self.render_fn
            .call1(&JsValue::NULL, &Uint8Array::from(batch))
            .map(|_| ())
            .map_err(|error| js_error("host.execute_failed", RENDER_FN, &error))
    }
}

impl HostDocument for JsHost {
    fn is_available(&self) -> bool {
        self.window.document().is_some()
    }

    /// Takes one queued signal. Returns false when none is queued; the next
    /// callback from the page resumes the loop.
    fn wait_event(&mut self, events: &mut EventBuffer) -> RenderResult<bool> {
        let pending = self.signals.get();
        if pending == 0 {
            return Ok(false);
        }
        self.signals.set(pending - 1);

        if self.shared.length() as usize != events.capacity() {
            return Err(RenderError::new(
                "host.event_buffer_mismatch",
                format!(
                    "shared event buffer holds {} bytes, renderer expects {}",
                    self.shared.length(),
                    events.capacity()
                ),
            ));
        }
        self.shared.copy_to(events.as_mut_slice());
        Ok(true)
    }

    fn event_complete(&mut self, events: &EventBuffer) -> RenderResult<()> {
        self.shared
            .subarray(0, EVENT_HEADER_BYTES as u32)
            .copy_from(&events.as_slice()[..EVENT_HEADER_BYTES]);
        Ok(())
    }
}

fn global_fn(window: &Window, name: &str) -> RenderResult<Function> {
    let value = Reflect::get(window.as_ref(), &JsValue::from_str(name))
        .map_err(|error| js_error("host.unavailable", name, &error))?;
    value.dyn_into::<Function>().map_err(|_| {
        RenderError::new(
            "host.unavailable",
            format!("`window.{name}` is not a function"),
        )
    })
}

fn js_error(code: &'static str, name: &str, error: &JsValue) -> RenderError {
    RenderError::new(code, format!("`{name}` threw: {error:?}"))
}
