//! Headless-browser tests for the page binding.
//!
//! Run with: wasm-pack test --headless --chrome crates/vg-wasm

#![cfg(target_arch = "wasm32")]

use js_sys::Function;
use js_sys::Reflect;
use js_sys::Uint8Array;
use std::cell::Cell;
use std::rc::Rc;
use vg_core::RenderResult;
use vg_core::RendererConfig;
use vg_event::DomEvent;
use vg_event::EventBuffer;
use vg_event::EventDispatcher;
use vg_event::EventResponse;
use vg_renderer::HostDocument;
use vg_renderer::Producer;
use vg_tree::BuildOut;
use vg_tree::DomEventHandlerSpec;
use vg_tree::HandlerId;
use vg_tree::PositionId;
use vg_tree::VgTree;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

const EVENT_BUFFER_BYTES: usize = 256;

fn window() -> JsValue {
    web_sys::window()
        .map(JsValue::from)
        .unwrap_or_else(|| unreachable!())
}

fn global(name: &str) -> JsValue {
    Reflect::get(&window(), &JsValue::from_str(name)).unwrap_or_else(|_| unreachable!())
}

/// Installs page globals that record batch sizes and keep the handler.
fn install_page() {
    let render = Function::new_with_args("batch", "window.vgBatches.push(batch.length);");
    let set_handler = Function::new_with_args(
        "fn, buffer",
        "window.vgHandler = fn; window.vgBuffer = buffer;",
    );
    let win = window();
    let ok = Reflect::set(&win, &"vgBatches".into(), &js_sys::Array::new())
        .and_then(|_| Reflect::set(&win, &"vgRender".into(), &render))
        .and_then(|_| Reflect::set(&win, &"vgSetEventHandlerAndBuffer".into(), &set_handler));
    assert!(ok.is_ok());
}

fn batch_count() -> u32 {
    global("vgBatches")
        .dyn_into::<js_sys::Array>()
        .map(|batches| batches.length())
        .unwrap_or(0)
}

struct Counter {
    clicks: Rc<Cell<u32>>,
}

impl EventDispatcher for Counter {
    fn dispatch(&mut self, _handler: HandlerId, _event: &DomEvent) -> RenderResult<EventResponse> {
        self.clicks.set(self.clicks.get() + 1);
        Ok(EventResponse {
            prevent_default: true,
            stop_propagation: false,
        })
    }
}

impl Producer for Counter {
    fn build(&mut self) -> RenderResult<BuildOut> {
        let mut tree = VgTree::new();
        let root = tree.element("div");
        let button = tree.element("button");
        tree.append_child(root, button)?;
        tree.add_event_handler(button, DomEventHandlerSpec::new("click", HandlerId(1)))?;
        let label = tree.text(self.clicks.get().to_string());
        tree.append_child(button, label)?;
        Ok(BuildOut::new(tree, root))
    }
}

fn config() -> RendererConfig {
    RendererConfig {
        event_buffer_bytes: EVENT_BUFFER_BYTES,
        ..RendererConfig::default()
    }
}

#[wasm_bindgen_test]
fn install_is_idempotent() {
    vg_wasm::install();
    vg_wasm::install();
}

#[wasm_bindgen_test]
fn missing_globals_fail_as_unavailable() {
    let win = window();
    assert!(Reflect::delete_property(win.unchecked_ref(), &"vgRender".into()).is_ok());
    let result = vg_wasm::JsHost::new(EVENT_BUFFER_BYTES);
    assert!(result.is_err());
    if let Err(error) = result {
        assert_eq!(error.code, "host.unavailable");
    }
}

#[wasm_bindgen_test]
fn event_buffer_size_must_match_shared_buffer() {
    install_page();
    let mut host =
        vg_wasm::JsHost::new(EVENT_BUFFER_BYTES).unwrap_or_else(|_| unreachable!());
    let handler = global("vgHandler")
        .dyn_into::<Function>()
        .unwrap_or_else(|_| unreachable!());
    assert!(handler.call0(&JsValue::NULL).is_ok());
    assert_eq!(host.pending_signals(), 1);

    let mut events =
        EventBuffer::new(EVENT_BUFFER_BYTES * 2).unwrap_or_else(|_| unreachable!());
    let result = host.wait_event(&mut events);
    assert!(result.is_err());
    if let Err(error) = result {
        assert_eq!(error.code, "host.event_buffer_mismatch");
    }
}

#[wasm_bindgen_test]
fn click_rerenders_and_reports_response() {
    install_page();
    let clicks = Rc::new(Cell::new(0));
    let app = vg_wasm::mount(
        config(),
        Counter {
            clicks: Rc::clone(&clicks),
        },
    )
    .unwrap_or_else(|_| unreachable!());
    assert_eq!(app.passes(), Some(1));
    let batches_after_mount = batch_count();
    assert!(batches_after_mount >= 1);

    let mut record = EventBuffer::new(EVENT_BUFFER_BYTES).unwrap_or_else(|_| unreachable!());
    assert!(
        record
            .write_event(&DomEvent::new(PositionId::root().child(1), "click"))
            .is_ok()
    );
    let shared = global("vgBuffer")
        .dyn_into::<Uint8Array>()
        .unwrap_or_else(|_| unreachable!());
    shared.copy_from(record.as_slice());

    let handler = global("vgHandler")
        .dyn_into::<Function>()
        .unwrap_or_else(|_| unreachable!());
    assert!(handler.call0(&JsValue::NULL).is_ok());

    assert_eq!(clicks.get(), 1);
    assert_eq!(app.passes(), Some(2));
    assert!(batch_count() > batches_after_mount);
    assert_eq!(shared.get_index(0) & 1, 1);

    assert!(app.unmount().is_some());
}
