//! Browser host for the vgdom renderer.
//!
//! The page script provides two globals:
//!
//! - `vgRender(batch: Uint8Array)` executes one flushed instruction batch.
//! - `vgSetEventHandlerAndBuffer(fn, buffer: Uint8Array)` stores the callback
//!   and the shared event buffer. For every DOM event the page writes a record
//!   into `buffer` and calls `fn()`; once it returns, byte 0 of `buffer` holds
//!   the response flags (bit 0 prevent default, bit 1 stop propagation).
//!
//! The browser cannot block, so [`mount`] renders once and then drives every
//! later pass from inside the event callback.

mod app;
mod host;

pub use app::BrowserApp;
pub use app::mount;
pub use host::JsHost;

/// Sets up panic reporting, plus console logging with `console-logging`.
/// Safe to call more than once.
pub fn install() {
    console_error_panic_hook::set_once();

    #[cfg(feature = "console-logging")]
    init_console_logger();
}

#[cfg(feature = "console-logging")]
fn init_console_logger() {
    if console_log::init_with_level(log::Level::Debug).is_err() {
        log::debug!("logger already installed");
    }
}
