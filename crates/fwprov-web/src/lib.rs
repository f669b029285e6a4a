//! fwprov-web - Browser front-end for fwprov
//!
//! Binds the provisioning session to a static page: a chip family
//! `<select>`, a connect button, a flash button and a log element. The
//! device is reached through WebSerial and flashed with esptool-js; the
//! bundle is fetched relative to the page URL.

#![warn(missing_docs)]
#![allow(async_fn_in_trait)]

mod app;
mod backend;
mod bindings;
mod surface;

pub use app::{ProvisionerApp, CHIP_SELECT_ID, CONNECT_BUTTON_ID, FLASH_BUTTON_ID, LOG_ID};
pub use backend::{WebFlasher, WebSerialBackend, WebTransport};
pub use surface::{DomLog, DomSurface, SharedLog};

use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

/// Initialize the web application
///
/// This is the entry point called when the module is loaded.
#[wasm_bindgen(start)]
pub fn main() -> Result<(), JsValue> {
    // Set up panic hook for better error messages
    console_error_panic_hook::set_once();

    if let Err(e) = console_log::init_with_level(log::Level::Debug) {
        web_sys::console::error_1(&format!("Failed to initialize logger: {}", e).into());
    }

    log::info!("fwprov-web starting...");

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let href = window.location().href()?;
    let page_url = url::Url::parse(&href)
        .map_err(|e| JsValue::from_str(&format!("invalid page URL {}: {}", href, e)))?;

    let app = Rc::new(RefCell::new(ProvisionerApp::new(&document, page_url)?));
    app::install(app, &document)?;
    Ok(())
}
