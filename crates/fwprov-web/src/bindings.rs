//! JavaScript bindings: WebSerial and esptool-js
//!
//! WebSerial is not in stable web-sys yet, and esptool-js is an npm module
//! resolved by the bundler.

use wasm_bindgen::prelude::*;

// WebSerial API bindings
#[wasm_bindgen]
extern "C" {
    /// Navigator.serial
    #[wasm_bindgen(js_namespace = navigator, js_name = serial)]
    pub static SERIAL: Serial;

    /// Serial interface
    pub type Serial;

    /// Show the port chooser; rejects if the user cancels
    #[wasm_bindgen(method, catch, js_name = requestPort)]
    pub async fn request_port(this: &Serial, options: &JsValue) -> Result<JsValue, JsValue>;

    /// SerialPort interface
    pub type SerialPort;
}

// esptool-js
#[wasm_bindgen(module = "esptool-js")]
extern "C" {
    /// esptool-js `Transport` over a WebSerial port
    #[wasm_bindgen(js_name = Transport)]
    pub type EspTransport;

    #[wasm_bindgen(constructor, catch, js_class = "Transport")]
    pub fn new(device: &SerialPort) -> Result<EspTransport, JsValue>;

    #[wasm_bindgen(method, catch, js_class = "Transport")]
    pub async fn disconnect(this: &EspTransport) -> Result<(), JsValue>;

    /// esptool-js `ESPLoader`
    #[wasm_bindgen(js_name = ESPLoader)]
    pub type EspLoader;

    #[wasm_bindgen(constructor, catch, js_class = "ESPLoader")]
    pub fn new(options: &JsValue) -> Result<EspLoader, JsValue>;

    /// Reset into the ROM loader, sync and detect the chip
    #[wasm_bindgen(method, catch, js_class = "ESPLoader")]
    pub async fn connect(this: &EspLoader) -> Result<(), JsValue>;

    /// Detected chip description object (has `CHIP_NAME`)
    #[wasm_bindgen(method, getter, js_class = "ESPLoader")]
    pub fn chip(this: &EspLoader) -> JsValue;

    #[wasm_bindgen(method, catch, js_class = "ESPLoader", js_name = writeFlash)]
    pub async fn write_flash(this: &EspLoader, options: &JsValue) -> Result<(), JsValue>;
}

/// Message of a JS error, or its debug rendering
pub fn js_error_message(e: &JsValue) -> String {
    js_sys::Reflect::get(e, &"message".into())
        .ok()
        .and_then(|m| m.as_string())
        .or_else(|| e.as_string())
        .unwrap_or_else(|| format!("{:?}", e))
}
