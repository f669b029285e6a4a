//! Device backend over WebSerial and esptool-js

use futures::channel::mpsc;
use futures::{pin_mut, select, FutureExt, StreamExt};
use js_sys::{Array, Object, Reflect};
use wasm_bindgen::prelude::*;

use fwprov_core::service::{
    BackendError, DeviceBackend, FlashProgress, FlashingService, Transport, WriteFlashRequest,
};
use fwprov_core::LogSink;

use crate::bindings::{js_error_message, EspLoader, EspTransport, SerialPort, SERIAL};
use crate::surface::SharedLog;

fn backend_error(context: &str, e: &JsValue) -> BackendError {
    BackendError::new(format!("{}: {}", context, js_error_message(e)))
}

fn set(target: &Object, key: &str, value: &JsValue) -> Result<(), BackendError> {
    Reflect::set(target, &key.into(), value)
        .map(|_| ())
        .map_err(|e| backend_error(&format!("failed to set {}", key), &e))
}

/// esptool-js transport over a selected port
pub struct WebTransport {
    inner: EspTransport,
    open: bool,
}

impl Transport for WebTransport {
    async fn disconnect(&mut self) -> Result<(), BackendError> {
        self.open = false;
        self.inner
            .disconnect()
            .await
            .map_err(|e| backend_error("failed to close port", &e))?;
        log::info!("WebSerial port closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.open
    }
}

/// Terminal object handed to esptool-js, writing into the page log
struct LoaderTerminal {
    object: Object,
    _clean: Closure<dyn FnMut()>,
    _write_line: Closure<dyn FnMut(String)>,
    _write: Closure<dyn FnMut(String)>,
}

impl LoaderTerminal {
    fn new(log: &SharedLog) -> Result<Self, BackendError> {
        let clean = {
            let log = log.clone();
            Closure::<dyn FnMut()>::new(move || log.borrow_mut().clear())
        };
        let write_line = {
            let log = log.clone();
            Closure::<dyn FnMut(String)>::new(move |data: String| {
                log.borrow_mut().write_line(&data)
            })
        };
        let write = {
            let log = log.clone();
            Closure::<dyn FnMut(String)>::new(move |data: String| log.borrow_mut().write(&data))
        };

        let object = Object::new();
        set(&object, "clean", clean.as_ref())?;
        set(&object, "writeLine", write_line.as_ref())?;
        set(&object, "write", write.as_ref())?;

        Ok(Self {
            object,
            _clean: clean,
            _write_line: write_line,
            _write: write,
        })
    }
}

/// esptool-js loader bound to a transport
pub struct WebFlasher {
    loader: EspLoader,
    chip: Option<String>,
    _terminal: LoaderTerminal,
}

impl FlashingService for WebFlasher {
    async fn connect(&mut self) -> Result<(), BackendError> {
        self.loader
            .connect()
            .await
            .map_err(|e| BackendError::new(js_error_message(&e)))?;
        self.chip = Reflect::get(&self.loader.chip(), &"CHIP_NAME".into())
            .ok()
            .and_then(|name| name.as_string());
        Ok(())
    }

    fn chip_name(&self) -> Option<String> {
        self.chip.clone()
    }

    async fn write_flash(
        &mut self,
        request: WriteFlashRequest<'_>,
        progress: &mut dyn FlashProgress,
    ) -> Result<(), BackendError> {
        let files = Array::new();
        let mut offsets = Vec::with_capacity(request.plan.len());
        let mut offset = 0;
        for entry in request.plan.entries() {
            let file = Object::new();
            set(&file, "data", &JsValue::from_str(entry.payload.as_str()))?;
            set(&file, "address", &JsValue::from(entry.address))?;
            files.push(&file);
            offsets.push(offset);
            offset += entry.payload.byte_len();
        }
        let total = offset;

        // esptool-js reports per-file progress; the session wants it cumulative
        let (tx, mut rx) = mpsc::unbounded::<usize>();
        let on_progress = Closure::<dyn FnMut(u32, u32, u32)>::new(
            move |index: u32, written: u32, _file_total: u32| {
                let base = offsets.get(index as usize).copied().unwrap_or(0);
                let _ = tx.unbounded_send(base + written as usize);
            },
        );

        let options = Object::new();
        set(&options, "fileArray", &files)?;
        set(&options, "flashSize", &request.flash_size.as_str().into())?;
        set(&options, "flashMode", &"keep".into())?;
        set(&options, "flashFreq", &"keep".into())?;
        set(&options, "eraseAll", &request.erase_all.into())?;
        set(&options, "compress", &request.compress.into())?;
        set(&options, "reportProgress", on_progress.as_ref())?;

        let write = self.loader.write_flash(&options).fuse();
        pin_mut!(write);
        let result = loop {
            select! {
                written = rx.next() => {
                    if let Some(written) = written {
                        progress.update(written.min(total), total);
                    }
                }
                result = write => break result,
            }
        };
        while let Ok(Some(written)) = rx.try_next() {
            progress.update(written.min(total), total);
        }

        result.map_err(|e| BackendError::new(js_error_message(&e)))
    }
}

/// Device backend using the browser's serial port chooser
pub struct WebSerialBackend {
    log: SharedLog,
}

impl WebSerialBackend {
    /// Create a backend; esptool-js output goes to `log`
    pub fn new(log: SharedLog) -> Self {
        Self { log }
    }
}

impl DeviceBackend for WebSerialBackend {
    type Device = SerialPort;
    type Transport = WebTransport;
    type Flasher = WebFlasher;

    async fn request_device(&mut self) -> Result<SerialPort, BackendError> {
        let port = SERIAL
            .request_port(&Object::new())
            .await
            .map_err(|e| BackendError::new(js_error_message(&e)))?;
        Ok(port.unchecked_into())
    }

    fn open_transport(&mut self, device: &SerialPort) -> Result<WebTransport, BackendError> {
        let inner =
            EspTransport::new(device).map_err(|e| backend_error("failed to open transport", &e))?;
        Ok(WebTransport { inner, open: true })
    }

    fn create_flasher(
        &mut self,
        transport: &WebTransport,
        baud_rate: u32,
    ) -> Result<WebFlasher, BackendError> {
        let terminal = LoaderTerminal::new(&self.log)?;
        let options = Object::new();
        set(&options, "transport", &transport.inner)?;
        set(&options, "baudrate", &JsValue::from(baud_rate))?;
        set(&options, "terminal", &terminal.object)?;

        let loader = EspLoader::new(&options)
            .map_err(|e| backend_error("failed to create loader", &e))?;
        log::info!("ESPLoader created at {} baud", baud_rate);
        Ok(WebFlasher {
            loader,
            chip: None,
            _terminal: terminal,
        })
    }
}
