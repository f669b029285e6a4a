//! Page wiring: button handlers driving the provisioning session

use std::cell::RefCell;
use std::rc::Rc;

use fwprov_core::{Affordances, ChipFamily, ControlSurface, ProvisionConfig, ProvisioningSession};
use fwprov_http::HttpBundleSource;
use fwprov_zip::ZipLoader;
use wasm_bindgen::prelude::*;
use web_sys::{Document, HtmlButtonElement, HtmlSelectElement};

use crate::backend::WebSerialBackend;
use crate::surface::{DomLog, DomSurface};

/// Element ids the page must provide
pub const CONNECT_BUTTON_ID: &str = "connectButton";
/// Flash button id
pub const FLASH_BUTTON_ID: &str = "flashButton";
/// Chip family `<select>` id
pub const CHIP_SELECT_ID: &str = "chip-select";
/// Log element id
pub const LOG_ID: &str = "log";

/// State behind the page's buttons
pub struct ProvisionerApp {
    session: ProvisioningSession<WebSerialBackend>,
    surface: DomSurface,
    chip_select: HtmlSelectElement,
    source: HttpBundleSource,
    loader: ZipLoader,
}

fn element<T: JsCast>(document: &Document, id: &str) -> Result<T, JsValue> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("element #{} not found", id)))?
        .dyn_into::<T>()
        .map_err(|_| JsValue::from_str(&format!("element #{} has the wrong type", id)))
}

impl ProvisionerApp {
    /// Bind to the page and reset the controls
    pub fn new(document: &Document, page_url: url::Url) -> Result<Self, JsValue> {
        let log = DomLog::new(
            document
                .get_element_by_id(LOG_ID)
                .ok_or_else(|| JsValue::from_str("element #log not found"))?,
        );
        let mut surface = DomSurface::new(
            log.clone(),
            element(document, CONNECT_BUTTON_ID)?,
            element(document, FLASH_BUTTON_ID)?,
        );
        surface.apply(&Affordances::READY_TO_CONNECT);

        let backend = WebSerialBackend::new(log);
        Ok(Self {
            session: ProvisioningSession::new(backend, ProvisionConfig::default()),
            surface,
            chip_select: element(document, CHIP_SELECT_ID)?,
            source: HttpBundleSource::new().with_base(page_url),
            loader: ZipLoader::new(),
        })
    }

    fn selected_chip(&self) -> ChipFamily {
        let value = self.chip_select.value();
        value.parse().unwrap_or_else(|e| {
            log::warn!("{}; using {}", e, ChipFamily::default());
            ChipFamily::default()
        })
    }

    async fn on_connect(&mut self) {
        let chip = self.selected_chip();
        if let Err(e) = self.session.toggle_connect(chip, &mut self.surface).await {
            log::error!("{}", e);
        }
    }

    async fn on_flash(&mut self) {
        let Self {
            session,
            surface,
            source,
            loader,
            ..
        } = self;
        match session.flash(source, &*loader, surface).await {
            Ok(report) => log::info!("Flashed {} bytes", report.total_bytes),
            Err(e) => log::error!("{}", e),
        }
    }
}

/// Attach click handlers to the two buttons
///
/// A click that arrives while another operation holds the app is dropped.
pub fn install(app: Rc<RefCell<ProvisionerApp>>, document: &Document) -> Result<(), JsValue> {
    let connect_button: HtmlButtonElement = element(document, CONNECT_BUTTON_ID)?;
    let flash_button: HtmlButtonElement = element(document, FLASH_BUTTON_ID)?;

    let on_connect = {
        let app = app.clone();
        Closure::<dyn FnMut()>::new(move || {
            let app = app.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let Ok(mut app) = app.try_borrow_mut() else {
                    log::debug!("Busy, ignoring connect click");
                    return;
                };
                app.on_connect().await;
            });
        })
    };
    connect_button
        .add_event_listener_with_callback("click", on_connect.as_ref().unchecked_ref())?;
    // The handlers live as long as the page
    on_connect.forget();

    let on_flash = Closure::<dyn FnMut()>::new(move || {
        let app = app.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let Ok(mut app) = app.try_borrow_mut() else {
                log::debug!("Busy, ignoring flash click");
                return;
            };
            app.on_flash().await;
        });
    });
    flash_button.add_event_listener_with_callback("click", on_flash.as_ref().unchecked_ref())?;
    on_flash.forget();

    Ok(())
}
