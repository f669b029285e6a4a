//! Page surface: the log element and the two buttons

use std::cell::RefCell;
use std::rc::Rc;

use fwprov_core::{Affordances, ControlSurface, LogSink, MemorySurface, Stage};
use web_sys::{Element, HtmlButtonElement};

/// Log text area shared with esptool-js's terminal callbacks
pub type SharedLog = Rc<RefCell<DomLog>>;

/// Log element with carriage-return handling
///
/// The text is kept in a [`MemorySurface`] and the element's text content
/// is replaced on every write, so firmware output is never parsed as HTML.
pub struct DomLog {
    element: Element,
    text: MemorySurface,
}

impl DomLog {
    /// Wrap the log element
    pub fn new(element: Element) -> SharedLog {
        Rc::new(RefCell::new(Self {
            element,
            text: MemorySurface::new(),
        }))
    }

    fn render(&self) {
        self.element.set_text_content(Some(&self.text.text()));
        self.element.set_scroll_top(self.element.scroll_height());
    }
}

impl LogSink for DomLog {
    fn clear(&mut self) {
        self.text.clear();
        self.render();
    }

    fn write(&mut self, text: &str) {
        self.text.write(text);
        self.render();
    }
}

/// The page's log and controls
pub struct DomSurface {
    log: SharedLog,
    connect_button: HtmlButtonElement,
    flash_button: HtmlButtonElement,
}

impl DomSurface {
    /// Bind to the page elements
    pub fn new(
        log: SharedLog,
        connect_button: HtmlButtonElement,
        flash_button: HtmlButtonElement,
    ) -> Self {
        Self {
            log,
            connect_button,
            flash_button,
        }
    }

    /// The shared log
    pub fn log(&self) -> &SharedLog {
        &self.log
    }
}

impl LogSink for DomSurface {
    fn clear(&mut self) {
        self.log.borrow_mut().clear();
    }

    fn write(&mut self, text: &str) {
        self.log.borrow_mut().write(text);
    }
}

impl ControlSurface for DomSurface {
    fn apply(&mut self, affordances: &Affordances) {
        self.connect_button
            .set_text_content(Some(affordances.connect_label.text()));
        self.connect_button
            .set_disabled(!affordances.connect_enabled);
        self.flash_button.set_disabled(!affordances.flash_enabled);
    }

    fn stage_changed(&mut self, stage: Stage) {
        log::debug!("stage: {}", stage);
    }
}
