//! Session — navigator plus the currently mounted practice page.
//!
//! A page controller is created the first time it is requested while its
//! screen is showing and dropped on `back()`, so page data never outlives
//! a visit.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::debug;

use myteacher_core::types::{Page, PageSnapshot, Screen, SpeechStatus};

use crate::navigator::{AdLauncher, Navigator, Selection};
use crate::page::{PracticePage, Services};
use crate::word::WordTranslator;

/// A mounted page controller.
#[derive(Clone)]
pub enum Mounted {
    Audio(Arc<PracticePage>),
    Words(Arc<WordTranslator>),
}

impl Mounted {
    fn mount(page: Page, services: Services) -> Self {
        if page.is_word_translator() {
            Mounted::Words(Arc::new(WordTranslator::new(services)))
        } else {
            Mounted::Audio(Arc::new(PracticePage::new(page, services)))
        }
    }

    pub fn page(&self) -> Page {
        match self {
            Mounted::Audio(p) => p.page(),
            Mounted::Words(_) => Page::WordTranslator,
        }
    }

    pub fn snapshot(&self) -> PageSnapshot {
        match self {
            Mounted::Audio(p) => p.snapshot(),
            Mounted::Words(w) => w.snapshot(),
        }
    }

    fn close(&self) {
        match self {
            Mounted::Audio(p) => p.close(),
            Mounted::Words(w) => w.close(),
        }
    }
}

pub struct Session {
    navigator: Navigator,
    services: Services,
    mounted: Mutex<Option<Mounted>>,
}

impl Session {
    pub fn new(services: Services, launcher: Arc<dyn AdLauncher>, ad_url: impl Into<String>) -> Self {
        Self {
            navigator: Navigator::new(launcher, ad_url),
            services,
            mounted: Mutex::new(None),
        }
    }

    pub fn select(&self, page: Page) -> Selection {
        self.navigator.select(page)
    }

    /// Go home: cancel any countdown, unmount the page, and silence speech.
    pub fn back(&self) {
        let mut mounted = self.lock();
        self.navigator.back();
        if let Some(page) = mounted.take() {
            debug!("unmount {}", page.page());
            page.close();
        }
        drop(mounted);
        self.services.synth.cancel();
    }

    pub fn screen(&self) -> Screen {
        self.navigator.screen()
    }

    pub fn subscribe(&self) -> watch::Receiver<Screen> {
        self.navigator.subscribe()
    }

    pub fn speech_status(&self) -> Option<SpeechStatus> {
        self.services.synth.status()
    }

    pub fn ad_shown(&self) -> bool {
        self.navigator.ad_shown()
    }

    /// The controller for the visible page, mounting it if needed. `None`
    /// on the home screen and during the countdown.
    pub fn page(&self) -> Option<Mounted> {
        // Lock before reading the screen so a concurrent back() cannot
        // slip in between.
        let mut mounted = self.lock();
        let visible = self.navigator.visible_page()?;
        match mounted.as_ref() {
            Some(m) if m.page() == visible => Some(m.clone()),
            _ => {
                debug!("mount {visible}");
                let m = Mounted::mount(visible, self.services.clone());
                if let Some(old) = mounted.replace(m.clone()) {
                    old.close();
                }
                Some(m)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Mounted>> {
        self.mounted.lock().unwrap_or_else(|e| e.into_inner())
    }
}
