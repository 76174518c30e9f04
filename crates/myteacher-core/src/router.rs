//! Screen router and ad-gate.
//!
//! ```text
//! Home ──select(p)──▶ Showing(p)                  (ad already shown)
//! Home ──select(p)──▶ Counting(5) ─tick─▶ … ─tick─▶ Showing(p)   (first time)
//! Showing(p) / Counting(n) ──back──▶ Home
//! ```
//!
//! The router is clock-free: whoever owns it calls [`Router::tick`] once per
//! elapsed second while [`Router::is_counting`] holds. `ad_shown` only ever
//! goes from false to true.

use crate::types::{Page, Screen, COUNTDOWN_SECS};

/// Result of [`Router::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Page is visible immediately.
    Direct(Page),
    /// First selection of the session: the caller opens the ad link and
    /// starts ticking. The page is revealed when the countdown runs out.
    Gated(Page),
    /// A countdown is already running; the selection was dropped.
    Ignored,
}

/// Result of [`Router::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// No countdown in progress.
    Idle,
    /// Seconds left after this tick.
    Counting(u32),
    /// Countdown finished; the pending page is now showing.
    Revealed(Option<Page>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Router {
    active_page: Option<Page>,
    ad_shown: bool,
    countdown: u32,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, page: Page) -> Selection {
        if self.countdown > 0 {
            return Selection::Ignored;
        }

        self.active_page = Some(page);
        if self.ad_shown {
            return Selection::Direct(page);
        }

        self.ad_shown = true;
        self.countdown = COUNTDOWN_SECS;
        Selection::Gated(page)
    }

    pub fn tick(&mut self) -> Tick {
        match self.countdown {
            0 => Tick::Idle,
            1 => {
                self.countdown = 0;
                Tick::Revealed(self.active_page)
            }
            n => {
                self.countdown = n - 1;
                Tick::Counting(self.countdown)
            }
        }
    }

    /// Return home. Any countdown is cleared; `ad_shown` is untouched.
    pub fn back(&mut self) {
        self.active_page = None;
        self.countdown = 0;
    }

    pub fn screen(&self) -> Screen {
        if self.countdown > 0 {
            return Screen::Counting {
                seconds: self.countdown,
                target: self.active_page,
            };
        }
        match self.active_page {
            Some(page) => Screen::Showing { page },
            None => Screen::Home,
        }
    }

    /// The page currently rendered, if any. `None` during a countdown.
    pub fn visible_page(&self) -> Option<Page> {
        match self.screen() {
            Screen::Showing { page } => Some(page),
            _ => None,
        }
    }

    pub fn ad_shown(&self) -> bool {
        self.ad_shown
    }

    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    pub fn is_counting(&self) -> bool {
        self.countdown > 0
    }
}
