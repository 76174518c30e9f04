//! Navigator — owns the screen [`Router`] and drives its countdown.
//!
//! The first practice-page selection of a session fires the ad link and
//! spawns a ticker task that calls [`Router::tick`] once per second. The
//! ticker is torn down on every exit path: it ends itself when the
//! countdown reaches zero, `back()` aborts it, and dropping the navigator
//! aborts it.
//!
//! Screen changes are published on a `watch` channel so front-ends can
//! follow the countdown without polling.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use myteacher_core::router::Selection;
use myteacher_core::router::{Router, Tick};
use myteacher_core::types::{Page, Screen};

const TICK: Duration = Duration::from_secs(1);

/// Opens the ad link. Must return immediately; the outcome is never
/// observed.
pub trait AdLauncher: Send + Sync {
    fn launch(&self, url: &str);
}

/// Opens the link in the system browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserLauncher;

impl AdLauncher for BrowserLauncher {
    fn launch(&self, url: &str) {
        if let Err(e) = open::that_detached(url) {
            debug!("ad link not opened: {e}");
        }
    }
}

pub struct Navigator {
    router: Arc<Mutex<Router>>,
    screen_tx: Arc<watch::Sender<Screen>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    launcher: Arc<dyn AdLauncher>,
    ad_url: String,
}

impl Navigator {
    pub fn new(launcher: Arc<dyn AdLauncher>, ad_url: impl Into<String>) -> Self {
        let (screen_tx, _) = watch::channel(Screen::Home);
        Self {
            router: Arc::new(Mutex::new(Router::new())),
            screen_tx: Arc::new(screen_tx),
            ticker: Mutex::new(None),
            launcher,
            ad_url: ad_url.into(),
        }
    }

    /// Select a practice page from the home screen. Must be called from
    /// within a tokio runtime (the countdown is a spawned task).
    pub fn select(&self, page: Page) -> Selection {
        let selection = lock(&self.router).select(page);

        match selection {
            Selection::Direct(page) => info!("navigate: {page}"),
            Selection::Gated(page) => {
                info!("navigate: {page} (ad gate, opening {})", self.ad_url);
                self.launcher.launch(&self.ad_url);
                self.start_countdown();
            }
            Selection::Ignored => debug!("navigate: {page} ignored during countdown"),
        }

        self.publish();
        selection
    }

    /// Return to the home screen, cancelling any countdown.
    pub fn back(&self) {
        self.stop_countdown();
        lock(&self.router).back();
        self.publish();
        info!("navigate: home");
    }

    pub fn screen(&self) -> Screen {
        lock(&self.router).screen()
    }

    pub fn visible_page(&self) -> Option<Page> {
        lock(&self.router).visible_page()
    }

    pub fn ad_shown(&self) -> bool {
        lock(&self.router).ad_shown()
    }

    /// Whether a ticker task is still alive.
    pub fn countdown_running(&self) -> bool {
        lock(&self.ticker)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Subscribe to screen changes.
    pub fn subscribe(&self) -> watch::Receiver<Screen> {
        self.screen_tx.subscribe()
    }

    fn start_countdown(&self) {
        let router = self.router.clone();
        let screen_tx = self.screen_tx.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                let tick = {
                    let mut r = lock(&router);
                    let tick = r.tick();
                    screen_tx.send_replace(r.screen());
                    tick
                };
                match tick {
                    Tick::Counting(left) => debug!("countdown: {left}s"),
                    Tick::Revealed(page) => {
                        debug!("countdown: done, showing {page:?}");
                        break;
                    }
                    Tick::Idle => break,
                }
            }
        });

        if let Some(old) = lock(&self.ticker).replace(handle) {
            old.abort();
        }
    }

    fn stop_countdown(&self) {
        if let Some(handle) = lock(&self.ticker).take() {
            handle.abort();
        }
    }

    fn publish(&self) {
        let r = lock(&self.router);
        self.screen_tx.send_replace(r.screen());
    }
}

impl Drop for Navigator {
    fn drop(&mut self) {
        self.stop_countdown();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use myteacher_core::types::{AD_URL, COUNTDOWN_SECS};

    use super::*;

    #[derive(Default)]
    struct RecordingLauncher {
        opened: Mutex<Vec<String>>,
    }

    impl AdLauncher for RecordingLauncher {
        fn launch(&self, url: &str) {
            self.opened.lock().unwrap().push(url.to_string());
        }
    }

    fn navigator() -> (Navigator, Arc<RecordingLauncher>) {
        let launcher = Arc::new(RecordingLauncher::default());
        (Navigator::new(launcher.clone(), AD_URL), launcher)
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_select_opens_ad_and_counts_down() {
        let (nav, launcher) = navigator();

        assert_eq!(nav.select(Page::HindiToEnglish), Selection::Gated(Page::HindiToEnglish));
        assert_eq!(launcher.opened.lock().unwrap().as_slice(), [AD_URL]);
        assert!(nav.ad_shown());
        assert_eq!(
            nav.screen(),
            Screen::Counting {
                seconds: COUNTDOWN_SECS,
                target: Some(Page::HindiToEnglish)
            }
        );

        advance(500).await;
        for left in (1..COUNTDOWN_SECS).rev() {
            advance(1000).await;
            assert_eq!(
                nav.screen(),
                Screen::Counting {
                    seconds: left,
                    target: Some(Page::HindiToEnglish)
                }
            );
            assert_eq!(nav.visible_page(), None);
        }

        advance(1000).await;
        assert_eq!(nav.screen(), Screen::Showing { page: Page::HindiToEnglish });
        assert!(!nav.countdown_running());
    }

    #[tokio::test(start_paused = true)]
    async fn later_selects_skip_the_gate() {
        let (nav, launcher) = navigator();
        nav.select(Page::WordTranslator);
        advance(5_500).await;
        nav.back();

        for page in Page::ALL {
            assert_eq!(nav.select(page), Selection::Direct(page));
            assert_eq!(nav.screen(), Screen::Showing { page });
            assert!(!nav.countdown_running());
            nav.back();
        }
        assert_eq!(launcher.opened.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn back_keeps_ad_shown() {
        let (nav, _) = navigator();
        nav.select(Page::EnglishToHindi);
        advance(5_500).await;

        nav.back();
        assert_eq!(nav.screen(), Screen::Home);
        assert!(nav.ad_shown());
    }

    #[tokio::test(start_paused = true)]
    async fn back_during_countdown_tears_down_ticker() {
        let (nav, _) = navigator();
        nav.select(Page::HindiToSanskrit);
        advance(2_500).await;

        nav.back();
        assert_eq!(nav.screen(), Screen::Home);
        assert!(!nav.countdown_running());

        advance(10_000).await;
        assert_eq!(nav.screen(), Screen::Home);
        assert!(nav.ad_shown());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_each_second() {
        let (nav, _) = navigator();
        nav.select(Page::HindiToEnglish);
        let mut rx = nav.subscribe();

        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let screen = *rx.borrow_and_update();
            seen.push(screen);
            if matches!(screen, Screen::Showing { .. }) {
                break;
            }
        }

        let counts: Vec<u32> = seen
            .iter()
            .filter_map(|s| match s {
                Screen::Counting { seconds, .. } => Some(*seconds),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![4, 3, 2, 1]);
        assert_eq!(seen.last(), Some(&Screen::Showing { page: Page::HindiToEnglish }));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_navigator_stops_ticker() {
        let (nav, _) = navigator();
        nav.select(Page::WordTranslator);
        let mut rx = nav.subscribe();

        drop(nav);
        assert!(rx.changed().await.is_err());
    }
}
