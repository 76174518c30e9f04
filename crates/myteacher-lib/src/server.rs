//! HTTP API for a browser front-end.
//!
//! CORS-permissive so a page served from anywhere on localhost can drive
//! the session. Page routes answer `409 Conflict` when the visible screen
//! has no page of the right kind.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::debug;

use myteacher_core::types::{Page, PageSnapshot, Screen, SpeechState, SpeechStatus};

use crate::navigator::Selection;
use crate::page::{Listen, Outcome, PracticePage};
use crate::session::{Mounted, Session};
use crate::speech::RecognitionError;
use crate::word::WordTranslator;

/// Build the axum router around a shared [`Session`].
pub fn router(session: Arc<Session>) -> Router {
    Router::new()
        .route("/pages", get(pages))
        .route("/screen", get(screen))
        .route("/screen/events", get(screen_events))
        .route("/speech", get(speech))
        .route("/select/{page}", post(select))
        .route("/back", post(back))
        .route("/page", get(page_view))
        .route("/page/listen", post(listen))
        .route("/page/translate", post(translate))
        .route("/page/replay", post(replay))
        .route("/page/paragraph", post(paragraph))
        .route("/page/dictate", post(dictate))
        .route("/page/words/{index}/translate", post(translate_word))
        .route("/page/words/{index}/speak", post(speak_word))
        .route("/page/alert", delete(dismiss_alert))
        .layer(CorsLayer::permissive())
        .with_state(session)
}

type AppState = State<Arc<Session>>;

// ─── Responses ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PageInfo {
    id: Page,
    title: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScreenResponse {
    #[serde(flatten)]
    screen: Screen,
    ad_shown: bool,
}

#[derive(Serialize)]
struct SelectResponse {
    ok: bool,
    selection: &'static str,
    #[serde(flatten)]
    screen: ScreenResponse,
}

#[derive(Serialize)]
struct PageView {
    page: Page,
    #[serde(flatten)]
    snapshot: PageSnapshot,
}

#[derive(Serialize)]
struct OkResponse {
    ok: bool,
}

#[derive(Deserialize)]
struct TextRequest {
    text: String,
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "ok": false, "error": self.message }));
        (self.status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ─── Page lookup ───────────────────────────────────────────────────────────

fn mounted(session: &Session) -> Result<Mounted, ApiError> {
    session
        .page()
        .ok_or_else(|| ApiError::new(StatusCode::CONFLICT, "no practice page is showing"))
}

fn audio_page(session: &Session) -> Result<Arc<PracticePage>, ApiError> {
    match mounted(session)? {
        Mounted::Audio(p) => Ok(p),
        Mounted::Words(_) => Err(ApiError::new(
            StatusCode::CONFLICT,
            "the word translator has no listen/translate controls",
        )),
    }
}

fn word_page(session: &Session) -> Result<Arc<WordTranslator>, ApiError> {
    match mounted(session)? {
        Mounted::Words(w) => Ok(w),
        Mounted::Audio(p) => Err(ApiError::new(
            StatusCode::CONFLICT,
            format!("{} has no word controls", p.page()),
        )),
    }
}

fn word_at(words: &WordTranslator, index: usize) -> Result<String, ApiError> {
    words
        .word_at(index)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("no word at index {index}")))
}

// ─── Navigation ────────────────────────────────────────────────────────────

async fn pages() -> Json<Vec<PageInfo>> {
    Json(
        Page::ALL
            .into_iter()
            .map(|id| PageInfo {
                id,
                title: id.title(),
            })
            .collect(),
    )
}

fn screen_response(session: &Session) -> ScreenResponse {
    ScreenResponse {
        screen: session.screen(),
        ad_shown: session.ad_shown(),
    }
}

async fn screen(State(session): AppState) -> Json<ScreenResponse> {
    Json(screen_response(&session))
}

async fn select(State(session): AppState, Path(page): Path<String>) -> ApiResult<SelectResponse> {
    let page: Page = page
        .parse()
        .map_err(|e: String| ApiError::new(StatusCode::NOT_FOUND, e))?;

    let selection = match session.select(page) {
        Selection::Direct(_) => "direct",
        Selection::Gated(_) => "gated",
        Selection::Ignored => "ignored",
    };
    Ok(Json(SelectResponse {
        ok: selection != "ignored",
        selection,
        screen: screen_response(&session),
    }))
}

/// Server-sent `screen` events: the current screen on connect, then one per
/// change (each countdown second included).
async fn screen_events(
    State(session): AppState,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = session.subscribe();
    let events = stream::unfold((rx, session, true), |(mut rx, session, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        rx.borrow_and_update();
        let event = match Event::default()
            .event("screen")
            .json_data(screen_response(&session))
        {
            Ok(event) => event,
            Err(e) => {
                debug!("screen event not encoded: {e}");
                return None;
            }
        };
        Some((Ok(event), (rx, session, false)))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn speech(State(session): AppState) -> Json<SpeechStatus> {
    Json(session.speech_status().unwrap_or(SpeechStatus {
        state: SpeechState::Idle,
        epoch: 0,
        text: None,
    }))
}

async fn back(State(session): AppState) -> Json<ScreenResponse> {
    session.back();
    Json(screen_response(&session))
}

// ─── Pages ─────────────────────────────────────────────────────────────────

async fn page_view(State(session): AppState) -> ApiResult<PageView> {
    let m = mounted(&session)?;
    Ok(Json(PageView {
        page: m.page(),
        snapshot: m.snapshot(),
    }))
}

async fn listen(State(session): AppState) -> ApiResult<Listen> {
    let page = audio_page(&session)?;
    Ok(Json(page.start_listening().await))
}

async fn translate(State(session): AppState, Json(req): Json<TextRequest>) -> ApiResult<Outcome> {
    let page = audio_page(&session)?;
    Ok(Json(page.translate(&req.text).await))
}

async fn replay(State(session): AppState) -> ApiResult<OkResponse> {
    let page = audio_page(&session)?;
    Ok(Json(OkResponse { ok: page.replay() }))
}

async fn paragraph(State(session): AppState, Json(req): Json<TextRequest>) -> ApiResult<PageSnapshot> {
    let words = word_page(&session)?;
    words.set_paragraph(&req.text);
    Ok(Json(words.snapshot()))
}

async fn dictate(State(session): AppState) -> ApiResult<Listen> {
    let words = word_page(&session)?;
    match words.dictate().await {
        Ok(listen) => Ok(Json(listen)),
        Err(RecognitionError::Unsupported) => Ok(Json(Listen::Unsupported)),
        Err(e) => Ok(Json(Listen::Ended {
            reason: e.to_string(),
        })),
    }
}

async fn translate_word(State(session): AppState, Path(index): Path<usize>) -> ApiResult<Outcome> {
    let words = word_page(&session)?;
    let word = word_at(&words, index)?;
    Ok(Json(words.translate_word(&word).await))
}

async fn speak_word(State(session): AppState, Path(index): Path<usize>) -> ApiResult<OkResponse> {
    let words = word_page(&session)?;
    let word = word_at(&words, index)?;
    words.speak_word(&word);
    Ok(Json(OkResponse { ok: true }))
}

async fn dismiss_alert(State(session): AppState) -> ApiResult<OkResponse> {
    word_page(&session)?.dismiss_alert();
    Ok(Json(OkResponse { ok: true }))
}
