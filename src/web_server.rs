use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::llm_interaction::GenerationError;
use crate::resolver::{AnswerSource, Resolution, Resolver};
use crate::speech::{AudioClip, SpeechError, SpeechToText};

const PAGE_TITLE: &str = "Movie Recommendation Chatbot (Text + Voice)";
const MODEL_ERROR_MESSAGE: &str = "The AI model could not produce an answer.";
const MISSING_AUDIO_MESSAGE: &str = "No audio was uploaded.";
const AUDIO_FIELD: &str = "audio";

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    resolver: Arc<Resolver>,
    speech: Arc<dyn SpeechToText>,
}

impl AppState {
    pub fn new(
        templates_dir: impl Into<PathBuf>,
        resolver: Arc<Resolver>,
        speech: Arc<dyn SpeechToText>,
    ) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(templates_dir.into())),
            resolver,
            speech,
        }
    }
}

// Minijinja Environment setup
fn create_minijinja_env(templates_dir: PathBuf) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&templates_dir));
        // Watch the templates directory for changes
        notifier.watch_path(&templates_dir, true);
        Ok(env)
    })
}

/// Everything the page template can show for one request.
#[derive(Debug, Default, Serialize)]
struct PageView {
    genre: String,
    transcript: Option<String>,
    heading: Option<&'static str>,
    lines: Vec<String>,
    answer: Option<String>,
    error: Option<String>,
}

impl PageView {
    fn show(&mut self, outcome: Result<Resolution, GenerationError>) {
        match outcome {
            Ok(resolution) => match resolution.source {
                AnswerSource::Dataset => {
                    self.heading = Some("Recommended Movies:");
                    self.lines = resolution.text.lines().map(str::to_string).collect();
                }
                AnswerSource::Generated => {
                    self.heading = Some("Answer (From AI Model):");
                    self.answer = Some(resolution.text);
                }
            },
            Err(e) => {
                error!("Text generation failed: {:?}", e);
                self.error = Some(MODEL_ERROR_MESSAGE.to_string());
            }
        }
    }
}

fn render_page(state: &AppState, view: &PageView) -> Result<String, minijinja::Error> {
    let env = state.templates.acquire_env()?;
    let tmpl = env.get_template("index.html")?;
    let html = tmpl.render(minijinja::context! {
        title => PAGE_TITLE,
        page => view,
    })?;
    Ok(html)
}

fn render(state: &AppState, view: &PageView) -> Response {
    match render_page(state, view) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to get or render template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
                .into_response()
        }
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

#[derive(Deserialize)]
struct IndexParams {
    genre: Option<String>,
}

async fn index_handler(State(state): State<AppState>, Query(params): Query<IndexParams>) -> Response {
    let mut view = PageView::default();
    if let Some(genre) = non_blank(params.genre) {
        info!("Text query: {}", genre);
        view.show(state.resolver.resolve(&genre).await);
        view.genre = genre;
    }
    render(&state, &view)
}

/// Pulls the `audio` field out of an upload.
async fn read_audio(multipart: &mut Multipart) -> Result<Option<AudioClip>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("recording.wav").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        let clip = match content_type {
            Some(mime) => AudioClip::new(bytes.to_vec(), file_name, mime),
            None => AudioClip::from_file_name(bytes.to_vec(), file_name),
        };
        return Ok(Some(clip));
    }
    Ok(None)
}

async fn transcribe(state: &AppState, clip: &AudioClip) -> Result<String, SpeechError> {
    if clip.bytes.is_empty() {
        return Err(SpeechError::Unintelligible);
    }
    state.speech.transcribe(clip).await
}

async fn voice_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut view = PageView::default();
    match read_audio(&mut multipart).await {
        Ok(Some(clip)) => match transcribe(&state, &clip).await {
            Ok(text) => {
                info!("Voice query: {}", text);
                view.show(state.resolver.resolve(&text).await);
                view.transcript = Some(text);
            }
            Err(e) => {
                warn!("Voice request aborted: {}", e);
                view.error = Some(e.user_message().to_string());
            }
        },
        Ok(None) => view.error = Some(MISSING_AUDIO_MESSAGE.to_string()),
        Err(e) => {
            warn!("Failed to read audio upload: {}", e);
            view.error = Some(format!("Could not read the uploaded audio: {e}"));
        }
    }
    render(&state, &view)
}

#[derive(Deserialize)]
struct AskParams {
    q: Option<String>,
}

#[derive(Serialize)]
struct AskResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript: Option<String>,
    source: AnswerSource,
    answer: String,
    matches: usize,
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

async fn answer_json(state: &AppState, query: &str, transcript: Option<String>) -> Response {
    match state.resolver.resolve(query).await {
        Ok(resolution) => Json(AskResponse {
            transcript,
            source: resolution.source,
            answer: resolution.text,
            matches: resolution.matches,
        })
        .into_response(),
        Err(e) => {
            error!("Text generation failed: {:?}", e);
            json_error(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

async fn ask_handler(State(state): State<AppState>, Query(params): Query<AskParams>) -> Response {
    match non_blank(params.q) {
        Some(query) => answer_json(&state, &query, None).await,
        None => json_error(StatusCode::BAD_REQUEST, "query must not be empty"),
    }
}

async fn api_voice_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let clip = match read_audio(&mut multipart).await {
        Ok(Some(clip)) => clip,
        Ok(None) => return json_error(StatusCode::BAD_REQUEST, MISSING_AUDIO_MESSAGE),
        // Carries 413 when the upload exceeds the body limit.
        Err(e) => return json_error(e.status(), e.body_text()),
    };
    match transcribe(&state, &clip).await {
        Ok(text) => answer_json(&state, &text, Some(text.clone())).await,
        Err(e @ SpeechError::Unintelligible) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, e.user_message())
        }
        Err(e @ SpeechError::Service(_)) => {
            warn!("Speech service failed: {}", e);
            json_error(StatusCode::BAD_GATEWAY, e.user_message())
        }
    }
}

async fn health_handler() -> &'static str {
    "ok"
}

pub fn app(state: AppState, max_audio_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/voice", post(voice_handler))
        .route("/api/ask", get(ask_handler))
        .route("/api/voice", post(api_voice_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_audio_bytes))
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

/// A web server whose dataset is loaded and whose port is bound, ready to serve.
pub struct BoundServer {
    listener: TcpListener,
    app: Router,
}

impl BoundServer {
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("Failed to read the bound address")
    }

    pub async fn run(self) -> Result<()> {
        serve(self.listener, self.app.into_make_service())
            .await
            .context("Web server failed")?;
        Ok(())
    }
}

/// Does every fallible startup step (dataset load, port bind) so failures surface before serving.
pub async fn bind_web_server(port: u16, settings: &Settings) -> Result<BoundServer> {
    let resolver = Arc::new(settings.build_resolver()?);
    let speech: Arc<dyn SpeechToText> = Arc::new(settings.transcriber());
    let state = AppState::new(settings.templates_dir.clone(), resolver, speech);

    let app = app(state, settings.max_audio_bytes);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    // Bind using tokio::net::TcpListener
    let listener = TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;
    info!("Web server listening on http://{}", listener.local_addr().unwrap_or(addr));

    Ok(BoundServer { listener, app })
}

pub async fn start_web_server(port: u16, settings: &Settings) -> Result<()> {
    bind_web_server(port, settings).await?.run().await
}
