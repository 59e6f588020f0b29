use crate::config::GatewayConfig;
use crate::error::AppError;
use crate::interaction::{Interaction, InteractionEvent, InteractionState};
use crate::page::{self, PageView, ResultPanel, jpeg_data_uri};
use crate::state::AppState;
use crate::upload::read_upload;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderName, HeaderValue},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use inference::InferenceOutcome;
use preprocess::{DISPLAY_HEIGHT, decode_rgb_with_limit, resize_to_height};
use tower_http::trace::TraceLayer;

/// Headroom above the file limit for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Response header carrying the state the upload ended in.
pub const INTERACTION_STATE_HEADER: HeaderName = HeaderName::from_static("x-interaction-state");

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/", get(index).post(analyze))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: &GatewayConfig, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.addr).await?;
    tracing::info!("Gateway listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

async fn index() -> Html<String> {
    Html(page::render(&PageView::idle()))
}

#[tracing::instrument(name = "analyze_upload", skip_all)]
async fn analyze(State(state): State<AppState>, multipart: Multipart) -> Response {
    let mut interaction = Interaction::new();
    interaction.update(InteractionEvent::Upload);

    let result = run_interaction(&state, &mut interaction, multipart)
        .await
        .and_then(|rendered| view_for(interaction.current_state(), rendered));

    let mut response = match result {
        Ok(view) => Html(page::render(&view)).into_response(),
        Err(e) => {
            let event = if e.status().is_client_error() {
                InteractionEvent::Rejected
            } else {
                InteractionEvent::Failed
            };
            interaction.update(event);
            e.into_response()
        }
    };

    let final_state = interaction.current_state();
    tracing::debug!(state = final_state.as_str(), "Upload finished");
    response.headers_mut().insert(
        INTERACTION_STATE_HEADER,
        HeaderValue::from_static(final_state.as_str()),
    );
    response
}

/// Data URIs produced by a completed run.
struct Rendered {
    original: String,
    annotated: Option<String>,
}

/// Build the page for the state the interaction settled in.
fn view_for(state: InteractionState, rendered: Rendered) -> Result<PageView, AppError> {
    let result = match (state, rendered.annotated) {
        (InteractionState::Displaying, Some(uri)) => ResultPanel::Annotated(uri),
        (InteractionState::Warning, _) => ResultPanel::OutputMissing,
        (state, _) => return Err(AppError::UnexpectedState(state)),
    };

    Ok(PageView {
        original: Some(rendered.original),
        result,
        notice: None,
    })
}

async fn run_interaction(
    state: &AppState,
    interaction: &mut Interaction,
    multipart: Multipart,
) -> Result<Rendered, AppError> {
    let upload = read_upload(multipart, state.max_upload_bytes).await?;
    interaction.update(InteractionEvent::Accepted);
    tracing::info!(
        file_name = %upload.file_name,
        bytes = upload.bytes.len(),
        "Upload received"
    );

    let bytes = upload.bytes;
    let max_bytes = state.max_upload_bytes;
    let (image, original) = tokio::task::spawn_blocking(move || -> Result<_, AppError> {
        let _span = common::span!("normalize_upload");
        let image = decode_rgb_with_limit(&bytes, max_bytes)?;
        let display_image = resize_to_height(&image, DISPLAY_HEIGHT)?;
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            display_width = display_image.width(),
            "Upload normalized"
        );
        Ok((image, jpeg_data_uri(&display_image)?))
    })
    .await??;
    interaction.update(InteractionEvent::Normalized);

    let invoker = state.invoker.clone();
    let annotated = tokio::task::spawn_blocking(move || -> Result<_, AppError> {
        let outcome = invoker.run(&image)?;
        present_outcome(outcome)
    })
    .await??;

    interaction.update(match annotated {
        Some(_) => InteractionEvent::OutputFound,
        None => InteractionEvent::OutputMissing,
    });

    Ok(Rendered {
        original,
        annotated,
    })
}

/// Encode the annotated image for the results card, if the detector wrote one.
fn present_outcome(outcome: InferenceOutcome) -> Result<Option<String>, AppError> {
    match outcome {
        InferenceOutcome::Annotated {
            image, detections, ..
        } => {
            tracing::info!(detections, "Detection output ready");
            let display_image = resize_to_height(&image, DISPLAY_HEIGHT)?;
            Ok(Some(jpeg_data_uri(&display_image)?))
        }
        InferenceOutcome::OutputMissing { .. } => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(annotated: Option<&str>) -> Rendered {
        Rendered {
            original: "data:original".to_string(),
            annotated: annotated.map(str::to_string),
        }
    }

    #[test]
    fn displaying_shows_annotated_image() {
        let view = view_for(InteractionState::Displaying, rendered(Some("data:out"))).unwrap();
        assert!(matches!(view.result, ResultPanel::Annotated(ref uri) if uri == "data:out"));
        assert_eq!(view.original.as_deref(), Some("data:original"));
    }

    #[test]
    fn warning_shows_missing_output() {
        let view = view_for(InteractionState::Warning, rendered(None)).unwrap();
        assert!(matches!(view.result, ResultPanel::OutputMissing));
    }

    #[test]
    fn busy_state_never_renders_a_result() {
        for state in [
            InteractionState::FileReceived,
            InteractionState::Normalizing,
            InteractionState::Inferring,
            InteractionState::Fatal,
        ] {
            let result = view_for(state, rendered(Some("data:out")));
            assert!(
                matches!(result, Err(AppError::UnexpectedState(s)) if s == state),
                "{:?}",
                state
            );
        }
    }
}
