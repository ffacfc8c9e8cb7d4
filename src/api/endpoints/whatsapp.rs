//! Messaging webhook: `POST /whatsapp`.
//!
//! Every outcome is a 200 TwiML reply; failures become an apology message.

use axum::extract::rejection::FormRejection;
use axum::extract::{Form, State};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::twiml::MessagingResponse;
use crate::api::types::{match_summary, ApiContext};
use crate::pipeline::import::stage_bytes;
use crate::pipeline::media::{download_media, FetchError};
use crate::pipeline::processor::IngestionOutcome;

pub const PROCESSING_APOLOGY: &str =
    "Hubo un error al procesar tu imagen. Por favor, intenta nuevamente.";
pub const SEND_IMAGE_PROMPT: &str = "Por favor, envía una imagen para procesar.";

/// Filename given to every downloaded image before staging.
const MEDIA_FILENAME: &str = "whatsapp_image.jpg";

#[derive(Debug, Deserialize)]
pub struct WebhookForm {
    #[serde(rename = "MediaUrl0")]
    pub media_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum WebhookError {
    #[error("Media download failed: {0}")]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Pipeline(#[from] ApiError),
}

pub async fn receive(
    State(ctx): State<ApiContext>,
    form: Result<Form<WebhookForm>, FormRejection>,
) -> MessagingResponse {
    let reply = MessagingResponse::new();

    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            tracing::warn!(%rejection, "Malformed webhook body");
            return reply.message(PROCESSING_APOLOGY);
        }
    };

    let Some(url) = form.media_url.filter(|url| !url.trim().is_empty()) else {
        return reply.message(SEND_IMAGE_PROMPT);
    };

    match process_media(&ctx, url.trim()).await {
        Ok(outcome) => reply.message(format_reply(&outcome)),
        Err(e) => {
            tracing::error!(error = %e, "Webhook ingestion failed");
            reply.message(PROCESSING_APOLOGY)
        }
    }
}

async fn process_media(ctx: &ApiContext, url: &str) -> Result<IngestionOutcome, WebhookError> {
    let bytes = download_media(ctx.core.http(), url).await?;

    let core = ctx.core.clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
        let staged = stage_bytes(core.upload_dir(), MEDIA_FILENAME, &bytes)?;
        let conn = core.open_db()?;
        Ok(core
            .processor()
            .ingest_normalized(&conn, staged.path(), core.upload_dir())?)
    })
    .await
    .map_err(ApiError::from)??;

    Ok(outcome)
}

fn format_reply(outcome: &IngestionOutcome) -> String {
    format!(
        "Nombre: {}\nDirección: {}\nResultado: {}",
        outcome.fields.name_text(),
        outcome.fields.address_text(),
        match_summary(&outcome.match_outcome)
    )
}
