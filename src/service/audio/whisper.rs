//! Transcription of audio files with Whisper.

use std::{path::Path, time::Duration};

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{AudioInput, CreateTranscriptionRequestArgs},
};
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use crate::{
    base::{config::Config, types::Res},
    service::trace::{RunType, TraceContext, Tracer, traced},
};

use super::Document;

/// Bound on downloading a remote audio file.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Loads the transcript of an audio file as a single [`Document`].
///
/// The source is either a local path or an http(s) URL, which is downloaded first.
#[derive(Clone)]
pub struct WhisperLoader {
    client: Client<OpenAIConfig>,
    http: reqwest::Client,
    model: String,
    language: String,
    temperature: f32,
    tracer: Option<Tracer>,
}

impl WhisperLoader {
    #[instrument(name = "WhisperLoader::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone()).with_api_base(config.openai_base_url.clone());

        Ok(Self {
            client: Client::with_config(cfg),
            http: reqwest::Client::builder().timeout(DOWNLOAD_TIMEOUT).build()?,
            model: config.whisper_model.clone(),
            language: config.whisper_language.clone(),
            temperature: config.whisper_temperature,
            tracer: None,
        })
    }

    pub fn with_tracer(mut self, tracer: Option<Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Transcribe `source` into one document.
    #[instrument(name = "WhisperLoader::load", skip(self, trace))]
    pub async fn load(&self, source: &str, trace: &TraceContext) -> Res<Vec<Document>> {
        let inputs = json!({
            "prompt": source,
            "model": self.model,
            "temperature": self.temperature,
            "language": self.language,
        });

        let text = traced(self.tracer.as_ref(), trace, "whisper - Load", RunType::Parser, inputs, self.transcribe(source), |text| json!({ "output": text })).await?;

        let document = Document::new(text).with_metadata("source", source).with_metadata("model", self.model.as_str());

        Ok(vec![document])
    }

    async fn transcribe(&self, source: &str) -> Res<String> {
        let (file_name, bytes) = self.read_source(source).await?;
        debug!("Transcribing `{file_name}` ({} bytes).", bytes.len());

        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8(file_name, bytes))
            .model(&self.model)
            .language(&self.language)
            .temperature(self.temperature)
            .build()?;

        let response = self.client.audio().transcribe(request).await?;

        Ok(response.text)
    }

    /// The file name and bytes of a local path or remote URL.
    async fn read_source(&self, source: &str) -> Res<(String, Vec<u8>)> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let url = Url::parse(source).map_err(|e| anyhow::anyhow!("Failed to parse URL `{source}`: {e}"))?;
            let file_name = url.path_segments().and_then(|mut segments| segments.next_back()).filter(|name| !name.is_empty()).unwrap_or("audio").to_string();

            let bytes = self.http.get(url).send().await?.error_for_status()?.bytes().await?;

            return Ok((file_name, bytes.to_vec()));
        }

        let path = Path::new(source);
        let file_name = path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_else(|| "audio".to_string());
        let bytes = tokio::fs::read(path).await.map_err(|e| anyhow::anyhow!("Failed to read `{source}`: {e}"))?;

        Ok((file_name, bytes))
    }
}

// Tests.
