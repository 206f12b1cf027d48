use anyhow::{anyhow, bail, Context};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::SummarizerConfig;

/// Joins comments before they are embedded in the prompt.
pub const COMMENT_DELIMITER: &str = ".";

const THINK_BLOCK: &str = r"(?s)<think>.*?</think>";

/// Turns the comments of one (docente, asignatura) pair into narrative text.
pub trait Summarizer {
    async fn summarize(
        &self,
        docente: &str,
        asignatura: &str,
        comments: &[String],
    ) -> anyhow::Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

pub fn build_prompt(docente: &str, asignatura: &str, comments: &[String]) -> String {
    let comentarios = comments.join(COMMENT_DELIMITER);
    format!(
        "Eres un asistente encargado de analizar comentarios de estudiantes sobre profesores y asignaturas.\n\
         Tu tarea es leer los siguientes comentarios y generar un resumen conciso de los puntos clave mencionados.\n\
         \n\
         **Instrucción Importante: La respuesta DEBE estar escrita exclusivamente en español.**\n\
         \n\
         Comentarios de los estudiantes para el docente {docente} en la asignatura {asignatura}:\n\
         {comentarios}\n\
         \n\
         Resumen de los comentarios de los estudiantes sobre el docente para la asignatura:\n"
    )
}

/// Client for an Ollama-style `/api/generate` endpoint.
pub struct OllamaSummarizer {
    client: reqwest::Client,
    config: SummarizerConfig,
    think_block: Regex,
}

impl OllamaSummarizer {
    pub fn new(config: SummarizerConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build().context("failed to build HTTP client")?,
            think_block: Regex::new(THINK_BLOCK)?,
            config,
        })
    }

    /// Drops every `<think>…</think>` block; `None` when nothing is left.
    pub fn clean_response(&self, raw: &str) -> Option<String> {
        let cleaned = self.think_block.replace_all(raw, "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.to_string())
        }
    }
}

impl Summarizer for OllamaSummarizer {
    async fn summarize(
        &self,
        docente: &str,
        asignatura: &str,
        comments: &[String],
    ) -> anyhow::Result<String> {
        let prompt = build_prompt(docente, asignatura, comments);
        let payload = GenerateRequest {
            model: &self.config.model,
            prompt: &prompt,
            temperature: self.config.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.config.endpoint))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            bail!("generation endpoint returned {status}: {body}");
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("generation endpoint returned a malformed body")?;

        self.clean_response(&body.response)
            .ok_or_else(|| anyhow!("generation endpoint returned an empty answer"))
    }
}
