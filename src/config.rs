use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use clap::ValueEnum;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_MODEL: &str = "deepseek-r1:8b";
pub const DEFAULT_TEMPERATURE: f32 = 0.01;

pub const ENDPOINT_ENV: &str = "SUMMARY_ENDPOINT";
pub const MODEL_ENV: &str = "SUMMARY_MODEL";

/// Which optional parts of a teacher report are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionToggles {
    pub preamble: bool,
    pub criteria_list: bool,
    pub plan_chart: bool,
    pub performance_chart: bool,
    pub general_chart: bool,
    pub signatures: bool,
}

impl SectionToggles {
    pub fn full() -> Self {
        Self {
            preamble: true,
            criteria_list: true,
            plan_chart: true,
            performance_chart: true,
            general_chart: true,
            signatures: true,
        }
    }

    pub fn simplified() -> Self {
        Self {
            preamble: false,
            criteria_list: false,
            plan_chart: false,
            performance_chart: true,
            general_chart: false,
            signatures: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CommentMode {
    /// Summarize with the generation endpoint, listing raw comments on failure
    Summarize,
    /// List raw comments without calling the endpoint
    Raw,
    /// Leave the comments page out
    Omit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportProfile {
    Full,
    Simplified,
}

impl ReportProfile {
    pub fn sections(self) -> SectionToggles {
        match self {
            ReportProfile::Full => SectionToggles::full(),
            ReportProfile::Simplified => SectionToggles::simplified(),
        }
    }

    pub fn comment_mode(self) -> CommentMode {
        match self {
            ReportProfile::Full => CommentMode::Summarize,
            ReportProfile::Simplified => CommentMode::Omit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Signatory {
    pub image: PathBuf,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AssetPaths {
    pub logo: PathBuf,
    pub signatories: Vec<Signatory>,
}

impl AssetPaths {
    pub fn under(root: &Path) -> Self {
        Self {
            logo: root.join("images").join("logo.png"),
            signatories: vec![
                Signatory {
                    image: root.join("signature").join("vany_signature.png"),
                    lines: vec![
                        "Lic. Vany Rosales".to_string(),
                        "Encargada de Calidad Academica".to_string(),
                    ],
                },
                Signatory {
                    image: root.join("signature").join("patricia_signature.jpeg"),
                    lines: vec![
                        "VoBo Lic. Patricia Cabrera".to_string(),
                        "Jefe del Departamento de Diseño Curricular y".to_string(),
                        "Calidad Académica a.i.".to_string(),
                    ],
                },
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub sections: SectionToggles,
    pub comments: CommentMode,
    pub assets: AssetPaths,
    pub generated_at: DateTime<Local>,
}

impl ReportConfig {
    pub fn new(profile: ReportProfile, comments: Option<CommentMode>, assets_dir: &Path) -> Self {
        Self {
            sections: profile.sections(),
            comments: comments.unwrap_or_else(|| profile.comment_mode()),
            assets: AssetPaths::under(assets_dir),
            generated_at: Local::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummarizerConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout: Option<Duration>,
}

impl SummarizerConfig {
    /// Flag, then environment, then built-in default.
    pub fn resolve(endpoint: Option<String>, model: Option<String>, timeout_secs: Option<u64>) -> Self {
        Self::resolve_with(endpoint, model, timeout_secs, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(
        endpoint: Option<String>,
        model: Option<String>,
        timeout_secs: Option<u64>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        Self {
            endpoint: endpoint
                .or_else(|| lookup(ENDPOINT_ENV))
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: model
                .or_else(|| lookup(MODEL_ENV))
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: DEFAULT_TEMPERATURE,
            timeout: timeout_secs.filter(|secs| *secs > 0).map(Duration::from_secs),
        }
    }
}
