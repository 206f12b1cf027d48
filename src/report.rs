use std::path::PathBuf;

use anyhow::bail;
use chrono::{DateTime, Datelike, Local};

use crate::aggregate;
use crate::chart::{ChartData, ChartKey, ChartKind, FigureRenderer};
use crate::config::{CommentMode, ReportConfig, SectionToggles};
use crate::models::{
    ColumnData, Criterion, RatingCounts, RatingSummary, SubjectSummary, SurveyData, COMMENTS_COLUMN,
    GENERAL_COLUMN, PLAN_COLUMN, RATING_LABELS,
};
use crate::summarizer::Summarizer;

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

const PREAMBLE: &str = "La evaluación inicial del desempeño docente es una herramienta fundamental para asegurar la calidad académica, \
ya que permite identificar fortalezas y áreas de mejora en las prácticas pedagógicas desde el inicio del semestre. \
Este proceso no solo impulsa el desarrollo profesional del docente, sino que también fortalece la experiencia de \
aprendizaje de los estudiantes, promoviendo un entorno académico de excelencia y fomentando la mejora continua en \
los métodos de enseñanza. \
Le invitamos a tomar este reporte con una actitud abierta y positiva, viéndolo como una oportunidad para reflexionar \
sobre su práctica docente y potenciar aún más su impacto en la formación de los estudiantes.";

const EVALUATION_CRITERIA: [&str; 10] = [
    "Presentación del Plan de Asignatura.",
    "Puntualidad y cumplimiento de horario.",
    "Ambiente de respeto y cordialidad.",
    "Disponibilidad para resolver dudas.",
    "Organización y estructura de la clase.",
    "Aplicación de estrategias didácticas.",
    "Claridad en la enseñanza.",
    "Asignación de tareas y actividades académicas.",
    "Calidad de la retroalimentación.",
    "Evaluación general del docente.",
];

const PLAN_EXPLANATION: &str = "La presentación del Plan de Asignatura al inicio del curso es clave para que los estudiantes comprendan los contenidos, metodologías y criterios de evaluación. \
Les brinda una guía clara para organizar el aprendizaje y mejorar el desempeño académico. \
Cuando esta presentación no se realiza o no queda suficientemente clara, puede generar incertidumbre, afectar la organización de los estudiantes \
y dificultar la alineación de expectativas entre docentes y estudiantes, lo que impacta en el desarrollo de la asignatura. \
Asimismo, es importante considerar que las respuestas con la opción \"Desconozco\" pueden deberse a que algunos estudiantes no asistieron \
a las primeras clases o no recuerdan este momento específico. Esto no implica necesariamente que el plan no se haya presentado, \
pero resalta la importancia de reforzar esta información en distintos momentos del semestre.";

const PERFORMANCE_EXPLANATION: &str = "El Desempeño Docente es un aspecto clave en la calidad del proceso de enseñanza-aprendizaje, ya que impacta directamente en la experiencia académica de los estudiantes. \
Este criterio abarca diversos factores que contribuyen a un entorno educativo efectivo y enriquecedor, entre ellos:";

const PERFORMANCE_FACTORS: [&str; 8] = [
    "Puntualidad y cumplimiento de horario: Asistencia y respeto por los tiempos establecidos.",
    "Ambiente de respeto y cordialidad: Clima de confianza y trato adecuado hacia los estudiantes.",
    "Disponibilidad para resolver dudas: Disposición para atender inquietudes y facilitar la comprensión de los temas.",
    "Organización y estructura de la clase: Desarrollo ordenado y secuencial de los contenidos.",
    "Aplicación de estrategias didácticas: Uso de metodologías adecuadas para facilitar el aprendizaje.",
    "Claridad en la enseñanza: Explicaciones comprensibles y coherentes.",
    "Asignación de tareas y actividades académicas: Diseño de actividades que refuercen los aprendizajes.",
    "Calidad de la retroalimentación: Comentarios oportunos y pertinentes para la mejora del desempeño estudiantil.",
];

const GENERAL_EXPLANATION: &str = "La percepción de los estudiantes sobre el desempeño docente es un indicador importante de la calidad del proceso de enseñanza-aprendizaje. \
A través de este indicador, se busca conocer de manera global cómo valoran la labor del docente en función de su metodología, \
interacción con los estudiantes y claridad en la enseñanza. \
Las respuestas obtenidas reflejan el impacto del docente en la experiencia académica y permiten identificar fortalezas, \
así como oportunidades de mejora. A continuación, se presentan los resultados de esta valoración general.";

pub const NO_COMMENTS: &str = "No hay comentarios disponibles para este docente y asignatura.";
pub const PERFORMANCE_ABSENT: &str = "No se encontraron las columnas de los criterios de desempeño en los datos.";
pub const CHART_FAILED: &str = "No se pudo generar el gráfico.";
pub const SUMMARY_FALLBACK: &str =
    "No se pudo generar el resumen automático; se muestran los comentarios originales de los estudiantes.";

/// A renderable unit of the report, laid out top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Heading(String),
    SubjectHeading(String),
    Paragraph(String),
    Emphasis(String),
    Strong(String),
    Bullet(String),
    /// Informational placeholder for data that could not be shown.
    Notice(String),
    Image(PathBuf),
    Spacer(f32),
    Rule,
    PageBreak,
    Signatures(Vec<SignatureSlot>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureSlot {
    pub image: Option<PathBuf>,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub docente: String,
    pub logo: Option<PathBuf>,
    pub blocks: Vec<Block>,
}

/// Top-level sections, in the order they are emitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Section<'a> {
    Title,
    SubjectOverview,
    Preamble,
    CriteriaList,
    Subject(&'a SubjectSummary),
    Signatures,
}

pub fn plan_sections<'a>(subjects: &[&'a SubjectSummary], toggles: &SectionToggles) -> Vec<Section<'a>> {
    let mut sections = vec![Section::Title, Section::SubjectOverview];
    if toggles.preamble {
        sections.push(Section::Preamble);
    }
    if toggles.criteria_list {
        sections.push(Section::CriteriaList);
    }
    sections.extend(subjects.iter().copied().map(Section::Subject));
    if toggles.signatures {
        sections.push(Section::Signatures);
    }
    sections
}

pub fn format_spanish_date(date: &DateTime<Local>) -> String {
    let month = MONTHS[date.month0() as usize];
    format!("{} de {} de {}", date.day(), month, date.year())
}

fn strip_inline_markup(text: &str) -> String {
    text.replace("**", "")
        .replace("__", "")
        .replace('`', "")
        .replace('*', "")
        .trim()
        .to_string()
}

fn numbered_item(line: &str) -> bool {
    let digits = line.chars().take_while(|ch| ch.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(". ")
}

/// Flattens the light markdown returned by the generation endpoint.
pub fn markdown_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<String> = Vec::new();

    let flush = |paragraph: &mut Vec<String>, blocks: &mut Vec<Block>| {
        if !paragraph.is_empty() {
            blocks.push(Block::Paragraph(paragraph.join(" ")));
            paragraph.clear();
        }
    };

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            flush(&mut paragraph, &mut blocks);
        } else if line.starts_with('#') {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Strong(strip_inline_markup(line.trim_start_matches('#'))));
        } else if let Some(item) = ["- ", "* ", "+ "].iter().find_map(|marker| line.strip_prefix(marker)) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Bullet(strip_inline_markup(item)));
        } else if numbered_item(line) {
            flush(&mut paragraph, &mut blocks);
            blocks.push(Block::Paragraph(strip_inline_markup(line)));
        } else {
            paragraph.push(strip_inline_markup(line));
        }
    }
    flush(&mut paragraph, &mut blocks);

    blocks
}

/// Builds one teacher's document from an explicitly passed dataset and summary.
pub struct ReportComposer<'a, S> {
    data: &'a SurveyData,
    summary: &'a RatingSummary,
    config: &'a ReportConfig,
    figures: &'a FigureRenderer,
    summarizer: &'a S,
}

impl<'a, S: Summarizer> ReportComposer<'a, S> {
    pub fn new(
        data: &'a SurveyData,
        summary: &'a RatingSummary,
        config: &'a ReportConfig,
        figures: &'a FigureRenderer,
        summarizer: &'a S,
    ) -> Self {
        Self {
            data,
            summary,
            config,
            figures,
            summarizer,
        }
    }

    pub async fn compose(&self, docente: &str) -> anyhow::Result<ReportDocument> {
        let subjects: Vec<&SubjectSummary> = self.summary.subjects_for(docente).collect();
        if subjects.is_empty() {
            bail!("no survey responses found for teacher {docente}");
        }

        let mut blocks = Vec::new();
        for section in plan_sections(&subjects, &self.config.sections) {
            match section {
                Section::Title => self.title(docente, &mut blocks),
                Section::SubjectOverview => self.overview(&subjects, &mut blocks),
                Section::Preamble => self.preamble(&mut blocks),
                Section::CriteriaList => self.criteria_list(&mut blocks),
                Section::Subject(subject) => self.subject_pages(subject, &mut blocks).await,
                Section::Signatures => self.signatures(&mut blocks),
            }
        }

        let logo = Some(self.config.assets.logo.clone()).filter(|path| path.exists());
        Ok(ReportDocument {
            docente: docente.to_string(),
            logo,
            blocks,
        })
    }

    fn title(&self, docente: &str, blocks: &mut Vec<Block>) {
        blocks.push(Block::Title(format!("Evaluación Docente: {docente}")));
        blocks.push(Block::Spacer(3.0));
        blocks.push(Block::Emphasis(format!(
            "Generado el: {}",
            format_spanish_date(&self.config.generated_at)
        )));
        blocks.push(Block::Spacer(5.0));
    }

    fn overview(&self, subjects: &[&SubjectSummary], blocks: &mut Vec<Block>) {
        for subject in subjects {
            blocks.push(Block::Paragraph(format!(
                "Asignatura: {}. Respuestas: {} estudiantes.",
                subject.asignatura, subject.respondents
            )));
        }
        blocks.push(Block::Spacer(5.0));
    }

    fn preamble(&self, blocks: &mut Vec<Block>) {
        blocks.push(Block::Strong("Estimado/a Docente:".to_string()));
        blocks.push(Block::Paragraph(PREAMBLE.to_string()));
        blocks.push(Block::Spacer(3.0));
    }

    fn criteria_list(&self, blocks: &mut Vec<Block>) {
        blocks.push(Block::Heading("Resultados de la Evaluación".to_string()));
        blocks.push(Block::Paragraph(
            "En base a las respuestas de los estudiantes, se presentan los hallazgos agrupados en los siguientes criterios:"
                .to_string(),
        ));
        blocks.extend(EVALUATION_CRITERIA.iter().map(|criterion| Block::Bullet(criterion.to_string())));
        blocks.push(Block::Spacer(5.0));
        blocks.push(Block::Rule);
    }

    async fn subject_pages(&self, subject: &SubjectSummary, blocks: &mut Vec<Block>) {
        let sections = &self.config.sections;
        let (docente, asignatura) = (subject.docente.as_str(), subject.asignatura.as_str());

        blocks.push(Block::PageBreak);
        blocks.push(Block::SubjectHeading(format!("Asignatura: {asignatura}")));

        if sections.plan_chart {
            blocks.push(Block::Heading("Plan de Asignatura".to_string()));
            blocks.push(Block::Paragraph(PLAN_EXPLANATION.to_string()));
            let counts = aggregate::value_counts(self.data, docente, asignatura, PLAN_COLUMN, &[]);
            self.single_chart(subject, ChartKind::Plan, PLAN_COLUMN, counts, "Respuestas", blocks);
        }

        if sections.performance_chart {
            if sections.plan_chart {
                blocks.push(Block::PageBreak);
            }
            blocks.push(Block::Heading("Desempeño del Docente".to_string()));
            blocks.push(Block::Paragraph(PERFORMANCE_EXPLANATION.to_string()));
            blocks.extend(PERFORMANCE_FACTORS.iter().map(|factor| Block::Bullet(factor.to_string())));
            blocks.push(Block::Paragraph(
                "A continuación, se detallan los resultados obtenidos en cada uno de estos criterios.".to_string(),
            ));
            if Criterion::ALL.iter().any(|criterion| self.data.has_column(criterion.field())) {
                let key = ChartKey {
                    docente,
                    asignatura,
                    kind: ChartKind::Desempeno,
                };
                let title = format!("Resumen de valoraciones: {docente} - {asignatura}");
                self.embed_chart(&key, &title, &ChartData::Grouped { criteria: &subject.criteria }, blocks);
            } else {
                log::warn!("no performance criteria columns found; skipping desempeno chart for {docente} - {asignatura}");
                blocks.push(Block::Notice(PERFORMANCE_ABSENT.to_string()));
            }
        }

        if sections.general_chart {
            blocks.push(Block::PageBreak);
            blocks.push(Block::Heading("Evaluación General del Desempeño Docente".to_string()));
            blocks.push(Block::Paragraph(GENERAL_EXPLANATION.to_string()));
            let counts =
                aggregate::value_counts(self.data, docente, asignatura, GENERAL_COLUMN, &RATING_LABELS);
            self.single_chart(subject, ChartKind::General, GENERAL_COLUMN, counts, "Evaluación", blocks);
        }

        if self.config.comments != CommentMode::Omit {
            blocks.push(Block::PageBreak);
            self.comments_section(subject, blocks).await;
        }
    }

    fn single_chart(
        &self,
        subject: &SubjectSummary,
        kind: ChartKind,
        field: &str,
        counts: ColumnData<RatingCounts>,
        x_desc: &str,
        blocks: &mut Vec<Block>,
    ) {
        let counts = match counts {
            ColumnData::Present(counts) => counts,
            ColumnData::Absent => {
                log::warn!(
                    "column '{field}' not found; skipping {} chart for {} - {}",
                    kind.as_str(),
                    subject.docente,
                    subject.asignatura
                );
                blocks.push(Block::Notice(format!("No se encontró la columna '{field}' en los datos.")));
                return;
            }
        };

        let key = ChartKey {
            docente: &subject.docente,
            asignatura: &subject.asignatura,
            kind,
        };
        let title = match kind {
            ChartKind::Plan => format!("Presentación del plan: {} - {}", subject.docente, subject.asignatura),
            _ => format!("Evaluación general: {} - {}", subject.docente, subject.asignatura),
        };
        self.embed_chart(&key, &title, &ChartData::Single { counts: &counts, x_desc }, blocks);
    }

    fn embed_chart(&self, key: &ChartKey<'_>, title: &str, data: &ChartData<'_>, blocks: &mut Vec<Block>) {
        match self.figures.render(key, title, data) {
            Ok(path) if path.exists() => blocks.push(Block::Image(path)),
            Ok(path) => {
                log::warn!("chart {} was not written", path.display());
                blocks.push(Block::Notice(CHART_FAILED.to_string()));
            }
            Err(err) => {
                log::warn!("{err:#}");
                blocks.push(Block::Notice(CHART_FAILED.to_string()));
            }
        }
    }

    async fn comments_section(&self, subject: &SubjectSummary, blocks: &mut Vec<Block>) {
        let (docente, asignatura) = (subject.docente.as_str(), subject.asignatura.as_str());
        blocks.push(Block::Heading(match self.config.comments {
            CommentMode::Summarize => "Resumen Generado por IA".to_string(),
            _ => "Comentarios de los Estudiantes".to_string(),
        }));

        let comments = match self.data.comments_for(docente, asignatura) {
            ColumnData::Present(comments) => comments,
            ColumnData::Absent => {
                blocks.push(Block::Notice(format!(
                    "No se encontró la columna '{COMMENTS_COLUMN}' en los datos."
                )));
                return;
            }
        };
        if comments.is_empty() {
            blocks.push(Block::Notice(NO_COMMENTS.to_string()));
            return;
        }

        if self.config.comments == CommentMode::Summarize {
            match self.summarizer.summarize(docente, asignatura, &comments).await {
                Ok(summary) => {
                    blocks.extend(markdown_blocks(&summary));
                    return;
                }
                Err(err) => {
                    log::warn!("summary for {docente} - {asignatura} failed, listing raw comments: {err:#}");
                    blocks.push(Block::Notice(SUMMARY_FALLBACK.to_string()));
                }
            }
        }

        blocks.extend(
            comments
                .iter()
                .enumerate()
                .map(|(idx, comment)| Block::Bullet(format!("Comentario {}: {comment}", idx + 1))),
        );
    }

    fn signatures(&self, blocks: &mut Vec<Block>) {
        blocks.push(Block::Spacer(25.0));
        blocks.push(Block::Signatures(
            self.config
                .assets
                .signatories
                .iter()
                .map(|signatory| SignatureSlot {
                    image: Some(signatory.image.clone()).filter(|path| path.exists()),
                    lines: signatory.lines.clone(),
                })
                .collect(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssetPaths, ReportProfile};
    use crate::models::SurveyTable;
    use chrono::TimeZone;
    use std::cell::Cell;
    use std::path::Path;

    struct StubSummarizer {
        answer: Option<&'static str>,
        calls: Cell<usize>,
    }

    impl StubSummarizer {
        fn answering(answer: &'static str) -> Self {
            Self {
                answer: Some(answer),
                calls: Cell::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                answer: None,
                calls: Cell::new(0),
            }
        }
    }

    impl Summarizer for StubSummarizer {
        async fn summarize(&self, _: &str, _: &str, _: &[String]) -> anyhow::Result<String> {
            self.calls.set(self.calls.get() + 1);
            self.answer
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("generation endpoint returned 500 Internal Server Error"))
        }
    }

    fn dataset(headers: &[&str], rows: &[&[Option<&str>]]) -> SurveyData {
        let table = SurveyTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| cell.map(str::to_string)).collect())
                .collect(),
        };
        SurveyData::from_table(&table).unwrap()
    }

    fn config(sections: SectionToggles, comments: CommentMode) -> ReportConfig {
        let missing_assets = std::env::temp_dir().join(format!("survey-assets-{}", uuid::Uuid::new_v4()));
        ReportConfig {
            sections,
            comments,
            assets: AssetPaths::under(&missing_assets),
            generated_at: Local.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap(),
        }
    }

    fn text_only() -> SectionToggles {
        SectionToggles {
            plan_chart: false,
            performance_chart: false,
            general_chart: false,
            ..SectionToggles::full()
        }
    }

    async fn compose_with<S: Summarizer>(
        data: &SurveyData,
        config: &ReportConfig,
        summarizer: &S,
        docente: &str,
    ) -> ReportDocument {
        let summary = aggregate::summarize(data, &Criterion::ALL);
        let figures = FigureRenderer::for_run(&std::env::temp_dir().join("survey-report-tests"));
        let composer = ReportComposer::new(data, &summary, config, &figures, summarizer);
        let document = composer.compose(docente).await.unwrap();
        figures.cleanup().unwrap();
        document
    }

    fn two_subject_data() -> SurveyData {
        dataset(
            &["DOCENTE", "ASIGNATURA", "puntualidad", "comentarios"],
            &[
                &[Some("Arce"), Some("Química"), Some("Bueno"), Some("Muy clara")],
                &[Some("Arce"), Some("Biología"), Some("Excelente"), None],
                &[Some("Zapata"), Some("Física"), Some("Regular"), Some("Llega tarde")],
                &[Some("Arce"), Some("Química"), Some("Excelente"), Some("Puntual")],
            ],
        )
    }

    fn subject_headings(document: &ReportDocument) -> Vec<(usize, String)> {
        document
            .blocks
            .iter()
            .enumerate()
            .filter_map(|(idx, block)| match block {
                Block::SubjectHeading(text) => Some((idx, text.clone())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn spanish_dates_use_month_names() {
        let date = Local.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap();
        assert_eq!(format_spanish_date(&date), "14 de marzo de 2025");
    }

    #[test]
    fn markdown_is_flattened_into_blocks() {
        let blocks = markdown_blocks("## Fortalezas\n\n- **Claridad** en las clases\n* Puntualidad\n\nLos estudiantes\nvaloran el trato.\n1. Mejorar retroalimentación");
        assert_eq!(
            blocks,
            vec![
                Block::Strong("Fortalezas".to_string()),
                Block::Bullet("Claridad en las clases".to_string()),
                Block::Bullet("Puntualidad".to_string()),
                Block::Paragraph("Los estudiantes valoran el trato.".to_string()),
                Block::Paragraph("1. Mejorar retroalimentación".to_string()),
            ]
        );
    }

    #[test]
    fn sections_follow_fixed_order() {
        let data = two_subject_data();
        let summary = aggregate::summarize(&data, &Criterion::ALL);
        let subjects: Vec<&SubjectSummary> = summary.subjects_for("Arce").collect();

        let full = plan_sections(&subjects, &SectionToggles::full());
        assert_eq!(full.len(), 7);
        assert_eq!(full[0], Section::Title);
        assert_eq!(full[1], Section::SubjectOverview);
        assert_eq!(full[2], Section::Preamble);
        assert_eq!(full[3], Section::CriteriaList);
        assert!(matches!(full[4], Section::Subject(s) if s.asignatura == "Biología"));
        assert!(matches!(full[5], Section::Subject(s) if s.asignatura == "Química"));
        assert_eq!(full[6], Section::Signatures);

        let simplified = plan_sections(&subjects, &ReportProfile::Simplified.sections());
        assert_eq!(simplified.len(), 4);
    }

    #[tokio::test]
    async fn two_subjects_give_two_page_sequences_in_order() {
        let data = two_subject_data();
        let config = config(text_only(), CommentMode::Raw);
        let summarizer = StubSummarizer::answering("no se usa");
        let document = compose_with(&data, &config, &summarizer, "Arce").await;

        let headings = subject_headings(&document);
        assert_eq!(
            headings.iter().map(|(_, text)| text.as_str()).collect::<Vec<_>>(),
            vec!["Asignatura: Biología", "Asignatura: Química"]
        );
        for (idx, _) in &headings {
            assert_eq!(document.blocks[idx - 1], Block::PageBreak);
        }
        assert_eq!(summarizer.calls.get(), 0);
        assert!(matches!(document.blocks[0], Block::Title(ref text) if text == "Evaluación Docente: Arce"));
    }

    #[tokio::test]
    async fn overview_reports_response_counts() {
        let data = two_subject_data();
        let config = config(text_only(), CommentMode::Omit);
        let document = compose_with(&data, &config, &StubSummarizer::failing(), "Arce").await;

        assert!(document
            .blocks
            .contains(&Block::Paragraph("Asignatura: Química. Respuestas: 2 estudiantes.".to_string())));
    }

    #[tokio::test]
    async fn generation_date_belongs_to_the_title_block() {
        let data = two_subject_data();
        let config = config(text_only(), CommentMode::Omit);
        let document = compose_with(&data, &config, &StubSummarizer::failing(), "Arce").await;

        let date = Block::Emphasis("Generado el: 14 de marzo de 2025".to_string());
        let date_at = document.blocks.iter().position(|block| *block == date).unwrap();
        let first_overview = document
            .blocks
            .iter()
            .position(|block| matches!(block, Block::Paragraph(text) if text.starts_with("Asignatura:")))
            .unwrap();
        assert!(matches!(document.blocks[0], Block::Title(_)));
        assert!(date_at < first_overview);
    }

    #[tokio::test]
    async fn missing_criteria_columns_replace_the_performance_chart() {
        let data = dataset(&["DOCENTE", "ASIGNATURA"], &[&[Some("Arce"), Some("Química")]]);
        let sections = SectionToggles {
            performance_chart: true,
            ..text_only()
        };
        let config = config(sections, CommentMode::Omit);
        let document = compose_with(&data, &config, &StubSummarizer::failing(), "Arce").await;

        assert!(document.blocks.contains(&Block::Notice(PERFORMANCE_ABSENT.to_string())));
        assert!(!document.blocks.iter().any(|block| matches!(block, Block::Image(_))));
    }

    #[tokio::test]
    async fn rendered_plan_chart_sits_inside_its_subject_page() {
        let data = dataset(
            &["DOCENTE", "ASIGNATURA", "plan_asignatura"],
            &[
                &[Some("Arce"), Some("Química"), Some("Sí")],
                &[Some("Arce"), Some("Química"), Some("Desconozco")],
            ],
        );
        let sections = SectionToggles {
            plan_chart: true,
            ..text_only()
        };
        let config = config(sections, CommentMode::Omit);
        let summary = aggregate::summarize(&data, &Criterion::ALL);
        let figures = FigureRenderer::for_run(&std::env::temp_dir().join("survey-report-tests"));
        let summarizer = StubSummarizer::failing();
        let composer = ReportComposer::new(&data, &summary, &config, &figures, &summarizer);
        let document = composer.compose("Arce").await.unwrap();

        let heading = document
            .blocks
            .iter()
            .position(|block| *block == Block::SubjectHeading("Asignatura: Química".to_string()))
            .unwrap();
        let page = &document.blocks[heading..];
        let end = page
            .iter()
            .skip(1)
            .position(|block| *block == Block::PageBreak)
            .map_or(page.len(), |idx| idx + 1);
        let chart = page[..end]
            .iter()
            .find(|block| matches!(block, Block::Image(_) | Block::Notice(_)))
            .cloned();

        // Rasterizing the caption can fail without system fonts; the page then
        // carries the failure notice in the same slot.
        match chart {
            Some(Block::Image(path)) => {
                let expected = figures.path_for(&ChartKey {
                    docente: "Arce",
                    asignatura: "Química",
                    kind: ChartKind::Plan,
                });
                assert_eq!(path, expected);
                assert!(path.exists());
            }
            Some(Block::Notice(text)) => assert_eq!(text, CHART_FAILED),
            other => panic!("expected a chart slot, got {other:?}"),
        }
        figures.cleanup().unwrap();
    }

    #[tokio::test]
    async fn subjects_without_comments_skip_the_summarizer() {
        let data = two_subject_data();
        let config = config(text_only(), CommentMode::Summarize);
        let summarizer = StubSummarizer::answering("Resumen");
        let document = compose_with(&data, &config, &summarizer, "Arce").await;

        // Biología has no comments, Química has two.
        assert_eq!(summarizer.calls.get(), 1);
        let headings = subject_headings(&document);
        let biologia = &document.blocks[headings[0].0..headings[1].0];
        assert!(biologia.contains(&Block::Notice(NO_COMMENTS.to_string())));
        let quimica = &document.blocks[headings[1].0..];
        assert!(quimica.contains(&Block::Paragraph("Resumen".to_string())));
    }

    #[tokio::test]
    async fn failed_summaries_fall_back_to_raw_comments() {
        let data = two_subject_data();
        let config = config(text_only(), CommentMode::Summarize);
        let summarizer = StubSummarizer::failing();
        let document = compose_with(&data, &config, &summarizer, "Arce").await;

        assert_eq!(summarizer.calls.get(), 1);
        assert!(document.blocks.contains(&Block::Notice(SUMMARY_FALLBACK.to_string())));
        assert!(document.blocks.contains(&Block::Bullet("Comentario 1: Muy clara".to_string())));
        assert!(document.blocks.contains(&Block::Bullet("Comentario 2: Puntual".to_string())));
    }

    #[tokio::test]
    async fn absent_chart_columns_become_placeholders() {
        let data = two_subject_data();
        let sections = SectionToggles {
            performance_chart: false,
            ..SectionToggles::full()
        };
        let config = config(sections, CommentMode::Omit);
        let document = compose_with(&data, &config, &StubSummarizer::failing(), "Zapata").await;

        assert!(document
            .blocks
            .contains(&Block::Notice("No se encontró la columna 'plan_asignatura' en los datos.".to_string())));
        assert!(document.blocks.contains(&Block::Notice(
            "No se encontró la columna 'evaluacion_docente_general' en los datos.".to_string()
        )));
        assert!(!document.blocks.iter().any(|block| matches!(block, Block::Image(_))));
    }

    #[tokio::test]
    async fn missing_signature_images_leave_placeholders() {
        let data = two_subject_data();
        let config = config(text_only(), CommentMode::Omit);
        let document = compose_with(&data, &config, &StubSummarizer::failing(), "Zapata").await;

        let Some(Block::Signatures(slots)) = document.blocks.last() else {
            panic!("signature block should close the report");
        };
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|slot| slot.image.is_none()));
        assert_eq!(slots[0].lines[0], "Lic. Vany Rosales");
        assert!(document.logo.is_none());
    }

    #[tokio::test]
    async fn unknown_teachers_are_rejected() {
        let data = two_subject_data();
        let summary = aggregate::summarize(&data, &Criterion::ALL);
        let config = config(text_only(), CommentMode::Omit);
        let figures = FigureRenderer::new(Path::new("/tmp/unused"));
        let summarizer = StubSummarizer::failing();
        let composer = ReportComposer::new(&data, &summary, &config, &figures, &summarizer);
        assert!(composer.compose("Nadie").await.is_err());
    }
}
