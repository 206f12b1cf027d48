use std::collections::{BTreeMap, BTreeSet};

use anyhow::bail;

pub const DOCENTE_COLUMN: &str = "DOCENTE";
pub const ASIGNATURA_COLUMN: &str = "ASIGNATURA";
pub const PLAN_COLUMN: &str = "plan_asignatura";
pub const GENERAL_COLUMN: &str = "evaluacion_docente_general";
pub const COMMENTS_COLUMN: &str = "comentarios";

/// Ordinal rating vocabulary, best to worst.
pub const RATING_LABELS: [&str; 5] = [
    "Excelente",
    "Bueno",
    "Regular",
    "Algo Deficiente",
    "Totalmente Deficiente",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Criterion {
    Puntualidad,
    Ambiente,
    Disponibilidad,
    Planificacion,
    Desarrollo,
    Estrategias,
    Claridad,
    Tareas,
    Retroalimentacion,
}

impl Criterion {
    pub const ALL: [Criterion; 9] = [
        Criterion::Puntualidad,
        Criterion::Ambiente,
        Criterion::Disponibilidad,
        Criterion::Planificacion,
        Criterion::Desarrollo,
        Criterion::Estrategias,
        Criterion::Claridad,
        Criterion::Tareas,
        Criterion::Retroalimentacion,
    ];

    /// Canonical column name produced by the normalizer.
    pub fn field(self) -> &'static str {
        match self {
            Criterion::Puntualidad => "puntualidad",
            Criterion::Ambiente => "ambiente",
            Criterion::Disponibilidad => "disponibilidad",
            Criterion::Planificacion => "planificación",
            Criterion::Desarrollo => "desarrollo",
            Criterion::Estrategias => "estrategias",
            Criterion::Claridad => "claridad",
            Criterion::Tareas => "tareas",
            Criterion::Retroalimentacion => "retroalimentación",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Criterion::Puntualidad => "Puntualidad",
            Criterion::Ambiente => "Ambiente",
            Criterion::Disponibilidad => "Disponibilidad",
            Criterion::Planificacion => "Planificación",
            Criterion::Desarrollo => "Desarrollo",
            Criterion::Estrategias => "Estrategias",
            Criterion::Claridad => "Claridad",
            Criterion::Tareas => "Tareas",
            Criterion::Retroalimentacion => "Retroalimentación",
        }
    }
}

/// Result of looking up an optional column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnData<T> {
    Present(T),
    Absent,
}

/// Raw sheet contents: one header row plus cells, empty cells as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurveyTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl SurveyTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }
}

#[derive(Debug, Clone)]
pub struct SurveyRow {
    pub docente: String,
    pub asignatura: String,
    pub answers: BTreeMap<String, String>,
}

impl SurveyRow {
    pub fn answer(&self, field: &str) -> Option<&str> {
        self.answers.get(field).map(String::as_str)
    }
}

/// A loaded dataset, passed explicitly from ingestion to composition.
#[derive(Debug, Clone)]
pub struct SurveyData {
    columns: BTreeSet<String>,
    rows: Vec<SurveyRow>,
}

impl SurveyData {
    pub fn from_table(table: &SurveyTable) -> anyhow::Result<Self> {
        let missing: Vec<&str> = [DOCENTE_COLUMN, ASIGNATURA_COLUMN]
            .into_iter()
            .filter(|column| table.column_index(column).is_none())
            .collect();
        if !missing.is_empty() {
            bail!(
                "dataset is missing required grouping column(s): {}",
                missing.join(", ")
            );
        }

        let docente_idx = table.column_index(DOCENTE_COLUMN).unwrap_or_default();
        let asignatura_idx = table.column_index(ASIGNATURA_COLUMN).unwrap_or_default();

        let mut rows = Vec::with_capacity(table.rows.len());
        let mut skipped = 0usize;
        for cells in &table.rows {
            let key = |idx: usize| cells.get(idx).cloned().flatten();
            let (Some(docente), Some(asignatura)) = (key(docente_idx), key(asignatura_idx)) else {
                skipped += 1;
                continue;
            };

            let answers = table
                .headers
                .iter()
                .enumerate()
                .filter(|(idx, _)| *idx != docente_idx && *idx != asignatura_idx)
                .filter_map(|(idx, header)| {
                    cells
                        .get(idx)
                        .cloned()
                        .flatten()
                        .map(|value| (header.clone(), value))
                })
                .collect();

            rows.push(SurveyRow {
                docente,
                asignatura,
                answers,
            });
        }

        if skipped > 0 {
            log::warn!("skipped {skipped} row(s) without a DOCENTE/ASIGNATURA value");
        }

        Ok(Self {
            columns: table.headers.iter().cloned().collect(),
            rows,
        })
    }

    pub fn has_column(&self, field: &str) -> bool {
        self.columns.contains(field)
    }

    pub fn rows(&self) -> &[SurveyRow] {
        &self.rows
    }

    pub fn partition<'a>(
        &'a self,
        docente: &'a str,
        asignatura: &'a str,
    ) -> impl Iterator<Item = &'a SurveyRow> + 'a {
        self.rows
            .iter()
            .filter(move |row| row.docente == docente && row.asignatura == asignatura)
    }

    pub fn comments_for(&self, docente: &str, asignatura: &str) -> ColumnData<Vec<String>> {
        if !self.has_column(COMMENTS_COLUMN) {
            return ColumnData::Absent;
        }

        ColumnData::Present(
            self.partition(docente, asignatura)
                .filter_map(|row| row.answer(COMMENTS_COLUMN))
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Ordered rating-value counts for one column of one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingCounts {
    entries: Vec<(String, usize)>,
}

impl RatingCounts {
    pub fn from_entries(entries: Vec<(String, usize)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, label: &str) -> usize {
        self.entries
            .iter()
            .find(|(value, _)| value == label)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    #[cfg(test)]
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    pub fn max(&self) -> usize {
        self.entries.iter().map(|(_, count)| *count).max().unwrap_or(0)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(value, _)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(value, count)| (value.as_str(), *count))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectSummary {
    pub docente: String,
    pub asignatura: String,
    pub respondents: usize,
    pub criteria: Vec<(Criterion, RatingCounts)>,
}

impl SubjectSummary {
    #[cfg(test)]
    pub fn counts(&self, criterion: Criterion) -> Option<&RatingCounts> {
        self.criteria
            .iter()
            .find(|(candidate, _)| *candidate == criterion)
            .map(|(_, counts)| counts)
    }
}

/// Wide summary indexed by (docente, asignatura), sorted by both keys.
#[derive(Debug, Clone, Default)]
pub struct RatingSummary {
    pub subjects: Vec<SubjectSummary>,
}

impl RatingSummary {
    pub fn teachers(&self) -> Vec<String> {
        let mut teachers: Vec<String> = self
            .subjects
            .iter()
            .map(|subject| subject.docente.clone())
            .collect();
        teachers.dedup();
        teachers
    }

    pub fn subjects_for<'a>(&'a self, docente: &'a str) -> impl Iterator<Item = &'a SubjectSummary> + 'a {
        self.subjects
            .iter()
            .filter(move |subject| subject.docente == docente)
    }

    #[cfg(test)]
    pub fn get(&self, docente: &str, asignatura: &str) -> Option<&SubjectSummary> {
        self.subjects
            .iter()
            .find(|subject| subject.docente == docente && subject.asignatura == asignatura)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[Option<&str>]]) -> SurveyTable {
        SurveyTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| cell.map(str::to_string)).collect())
                .collect(),
        }
    }

    #[test]
    fn rejects_tables_without_grouping_columns() {
        let input = table(&["DOCENTE", "puntualidad"], &[&[Some("A"), Some("Bueno")]]);
        let err = SurveyData::from_table(&input).unwrap_err();
        assert!(err.to_string().contains("ASIGNATURA"));
    }

    #[test]
    fn skips_rows_without_keys_and_drops_null_answers() {
        let input = table(
            &["DOCENTE", "ASIGNATURA", "puntualidad", "comentarios"],
            &[
                &[Some("A"), Some("X"), Some("Bueno"), None],
                &[None, Some("X"), Some("Regular"), Some("sin docente")],
            ],
        );
        let data = SurveyData::from_table(&input).unwrap();
        assert_eq!(data.rows().len(), 1);
        let row = &data.rows()[0];
        assert_eq!(row.answer("puntualidad"), Some("Bueno"));
        assert_eq!(row.answer("comentarios"), None);
        assert!(data.has_column("comentarios"));
    }

    #[test]
    fn comments_lookup_reports_absent_column() {
        let input = table(&["DOCENTE", "ASIGNATURA"], &[&[Some("A"), Some("X")]]);
        let data = SurveyData::from_table(&input).unwrap();
        assert_eq!(data.comments_for("A", "X"), ColumnData::Absent);
    }

    #[test]
    fn comments_lookup_keeps_only_the_partition() {
        let input = table(
            &["DOCENTE", "ASIGNATURA", "comentarios"],
            &[
                &[Some("A"), Some("X"), Some("Muy claro")],
                &[Some("A"), Some("Y"), Some("Otra materia")],
                &[Some("A"), Some("X"), None],
            ],
        );
        let data = SurveyData::from_table(&input).unwrap();
        assert_eq!(
            data.comments_for("A", "X"),
            ColumnData::Present(vec!["Muy claro".to_string()])
        );
    }

    #[test]
    fn rating_counts_lookups() {
        let counts = RatingCounts::from_entries(vec![
            ("Excelente".to_string(), 2),
            ("Bueno".to_string(), 0),
        ]);
        assert_eq!(counts.get("Excelente"), 2);
        assert_eq!(counts.get("Regular"), 0);
        assert_eq!(counts.total(), 2);
        assert_eq!(counts.max(), 2);
        assert_eq!(counts.labels().collect::<Vec<_>>(), vec!["Excelente", "Bueno"]);
    }
}
