use std::path::Path;

use anyhow::{anyhow, Context};
use calamine::{open_workbook_auto, Data, Reader};

use crate::models::{SurveyData, SurveyTable};
use crate::normalize;

fn cell_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

pub fn load_table(path: &Path) -> anyhow::Result<SurveyTable> {
    if is_csv(path) {
        load_csv(path)
    } else {
        load_workbook(path)
    }
}

fn load_csv(path: &Path) -> anyhow::Result<SurveyTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("failed to read header row of {}", path.display()))?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed record {} in {}", line + 2, path.display()))?;
        let mut cells: Vec<Option<String>> = record.iter().map(cell_text).collect();
        cells.resize(headers.len(), None);
        rows.push(cells);
    }

    Ok(SurveyTable { headers, rows })
}

fn load_workbook(path: &Path) -> anyhow::Result<SurveyTable> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|err| anyhow!("failed to open workbook {}: {err}", path.display()))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("workbook {} has no sheets", path.display()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|err| anyhow!("failed to read sheet {sheet}: {err}"))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| anyhow!("sheet {sheet} has no header row"))?
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let rows = rows
        .map(|cells| {
            let mut values: Vec<Option<String>> = cells
                .iter()
                .map(|cell| match cell {
                    Data::Empty => None,
                    other => cell_text(&other.to_string()),
                })
                .collect();
            values.resize(headers.len(), None);
            values
        })
        .collect();

    Ok(SurveyTable { headers, rows })
}

/// Loads, normalizes and validates a survey export.
pub fn load_survey(path: &Path) -> anyhow::Result<SurveyData> {
    let table = normalize::normalize_columns(load_table(path)?);
    let data = SurveyData::from_table(&table)
        .with_context(|| format!("{} is not a usable survey export", path.display()))?;
    log::info!(
        "loaded {} survey rows ({} columns) from {}",
        data.rows().len(),
        table.headers.len(),
        path.display()
    );
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("survey-ingest-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn csv_cells_are_trimmed_and_blank_cells_are_null() {
        let path = scratch_file(
            "encuesta.csv",
            "DOCENTE,ASIGNATURA,puntualidad\n Arce ,Química,  \nArce,Química,Bueno,extra\n",
        );
        let table = load_table(&path).unwrap();
        assert_eq!(table.headers, vec!["DOCENTE", "ASIGNATURA", "puntualidad"]);
        assert_eq!(
            table.rows[0],
            vec![Some("Arce".to_string()), Some("Química".to_string()), None]
        );
        assert_eq!(table.rows[1][2], Some("Bueno".to_string()));
    }

    #[test]
    fn short_csv_rows_are_padded() {
        let path = scratch_file("corta.csv", "DOCENTE,ASIGNATURA,comentarios\nArce,Química\n");
        let table = load_table(&path).unwrap();
        assert_eq!(table.rows[0].len(), 3);
        assert_eq!(table.rows[0][2], None);
    }

    #[test]
    fn load_survey_normalizes_question_headers() {
        let path = scratch_file(
            "preguntas.csv",
            "DOCENTE,ASIGNATURA,\"3. EN GENERAL, ¿CÓMO EVALUARÍAS EL DESEMPEÑO DEL DOCENTE?\"\nArce,Química,Excelente\n",
        );
        let data = load_survey(&path).unwrap();
        assert!(data.has_column("evaluacion_docente_general"));
        assert_eq!(data.rows()[0].answer("evaluacion_docente_general"), Some("Excelente"));
    }

    #[test]
    fn load_survey_rejects_missing_grouping_columns() {
        let path = scratch_file("sin_docente.csv", "ASIGNATURA,puntualidad\nQuímica,Bueno\n");
        let err = load_survey(&path).unwrap_err();
        assert!(format!("{err:#}").contains("DOCENTE"));
    }

    #[test]
    fn missing_files_are_reported() {
        let path = std::env::temp_dir().join(format!("no-existe-{}.xlsx", uuid::Uuid::new_v4()));
        assert!(load_table(&path).is_err());
    }
}
