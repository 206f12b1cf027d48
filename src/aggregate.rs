use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

use crate::models::{
    ColumnData, Criterion, RatingCounts, RatingSummary, SubjectSummary, SurveyData, SurveyRow,
    RATING_LABELS,
};

/// Rating columns for `field`: the vocabulary in its own order, then any other
/// value observed anywhere in the dataset, sorted.
pub fn rating_columns(data: &SurveyData, field: &str, vocabulary: &[&str]) -> Vec<String> {
    let extras: BTreeSet<&str> = data
        .rows()
        .iter()
        .filter_map(|row| row.answer(field))
        .filter(|value| !vocabulary.contains(value))
        .collect();

    vocabulary
        .iter()
        .copied()
        .chain(extras)
        .map(str::to_string)
        .collect()
}

fn count_values<'a>(
    rows: impl IntoIterator<Item = &'a SurveyRow>,
    field: &str,
    columns: &[String],
) -> RatingCounts {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in rows.into_iter().filter_map(|row| row.answer(field)) {
        *counts.entry(value).or_insert(0) += 1;
    }

    RatingCounts::from_entries(
        columns
            .iter()
            .map(|column| (column.clone(), counts.get(column.as_str()).copied().unwrap_or(0)))
            .collect(),
    )
}

pub fn summarize(data: &SurveyData, criteria: &[Criterion]) -> RatingSummary {
    let columns: Vec<(Criterion, Vec<String>)> = criteria
        .iter()
        .map(|criterion| {
            (
                *criterion,
                rating_columns(data, criterion.field(), &RATING_LABELS),
            )
        })
        .collect();

    let mut partitions: BTreeMap<(&str, &str), Vec<&SurveyRow>> = BTreeMap::new();
    for row in data.rows() {
        partitions
            .entry((row.docente.as_str(), row.asignatura.as_str()))
            .or_default()
            .push(row);
    }

    let subjects = partitions
        .into_iter()
        .map(|((docente, asignatura), rows)| SubjectSummary {
            docente: docente.to_string(),
            asignatura: asignatura.to_string(),
            respondents: rows.len(),
            criteria: columns
                .iter()
                .map(|(criterion, columns)| {
                    (
                        *criterion,
                        count_values(rows.iter().copied(), criterion.field(), columns),
                    )
                })
                .collect(),
        })
        .collect();

    RatingSummary { subjects }
}

/// Count breakdown of a single optional column for one (docente, asignatura).
pub fn value_counts(
    data: &SurveyData,
    docente: &str,
    asignatura: &str,
    field: &str,
    vocabulary: &[&str],
) -> ColumnData<RatingCounts> {
    if !data.has_column(field) {
        return ColumnData::Absent;
    }

    let columns = rating_columns(data, field, vocabulary);
    ColumnData::Present(count_values(
        data.partition(docente, asignatura),
        field,
        &columns,
    ))
}

pub fn write_summary_csv<W: Write>(summary: &RatingSummary, writer: W) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec![
        "DOCENTE".to_string(),
        "ASIGNATURA".to_string(),
        "RESPUESTAS".to_string(),
    ];
    if let Some(first) = summary.subjects.first() {
        for (criterion, counts) in &first.criteria {
            header.extend(
                counts
                    .labels()
                    .map(|label| format!("{}:{}", criterion.field(), label)),
            );
        }
    }
    csv_writer.write_record(&header)?;

    for subject in &summary.subjects {
        let mut record = vec![
            subject.docente.clone(),
            subject.asignatura.clone(),
            subject.respondents.to_string(),
        ];
        for (_, counts) in &subject.criteria {
            record.extend(counts.iter().map(|(_, count)| count.to_string()));
        }
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}
