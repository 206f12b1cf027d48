use crate::models::SurveyTable;

/// Survey question text → canonical field name.
const QUESTION_FIELDS: [(&str, &str); 12] = [
    (
        "1. EN LA PRIMERA SEMANA DE CLASES, ¿EL DOCENTE PRESENTÓ Y EXPLICÓ SU PLAN DE ASIGNATURA?",
        "plan_asignatura",
    ),
    (
        "2. VALORA EL DESEMPEÑO DEL DOCENTE CON RELACIÓN A LOS SIGUIENTES CREITERIOS: [Es puntual y cumple con el horario de clase.]",
        "puntualidad",
    ),
    (
        "2. VALORA EL DESEMPEÑO DEL DOCENTE CON RELACIÓN A LOS SIGUIENTES CREITERIOS: [Promueve un ambiente cordial y de respeto mutuo.]",
        "ambiente",
    ),
    (
        "2. VALORA EL DESEMPEÑO DEL DOCENTE CON RELACIÓN A LOS SIGUIENTES CREITERIOS: [Demuestra disponibilidad y apertura para responder a dudas y/o consultas.]",
        "disponibilidad",
    ),
    (
        "2. VALORA EL DESEMPEÑO DEL DOCENTE CON RELACIÓN A LOS SIGUIENTES CREITERIOS: [Cumple con la planificación de la clase.]",
        "planificación",
    ),
    (
        "2. VALORA EL DESEMPEÑO DEL DOCENTE CON RELACIÓN A LOS SIGUIENTES CREITERIOS: [El desarrollo de la clase es ordenado, estructurado y se relaciona con lo avanzado.]",
        "desarrollo",
    ),
    (
        "2. VALORA EL DESEMPEÑO DEL DOCENTE CON RELACIÓN A LOS SIGUIENTES CREITERIOS: [Aplica estrategias y técnicas que ayudan a comprender mejor los contenidos.]",
        "estrategias",
    ),
    (
        "2. VALORA EL DESEMPEÑO DEL DOCENTE CON RELACIÓN A LOS SIGUIENTES CREITERIOS: [Sus explicaciones son claras y refuerzan lo aprendido.]",
        "claridad",
    ),
    (
        "2. VALORA EL DESEMPEÑO DEL DOCENTE CON RELACIÓN A LOS SIGUIENTES CREITERIOS: [Asigna tareas y/o actividades que me preparan para tener un rendimiento satisfactorio en la asignatura.]",
        "tareas",
    ),
    (
        "2. VALORA EL DESEMPEÑO DEL DOCENTE CON RELACIÓN A LOS SIGUIENTES CREITERIOS: [Constantemente brinda retroalimentación/información precisa, oportuna y constructiva de mis logros, fortalezas, debilidades y aspectos a mejorar, que me ayudan a progresar en mi desempeño académico.]",
        "retroalimentación",
    ),
    (
        "3. EN GENERAL, ¿CÓMO EVALUARÍAS EL DESEMPEÑO DEL DOCENTE?",
        "evaluacion_docente_general",
    ),
    (
        "4. MENCIONA ASPECTOS POSITIVOS Y/O ASPECTOS EN LOS QUE EL DOCENTE NECESITA TRABAJAR PARA MEJORAR SU DESEMPEÑO.",
        "comentarios",
    ),
];

pub fn canonical_field(header: &str) -> Option<&'static str> {
    let header = header.trim();
    QUESTION_FIELDS
        .iter()
        .find(|(question, _)| *question == header)
        .map(|(_, field)| *field)
}

/// Renames known question headers in place. Unknown and already-renamed
/// headers are left untouched, so the operation is idempotent.
pub fn normalize_columns(mut table: SurveyTable) -> SurveyTable {
    for header in table.headers.iter_mut() {
        if let Some(field) = canonical_field(header) {
            *header = field.to_string();
        }
    }
    table
}
