//! Plain-text views of the quiz state.

use quiz_core::model::{QuestionView, SessionResults};
use services::{Controls, Phase, QuizFlow};

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "?".to_string(), |value| format!("{value:.1}"))
}

/// The current question with its case table and options.
pub fn question(flow: &QuizFlow) -> String {
    let Some(question) = flow.question() else {
        return match flow.phase() {
            Phase::Loading => "No question loaded. Type `n` to try again.\n".to_string(),
            _ => String::new(),
        };
    };

    let revealed = flow.phase() == Phase::Revealed;
    let mut lines = vec![
        String::new(),
        format!(
            "Question {} ({}){}",
            flow.questions_seen(),
            flow.mode(),
            if question.is_last { ", last" } else { "" }
        ),
    ];
    lines.extend(case_table(question, revealed));
    if let Some(prompt) = &question.prompt {
        lines.push(String::new());
        lines.push(prompt.clone());
    }
    lines.push(String::new());

    for (index, option) in question.options.iter().enumerate() {
        let chosen = flow.selected() == Some(option.as_str());
        let correct = flow.correct_option() == Some(option.as_str());
        lines.push(format!(
            "  {} {}) {}{}",
            if chosen { '*' } else { ' ' },
            index + 1,
            option,
            if correct { "  <- correct" } else { "" }
        ));
    }

    lines.push(String::new());
    lines.push(hint(flow.controls(), question.options.len()));
    if let Some(left) = flow.time_left() {
        lines.push(format!("{left}s left"));
    }
    lines.push(String::new());
    lines.join("\n")
}

fn case_table(question: &QuestionView, revealed: bool) -> Vec<String> {
    let case = &question.case;
    let third = if revealed { cell(case.age3) } else { "?".to_string() };
    let mut lines = vec![format!(
        "Case {}  gender {}  ages {} / {} / {}",
        case.code,
        case.gender,
        cell(case.age1),
        cell(case.age2),
        third
    )];
    if let Some(age) = question.prediction_age {
        lines.push(format!("Predict for age {age:.1}"));
    }

    let width = case
        .parameters
        .iter()
        .map(|row| row.parameter.name.len())
        .max()
        .unwrap_or(0)
        .max("Parameter".len());
    lines.push(format!(
        "{:<width$}  {:>8}  {:>8}  {:>8}",
        "Parameter", "Age 1", "Age 2", "Age 3"
    ));
    for row in &case.parameters {
        let value3 = if revealed {
            cell(row.values.value3)
        } else {
            "?".to_string()
        };
        lines.push(format!(
            "{:<width$}  {:>8}  {:>8}  {:>8}",
            row.parameter.name,
            cell(row.values.value1),
            cell(row.values.value2),
            value3
        ));
    }
    lines
}

/// One-line list of the commands currently accepted.
pub fn hint(controls: Controls, options: usize) -> String {
    let mut parts = Vec::new();
    if options > 0 {
        parts.push(format!("[1-{options}] choose"));
    }
    if controls.next {
        parts.push("n next".to_string());
    }
    if controls.reveal {
        parts.push("s show answer".to_string());
    }
    if controls.finish {
        parts.push("f finish".to_string());
    }
    if controls.report {
        parts.push("r <text> report a problem".to_string());
    }
    parts.push("q quit".to_string());
    parts.join("  ")
}

pub fn results(results: &SessionResults) -> String {
    let mut lines = vec![format!("Session {}", results.session_id)];
    if let Some(mode) = results.mode {
        lines.push(format!("Mode: {mode}"));
    }
    if let Some(started) = &results.start_time {
        lines.push(format!("Started: {started}"));
    }
    lines.push(format!(
        "Correct: {} / {} ({:.0}%)",
        results.correct_answers,
        results.total_questions,
        results.accuracy * 100.0
    ));
    for (index, answer) in results.questions.iter().enumerate() {
        lines.push(format!(
            "  {:>3}. {} {}",
            index + 1,
            if answer.is_correct { '+' } else { '-' },
            answer.answer
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}
