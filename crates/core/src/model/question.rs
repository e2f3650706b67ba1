use std::collections::HashMap;

use crate::model::{CaseId, ParameterId, QuestionId};

/// A cephalometric parameter shown as one row of the case table.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub id: ParameterId,
    pub name: String,
    pub description: Option<String>,
    pub reference_values: Option<String>,
}

/// Measured values of one parameter at the case's three ages.
///
/// `value3` stays unknown until the educational reveal fills it in.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParameterValues {
    pub value1: Option<f64>,
    pub value2: Option<f64>,
    pub value3: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseParameter {
    pub parameter: Parameter,
    pub values: ParameterValues,
}

/// Patient case behind a question.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseData {
    pub id: CaseId,
    pub code: String,
    pub gender: String,
    pub age1: Option<f64>,
    pub age2: Option<f64>,
    pub age3: Option<f64>,
    pub parameters: Vec<CaseParameter>,
}

impl CaseData {
    /// Fill in third-age data keyed by parameter id.
    ///
    /// Parameters absent from `reveal`, or revealed as `null`, keep what they had.
    pub fn merge_reveal(&mut self, reveal: &RevealValues) {
        if let Some(age3) = reveal.age3 {
            self.age3 = Some(age3);
        }
        for row in &mut self.parameters {
            if let Some(Some(value3)) = reveal.values.get(&row.parameter.id) {
                row.values.value3 = Some(*value3);
            }
        }
    }

    #[must_use]
    pub fn parameter(&self, id: ParameterId) -> Option<&CaseParameter> {
        self.parameters.iter().find(|row| row.parameter.id == id)
    }
}

/// Supplemental third-age data fetched after a reveal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevealValues {
    pub age3: Option<f64>,
    pub values: HashMap<ParameterId, Option<f64>>,
}

impl RevealValues {
    #[must_use]
    pub fn new(age3: Option<f64>, values: impl IntoIterator<Item = (ParameterId, Option<f64>)>) -> Self {
        Self {
            age3,
            values: values.into_iter().collect(),
        }
    }
}

/// One question instance as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionView {
    pub id: QuestionId,
    pub prompt: Option<String>,
    /// Display order is meaningful.
    pub options: Vec<String>,
    pub prediction_age: Option<f64>,
    pub case: CaseData,
    /// Only known after an educational submission.
    pub correct_option: Option<String>,
    pub is_last: bool,
}

impl QuestionView {
    #[must_use]
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|candidate| candidate == option)
    }
}
