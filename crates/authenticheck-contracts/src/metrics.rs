use serde::Serialize;

pub const METRICS_TITLE: &str = "Our Model's Performance";

/// One published performance figure for the verification model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelMetric {
    pub name: &'static str,
    pub value: &'static str,
    pub description: &'static str,
}

/// Fixed figures shown alongside results. Informational only; nothing in
/// the pipeline measures them.
pub const MODEL_METRICS: [ModelMetric; 3] = [
    ModelMetric {
        name: "Accuracy",
        value: "99.2%",
        description: "Overall correctness of the model in distinguishing authentic vs. counterfeit products.",
    },
    ModelMetric {
        name: "Precision / Recall",
        value: "0.98 / 0.97",
        description: "Model ability to correctly identify counterfeits and not miss any.",
    },
    ModelMetric {
        name: "F1-Score",
        value: "0.975",
        description: "A weighted average of Precision and Recall, showing model robustness.",
    },
];
