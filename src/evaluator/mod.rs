// src/evaluator/mod.rs — Turning completions into answers
//
// Free-text answers go through `answer`, generated programs through `code`
// and `sandbox`, and the structured router/critique completions through
// `parser`. Nothing here returns an error for bad model output: failures
// degrade to `None`.

pub mod answer;
pub mod code;
pub mod parser;
pub mod sandbox;

pub use answer::{extract_choice, extract_numeric_answer};
pub use sandbox::{execute_and_get_answer, CodeExecutor, PythonSandbox};
