// src/infra/paths.rs — Config, output and unfinished-log locations
//
// MATHSEL_CONFIG overrides the config file location; otherwise
// `mathsel.toml` in the working directory is used.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use crate::provider::backbone::Backbone;

pub const CONFIG_FILE_NAME: &str = "mathsel.toml";

pub fn config_file_path() -> PathBuf {
    std::env::var_os("MATHSEL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Parameters that name one run's result file.
#[derive(Debug, Clone)]
pub struct RunName<'a> {
    pub dataset: &'a str,
    pub k_fewshot: usize,
    pub sc_num: u32,
    pub start: usize,
    pub end: usize,
}

/// `<output_dir>/<backbone>/<dataset>_k<k>_sc<sc>_s<start>_e<end>_<MM_DD_HH_MM>.jsonl`
pub fn results_path(
    output_dir: &Path,
    backbone: Backbone,
    name: &RunName<'_>,
    now: DateTime<Local>,
) -> PathBuf {
    // Path-like dataset values are named by their file stem.
    let dataset = Path::new(name.dataset)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.dataset.to_string());
    output_dir.join(backbone.as_str()).join(format!(
        "{}_k{}_sc{}_s{}_e{}_{}.jsonl",
        dataset,
        name.k_fewshot,
        name.sc_num,
        name.start,
        name.end,
        now.format("%m_%d_%H_%M")
    ))
}

/// `<dir>/unfinished/<stem>_unfinished.jsonl` next to a results file.
pub fn unfinished_path(results: &Path) -> PathBuf {
    let dir = results.parent().unwrap_or_else(|| Path::new("."));
    let stem = results
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results".into());
    dir.join("unfinished")
        .join(format!("{stem}_unfinished.jsonl"))
}

/// Sibling file holding the run's configuration snapshot.
pub fn args_path(log: &Path) -> PathBuf {
    let mut name = log.as_os_str().to_os_string();
    name.push(".args");
    PathBuf::from(name)
}
