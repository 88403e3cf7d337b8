// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::BTreeMap, env, fs, path::PathBuf};

use crate::{
    cnpj::PaddingPolicy,
    fetch::RetryPolicy,
    process::{AliasTable, LedgerField, NormalizeOptions},
};

pub const DEFAULT_BASE_URL: &str = "https://dadosabertos.ans.gov.br/FTP/PDA/demonstracoes_contabeis/";
pub const DEFAULT_OPERATORS_URL: &str =
    "https://dadosabertos.ans.gov.br/FTP/PDA/operadoras_de_plano_de_saude_ativas/Relatorio_cadop.csv";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub operators_url: String,
    /// How many of the most recent quarters to ingest.
    pub quarters: usize,
    pub download_dir: PathBuf,
    pub output_dir: PathBuf,
    pub max_concurrent_downloads: usize,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    /// Work archives on a rayon pool.
    pub parallel: bool,
    pub cnpj_padding: PaddingPolicy,
    pub description_filter: Option<String>,
    /// Header names to accept on top of the built-in ones.
    pub column_aliases: BTreeMap<LedgerField, Vec<String>>,
    /// Skip the network and use whatever is already in `download_dir`.
    pub offline: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            operators_url: DEFAULT_OPERATORS_URL.to_string(),
            quarters: 3,
            download_dir: PathBuf::from("zips"),
            output_dir: PathBuf::from("output"),
            max_concurrent_downloads: 3,
            max_retries: 3,
            initial_backoff_ms: 500,
            parallel: false,
            cnpj_padding: PaddingPolicy::Reject,
            description_filter: None,
            column_aliases: BTreeMap::new(),
            offline: false,
        }
    }
}

impl Config {
    /// Defaults, then the YAML file named by `ANS_CONFIG`, then `ANS_*` overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match env::var("ANS_CONFIG") {
            Ok(path) => Self::from_yaml_file(&path)?,
            Err(_) => Self::default(),
        };
        cfg.apply_env(|k| env::var(k).ok())?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config {}", path))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply overrides from `lookup` (the process environment outside tests).
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) -> Result<()> {
        if let Some(dir) = lookup("ANS_DATA_DIR") {
            let base = PathBuf::from(dir);
            self.download_dir = base.join("zips");
            self.output_dir = base.join("output");
        }
        if let Some(q) = lookup("ANS_QUARTERS") {
            self.quarters = q
                .trim()
                .parse()
                .with_context(|| format!("ANS_QUARTERS={q:?} is not a number"))?;
        }
        if let Some(p) = lookup("ANS_PARALLEL") {
            self.parallel = matches!(p.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(p) = lookup("ANS_OFFLINE") {
            self.offline = matches!(p.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(p) = lookup("ANS_CNPJ_PADDING") {
            self.cnpj_padding = p.parse::<PaddingPolicy>().context("ANS_CNPJ_PADDING")?;
        }
        if let Some(f) = lookup("ANS_DESCRIPTION_FILTER") {
            self.description_filter = Some(f).filter(|f| !f.trim().is_empty());
        }
        Ok(())
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        let mut aliases = AliasTable::with_defaults();
        for (field, names) in &self.column_aliases {
            for name in names {
                aliases.add_alias(*field, name);
            }
        }
        NormalizeOptions {
            aliases,
            description_filter: self.description_filter.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff_ms: self.initial_backoff_ms,
        }
    }
}
