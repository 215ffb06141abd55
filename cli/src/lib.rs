use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::{Result, eyre::WrapErr as _};
use serde::de::DeserializeOwned;

pub mod config;
pub mod credentials;
pub mod relay;
pub mod transcript;
pub mod usage;

pub use config::Config;

const CONFIG_FILE_NAME: &str = "prompt_tools.ron";

pub const LOG_DIR: &str = "log";
pub const DEFAULT_SYSTEM_PROMPT_FILE: &str = "system_prompts/coding_000000";

/// The prompt and system prompt every text tool takes.
#[derive(Debug, clap::Args)]
pub struct PromptArgs {
    /// Path to a file containing the prompt text.
    #[arg(long, value_parser = existing_file)]
    pub prompt_file: PathBuf,

    /// Path to a file containing the system prompt text.
    #[arg(long, value_parser = existing_file, default_value = DEFAULT_SYSTEM_PROMPT_FILE)]
    pub system_prompt_file: PathBuf,
}

impl PromptArgs {
    /// Returns `(prompt, system_prompt)`.
    pub fn read(&self) -> Result<(String, String)> {
        let prompt = read_prompt(&self.prompt_file, "prompt file")?;
        let system = read_prompt(&self.system_prompt_file, "system prompt file")?;
        Ok((prompt, system))
    }
}

/// clap value parser for paths that have to exist up front.
pub fn existing_file(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("Path '{s}' does not exist."))
    }
}

pub fn read_prompt(path: &Path, what: &str) -> Result<String> {
    fs::read_to_string(path).wrap_err_with(|| format!("Error reading {what} {}", path.display()))
}

pub fn load_ron_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let src = fs::read_to_string(path)?;
    ron::from_str(&src).wrap_err_with(|| format!("Invalid RON in {}", path.display()))
}

/// `None` when the platform has no local config dir.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_local_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod test {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn existing_file_parser() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert_eq!(existing_file(path).unwrap(), file.path());

        let err = existing_file("/definitely/not/here").unwrap_err();
        assert_eq!(err, "Path '/definitely/not/here' does not exist.");
    }

    #[test]
    fn prompt_args_read_both_files() {
        let mut prompt = tempfile::NamedTempFile::new().unwrap();
        write!(prompt, "What is Rust?").unwrap();
        let mut system = tempfile::NamedTempFile::new().unwrap();
        write!(system, "Be brief").unwrap();

        let args = PromptArgs {
            prompt_file: prompt.path().to_owned(),
            system_prompt_file: system.path().to_owned(),
        };
        let (p, s) = args.read().unwrap();
        assert_eq!(p, "What is Rust?");
        assert_eq!(s, "Be brief");
    }

    #[test]
    fn unreadable_prompt_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_prompt(&dir.path().join("missing"), "prompt file").unwrap_err();
        assert!(err.to_string().starts_with("Error reading prompt file"));
    }
}
