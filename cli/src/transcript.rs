//! Conversation and response log files.
//!
//! Every run appends to `{dir}/{stem}_conversation` and writes the bare response to
//! `{dir}/{stem}_{tag}_response_{timestamp}`, where `stem` is the prompt file's name
//! without its extension.
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Local;
use color_eyre::{
    Result,
    eyre::{WrapErr as _, eyre},
};
use log::debug;
use strum::Display;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Tag {
    Claude,
    Gemini,
    Vertex,
    OpenAI,
}

/// Where one run's logs go. Created when the prompt has been read.
#[derive(Debug, Clone)]
pub struct Transcript {
    dir: PathBuf,
    stem: String,
    timestamp: String,
    tag: Tag,
}

/// Paths that were written, for reporting back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub conversation: PathBuf,
    pub response: PathBuf,
}

impl Transcript {
    pub fn new(dir: impl Into<PathBuf>, prompt_file: &Path, tag: Tag) -> Result<Self> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        Self::with_timestamp(dir, prompt_file, tag, timestamp)
    }

    pub fn with_timestamp(
        dir: impl Into<PathBuf>,
        prompt_file: &Path,
        tag: Tag,
        timestamp: String,
    ) -> Result<Self> {
        let stem = prompt_file
            .file_stem()
            .ok_or(eyre!("Prompt file has no file name"))?
            .to_string_lossy()
            .into_owned();

        Ok(Self {
            dir: dir.into(),
            stem,
            timestamp,
            tag,
        })
    }

    pub fn conversation_path(&self) -> PathBuf {
        self.dir.join(format!("{}_conversation", self.stem))
    }

    pub fn response_path(&self) -> PathBuf {
        self.dir.join(format!(
            "{}_{}_response_{}",
            self.stem, self.tag, self.timestamp
        ))
    }

    /// `{ts}\n{prompt}\n{ts}\n{response}\n`
    pub fn write_plain(&self, prompt: &str, response: &str) -> Result<Written> {
        let ts = &self.timestamp;
        self.write(&format!("{ts}\n{prompt}\n{ts}\n{response}\n"), response)
    }

    /// Same as the streamed entry, written in one go.
    pub fn write_banner(&self, prompt: &str, response: &str) -> Result<Written> {
        let entry = format!("{}{response}\n\n", self.banner(prompt));
        self.write(&entry, response)
    }

    /// Opens both files and writes the prompt banner before the response exists.
    /// Text is then fed through [`StreamingTranscript::sinks`].
    pub fn open_stream(&self, prompt: &str) -> Result<StreamingTranscript> {
        self.create_dir()?;
        let written = self.paths();

        let mut conversation = open_append(&written.conversation)?;
        let response = File::create(&written.response)
            .wrap_err_with(|| format!("Couldn't create {}", written.response.display()))?;

        conversation.write_all(self.banner(prompt).as_bytes())?;
        conversation.flush()?;

        Ok(StreamingTranscript {
            conversation,
            response,
            written,
        })
    }

    fn banner(&self, prompt: &str) -> String {
        let ts = &self.timestamp;
        format!("--- Prompt: {ts} ---\n{prompt}\n--- Response: {ts} ---\n")
    }

    fn paths(&self) -> Written {
        Written {
            conversation: self.conversation_path(),
            response: self.response_path(),
        }
    }

    fn create_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .wrap_err_with(|| format!("Couldn't create log dir {}", self.dir.display()))
    }

    /// Both files are attempted even if the first one fails.
    fn write(&self, entry: &str, response: &str) -> Result<Written> {
        self.create_dir()?;
        let written = self.paths();

        debug!("Appending to {}", written.conversation.display());
        let conversation = open_append(&written.conversation).and_then(|mut file| {
            file.write_all(entry.as_bytes())
                .wrap_err("Error writing conversation log")
        });

        debug!("Writing {}", written.response.display());
        let response =
            fs::write(&written.response, response).wrap_err("Error writing response file");

        match (conversation, response) {
            (Ok(()), Ok(())) => Ok(written),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(conv), Err(resp)) => Err(eyre!("{conv:#}\n{resp:#}")),
        }
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("Couldn't open {}", path.display()))
}

pub struct StreamingTranscript {
    conversation: File,
    response: File,
    written: Written,
}

impl StreamingTranscript {
    pub fn sinks(&mut self) -> [&mut dyn Write; 2] {
        [&mut self.conversation, &mut self.response]
    }

    /// Terminates the conversation entry.
    pub fn finish(mut self) -> Result<Written> {
        self.conversation.write_all(b"\n\n")?;
        self.conversation.flush()?;
        self.response.flush()?;
        Ok(self.written)
    }
}
