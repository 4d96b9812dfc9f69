//! Child-process engine adapters.
//!
//! The heavy engines (document OCR, speech recognition, video demux) live
//! outside this process as vendor CLI wrappers sharing one invocation
//! contract:
//!
//! ```text
//! <binary> --input <file> --output-dir <dir> [--lang <code>] [--<option> <value>...]
//! ```
//!
//! The wrapper writes its artifacts under the output directory and exits
//! non-zero on failure with diagnostics on stderr. Availability is simply
//! "the binary is on PATH"; a worker without, say, the audio toolchain keeps
//! serving document tasks while audio tasks fail with a descriptive error.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::dispatch::names;
use crate::engine::{self, Engine, ParseOutput};
use crate::error::EngineError;

/// How much trailing stderr to keep in a failure message.
const STDERR_TAIL_BYTES: usize = 2000;

pub struct CommandEngine {
    name: &'static str,
    description: &'static str,
    extensions: &'static [&'static str],
    binary: String,
    /// Option keys forwarded to the child as `--key value` flags.
    forwarded_options: &'static [&'static str],
    /// Whether the adapter translates submission language codes for the child.
    maps_language: bool,
}

impl CommandEngine {
    fn new(
        name: &'static str,
        description: &'static str,
        extensions: &'static [&'static str],
        forwarded_options: &'static [&'static str],
        maps_language: bool,
    ) -> Self {
        // Deployments relocate vendor CLIs via e.g. DOCFLOW_DEEPSEEK_OCR_BIN.
        let env_key = format!("DOCFLOW_{}_BIN", name.replace('-', "_").to_uppercase());
        let binary = std::env::var(env_key).unwrap_or_else(|_| name.to_string());
        Self {
            name,
            description,
            extensions,
            binary,
            forwarded_options,
            maps_language,
        }
    }

    /// Default document pipeline for PDFs and images.
    pub fn pipeline() -> Self {
        Self::new(
            names::PIPELINE,
            "Default PDF/image parsing pipeline with formula and table support",
            &["pdf", "png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"],
            &["method", "formula_enable", "table_enable"],
            true,
        )
    }

    pub fn deepseek_ocr() -> Self {
        Self::new(
            names::DEEPSEEK_OCR,
            "High-accuracy OCR engine with configurable resolution and prompt modes",
            &["pdf", "png", "jpg", "jpeg"],
            &["deepseek_resolution", "deepseek_prompt_type"],
            false,
        )
    }

    pub fn paddleocr_vl() -> Self {
        Self::new(
            names::PADDLEOCR_VL,
            "Vision-language OCR engine with automatic language detection",
            &["pdf", "png", "jpg", "jpeg"],
            &[],
            false,
        )
    }

    pub fn sensevoice() -> Self {
        Self::new(
            names::SENSEVOICE,
            "Speech recognition engine with multi-language detection",
            &["mp3", "wav", "m4a", "flac", "ogg", "aac", "wma", "opus"],
            &[],
            true,
        )
    }

    pub fn video() -> Self {
        Self::new(
            names::VIDEO,
            "Video processing engine: audio extraction and transcription",
            &["mp4", "avi", "mkv", "mov", "flv", "webm", "m4v", "wmv", "mpeg", "mpg"],
            &["keep_audio"],
            true,
        )
    }

    /// Override the wrapped binary (tests, non-PATH installs).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn build_args(&self, input: &Path, output_dir: &Path, options: &Value) -> Vec<String> {
        let mut args = vec![
            "--input".to_string(),
            input.to_string_lossy().into_owned(),
            "--output-dir".to_string(),
            output_dir.to_string_lossy().into_owned(),
        ];

        if self.maps_language {
            let lang = options
                .get("lang")
                .and_then(|v| v.as_str())
                .unwrap_or("auto");
            args.push("--lang".to_string());
            args.push(map_language_code(lang).to_string());
        }

        for key in self.forwarded_options {
            if let Some(value) = options.get(*key) {
                args.push(format!("--{}", key.replace('_', "-")));
                args.push(render_option_value(value));
            }
        }

        args
    }
}

/// Translate submission language codes to the codes the speech/video
/// toolchain expects. Unknown codes pass through unchanged.
fn map_language_code(lang: &str) -> &str {
    match lang {
        "ch" => "zh",
        "korean" => "ko",
        "japan" => "ja",
        other => other,
    }
}

fn render_option_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Engine for CommandEngine {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    fn supported_extensions(&self) -> &[&str] {
        self.extensions
    }

    fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    async fn parse(
        &self,
        input: &Path,
        output_dir: &Path,
        options: &Value,
    ) -> Result<ParseOutput, EngineError> {
        let args = self.build_args(input, output_dir, options);
        debug!(engine = %self.name, binary = %self.binary, ?args, "Spawning engine process");

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| EngineError::Unavailable {
                engine: self.name.to_string(),
                hint: format!("Failed to start '{}': {}", self.binary, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut tail_start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
            while !stderr.is_char_boundary(tail_start) {
                tail_start += 1;
            }
            warn!(engine = %self.name, status = ?output.status.code(), "Engine process failed");
            return Err(EngineError::Failed(format!(
                "{} exited with {}: {}",
                self.binary,
                output.status,
                stderr[tail_start..].trim()
            )));
        }

        let artifacts = engine::find_artifacts(output_dir);
        if artifacts.markdown_path.is_none() {
            return Err(EngineError::NoOutput(self.name.to_string()));
        }
        Ok(artifacts)
    }
}
