//! Filesystem-backed source catalog, converter and rendition fetcher.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};

use crate::models::enums::RenditionFormat;
use crate::models::{SourceDocument, MIME_TYPE_DOC, MIME_TYPE_DOCX};
use crate::pipeline::conversion::{ConversionError, ConversionRequest, DocumentConverter, SourceCatalog};
use crate::pipeline::extraction::{ExtractionError, RenditionFetcher};

/// Word documents in one local folder (not recursive).
pub struct LocalFolderCatalog {
    folder: PathBuf,
}

impl LocalFolderCatalog {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }
}

fn mime_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "doc" => Some(MIME_TYPE_DOC),
        "docx" => Some(MIME_TYPE_DOCX),
        _ => None,
    }
}

impl SourceCatalog for LocalFolderCatalog {
    fn list_documents(&self) -> Result<Vec<SourceDocument>, ConversionError> {
        if !self.folder.is_dir() {
            return Err(ConversionError::Catalog(format!(
                "source folder {} does not exist",
                self.folder.display()
            )));
        }

        let mut documents = Vec::new();
        for entry in fs::read_dir(&self.folder)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            // Word lock files
            if name.starts_with('~') {
                continue;
            }
            let Some(mime) = mime_for(&path) else {
                continue;
            };
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified: DateTime<Utc> = metadata.modified()?.into();
            documents.push(SourceDocument {
                id: path.to_string_lossy().into_owned(),
                name,
                modified_at: modified.naive_utc(),
                mime_type: mime.to_string(),
            });
        }
        tracing::debug!(folder = %self.folder.display(), found = documents.len(), "Source folder scanned");
        Ok(documents)
    }
}

/// Runs an external converter command once per rendition.
///
/// The template is split on whitespace and each argument may contain the
/// placeholders `{input}`, `{output}`, `{outdir}` and `{format}`. The
/// converter must leave `<outdir>/<stem>.<ext>` behind.
pub struct CommandConverter {
    template: Vec<String>,
    output_root: PathBuf,
}

impl CommandConverter {
    pub fn new(template: &str, output_root: impl Into<PathBuf>) -> Result<Self, ConversionError> {
        let template: Vec<String> = template.split_whitespace().map(str::to_string).collect();
        if template.is_empty() {
            return Err(ConversionError::Catalog("converter command is empty".into()));
        }
        Ok(Self {
            template,
            output_root: output_root.into(),
        })
    }

    /// File extension the converter is asked for.
    pub fn extension(format: RenditionFormat) -> &'static str {
        match format {
            RenditionFormat::Structured => "html",
            RenditionFormat::Markup => "xhtml",
            RenditionFormat::Visual => "pdf",
        }
    }

    fn failure(request: &ConversionRequest<'_>, reason: String) -> ConversionError {
        ConversionError::Converter {
            name: request.name.to_string(),
            format: request.format,
            reason,
        }
    }
}

impl DocumentConverter for CommandConverter {
    fn convert(&self, request: &ConversionRequest<'_>) -> Result<String, ConversionError> {
        let input = match (request.format, request.structured_ref) {
            (RenditionFormat::Structured, _) | (_, None) => request.source_ref,
            (_, Some(structured)) => structured,
        };
        let ext = Self::extension(request.format);
        let outdir = self.output_root.join(request.format.as_str());
        fs::create_dir_all(&outdir)?;

        let stem = Path::new(input)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| Self::failure(request, format!("input {input} has no file name")))?;
        let output = outdir.join(format!("{stem}.{ext}"));

        let outdir_str = outdir.to_string_lossy();
        let output_str = output.to_string_lossy();
        let args: Vec<String> = self
            .template
            .iter()
            .map(|arg| {
                arg.replace("{input}", input)
                    .replace("{output}", &output_str)
                    .replace("{outdir}", &outdir_str)
                    .replace("{format}", ext)
            })
            .collect();

        tracing::debug!(command = ?args, "Running converter");
        let result = Command::new(&args[0])
            .args(&args[1..])
            .output()
            .map_err(|e| Self::failure(request, format!("could not start {}: {e}", args[0])))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Self::failure(
                request,
                format!("exit {}: {}", result.status, stderr.trim()),
            ));
        }
        if !output.is_file() {
            return Err(Self::failure(
                request,
                format!("expected output {} was not produced", output.display()),
            ));
        }
        Ok(output.to_string_lossy().into_owned())
    }
}

/// Reads rendition bytes from a local path.
pub struct LocalRenditionFetcher;

impl RenditionFetcher for LocalRenditionFetcher {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, ExtractionError> {
        fs::read(reference).map_err(|e| ExtractionError::Document {
            reference: reference.to_string(),
            reason: e.to_string(),
        })
    }
}
