//! Model asset download into the local cache.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;

use crate::error::{Error, Result};

/// ONNX export locations tried, in order, inside a Hugging Face repo.
const ONNX_CANDIDATES: &[&str] = &["onnx/model.onnx", "model.onnx"];
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Local paths of a transformer's ONNX graph and tokenizer.
#[derive(Debug, Clone)]
pub struct TransformerAssets {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

impl TransformerAssets {
    /// Assets laid out flat in `dir` (`model.onnx`, `tokenizer.json`).
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            model_path: dir.join("model.onnx"),
            tokenizer_path: dir.join(TOKENIZER_FILE),
        }
    }

    pub fn exist(&self) -> bool {
        self.model_path.exists() && self.tokenizer_path.exists()
    }
}

/// URL of `file` on the `main` revision of `repo`.
pub fn hf_file_url(endpoint: &str, repo: &str, file: &str) -> String {
    format!("{}/{repo}/resolve/main/{file}", endpoint.trim_end_matches('/'))
}

/// Cache directory for a hub repo: `<cache>/transformers/<owner>--<name>`.
pub fn repo_cache_dir(cache_dir: &Path, repo: &str) -> PathBuf {
    cache_dir.join("transformers").join(repo.replace('/', "--"))
}

/// Return cached assets for `repo`, downloading whatever is missing.
pub fn ensure_transformer_assets(
    cache_dir: &Path,
    endpoint: &str,
    repo: &str,
) -> Result<TransformerAssets> {
    let dir = repo_cache_dir(cache_dir, repo);
    let assets = TransformerAssets::in_dir(&dir);
    if assets.exist() {
        return Ok(assets);
    }

    ensure_tokenizer(cache_dir, endpoint, repo)?;

    if !assets.model_path.exists() {
        let mut found = false;
        for candidate in ONNX_CANDIDATES {
            tracing::info!(repo, file = candidate, "downloading ONNX model");
            if download_file(&hf_file_url(endpoint, repo, candidate), &assets.model_path)? {
                found = true;
                break;
            }
        }
        if !found {
            return Err(Error::Download(format!(
                "{repo} has no ONNX export (tried {})",
                ONNX_CANDIDATES.join(", ")
            )));
        }
    }

    tracing::info!(repo, dir = %dir.display(), "model assets ready");
    Ok(assets)
}

/// Return the cached `tokenizer.json` of `repo`, downloading it if missing.
pub fn ensure_tokenizer(cache_dir: &Path, endpoint: &str, repo: &str) -> Result<PathBuf> {
    let dir = repo_cache_dir(cache_dir, repo);
    let path = dir.join(TOKENIZER_FILE);
    if path.exists() {
        return Ok(path);
    }
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create cache dir: {}", dir.display()))?;
    tracing::info!(repo, "downloading tokenizer.json");
    if !download_file(&hf_file_url(endpoint, repo, TOKENIZER_FILE), &path)? {
        return Err(Error::Download(format!("{repo} has no {TOKENIZER_FILE}")));
    }
    Ok(path)
}

/// Return the cached word-vector file for `name`, downloading it from the
/// `{name}` URL template when one is configured.
pub fn ensure_word_vectors(
    cache_dir: &Path,
    name: &str,
    url_template: Option<&str>,
) -> Result<Option<PathBuf>> {
    let path = cache_dir.join("word").join(format!("{name}.vec"));
    if path.exists() {
        return Ok(Some(path));
    }
    let Some(template) = url_template else {
        return Ok(None);
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create cache dir: {}", parent.display()))?;
    }
    let url = template.replace("{name}", name);
    tracing::info!(name, %url, "downloading word vectors");
    Ok(download_file(&url, &path)?.then_some(path))
}

/// Download a file with a progress bar. Uses atomic write (tmp + rename).
///
/// Returns `Ok(false)` when the server answers 404.
pub fn download_file(url: &str, dest: &Path) -> Result<bool> {
    let mut response = reqwest::blocking::get(url)
        .map_err(|e| Error::Download(format!("HTTP request failed for {url}: {e}")))?;

    if response.status() == StatusCode::NOT_FOUND {
        return Ok(false);
    }
    if !response.status().is_success() {
        return Err(Error::Download(format!(
            "{url} failed with HTTP {}",
            response.status()
        )));
    }

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            if let Ok(style) =
                ProgressStyle::default_bar().template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
            {
                pb.set_style(style.progress_chars("##-"));
            }
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let mut reader = pb.wrap_read(&mut response);
    persist(&mut reader, dest).map_err(|e| match e {
        Error::Io(io) => Error::Download(format!("error reading {url}: {io}")),
        other => other,
    })?;

    pb.finish_and_clear();
    Ok(true)
}

/// Stream `reader` into `dest` through a sibling `.tmp` file, removing the
/// temp file if anything fails.
fn persist(reader: &mut impl Read, dest: &Path) -> Result<()> {
    let tmp_path = dest.with_extension("tmp");
    let result = write_then_rename(reader, &tmp_path, dest);
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

fn write_then_rename(reader: &mut impl Read, tmp_path: &Path, dest: &Path) -> Result<()> {
    let mut file = File::create(tmp_path)
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;
    std::io::copy(reader, &mut file)?;
    file.flush()?;
    drop(file);
    std::fs::rename(tmp_path, dest).context("failed to rename temp file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_url_layout() {
        assert_eq!(
            hf_file_url("https://huggingface.co/", "google-bert/bert-base-cased", "tokenizer.json"),
            "https://huggingface.co/google-bert/bert-base-cased/resolve/main/tokenizer.json"
        );
    }

    #[test]
    fn repo_dir_flattens_namespace() {
        let dir = repo_cache_dir(Path::new("/cache"), "google-bert/bert-base-cased");
        assert_eq!(dir, PathBuf::from("/cache/transformers/google-bert--bert-base-cased"));
    }

    #[test]
    fn cached_assets_skip_download() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = repo_cache_dir(tmp.path(), "local/model");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("model.onnx"), b"onnx").unwrap();
        std::fs::write(dir.join("tokenizer.json"), b"{}").unwrap();

        // An unroutable endpoint proves no request is made.
        let assets = ensure_transformer_assets(tmp.path(), "http://127.0.0.1:1", "local/model").unwrap();
        assert_eq!(assets.model_path, dir.join("model.onnx"));
    }

    #[test]
    fn word_vectors_without_template_are_absent() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(ensure_word_vectors(tmp.path(), "glove", None).unwrap().is_none());
    }

    #[test]
    fn cached_word_vectors_found() {
        let tmp = tempfile::tempdir().unwrap();
        let word_dir = tmp.path().join("word");
        std::fs::create_dir_all(&word_dir).unwrap();
        std::fs::write(word_dir.join("glove.vec"), "a 1 2\n").unwrap();
        let path = ensure_word_vectors(tmp.path(), "glove", None).unwrap();
        assert_eq!(path, Some(word_dir.join("glove.vec")));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn persist_writes_dest() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("model.onnx");
        persist(&mut &b"onnx"[..], &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"onnx");
        assert!(!dest.with_extension("tmp").exists());
    }

    #[test]
    fn failed_read_removes_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("model.onnx");
        assert!(persist(&mut FailingReader, &dest).is_err());
        assert!(!dest.with_extension("tmp").exists());
        assert!(!dest.exists());
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let tmp = tempfile::tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file.
        let dest = tmp.path().join("model.onnx");
        std::fs::create_dir_all(dest.join("occupied")).unwrap();
        assert!(persist(&mut &b"onnx"[..], &dest).is_err());
        assert!(!dest.with_extension("tmp").exists());
    }
}
