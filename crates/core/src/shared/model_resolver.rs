use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::constants::{APP_DIR_NAME, MODEL_DIR_ENV};

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model {name} not found; searched: {}", display_paths(.searched))]
    NotFound { name: String, searched: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve a model file by name.
///
/// Resolution order:
/// 1. `$AGESIGHT_MODEL_DIR`
/// 2. `configured_dir` (from settings)
/// 3. User cache directory (platform-specific)
/// 4. `./models` relative to the working directory
pub fn resolve(name: &str, configured_dir: Option<&Path>) -> Result<PathBuf, ModelResolveError> {
    resolve_in(name, &search_dirs(configured_dir))
}

/// Returns the first `dir/name` that exists.
pub fn resolve_in(name: &str, dirs: &[PathBuf]) -> Result<PathBuf, ModelResolveError> {
    let candidates: Vec<PathBuf> = dirs.iter().map(|d| d.join(name)).collect();
    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        log::debug!("Resolved model {name} at {}", found.display());
        return Ok(found.clone());
    }
    Err(ModelResolveError::NotFound {
        name: name.to_string(),
        searched: candidates,
    })
}

pub fn search_dirs(configured_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = env::var_os(MODEL_DIR_ENV) {
        dirs.push(PathBuf::from(dir));
    }
    if let Some(dir) = configured_dir {
        dirs.push(dir.to_path_buf());
    }
    if let Some(dir) = model_cache_dir() {
        dirs.push(dir);
    }
    dirs.push(PathBuf::from("models"));
    dirs
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/AgeSight/models/`
/// - Linux: `$XDG_CACHE_HOME/AgeSight/models/` or `~/.cache/AgeSight/models/`
/// - Windows: `%LOCALAPPDATA%/AgeSight/models/`
pub fn model_cache_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir().map(|d| d.join(APP_DIR_NAME).join("models"))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir().map(|d| d.join(APP_DIR_NAME).join("models"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_in_finds_first_existing() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(second.path().join("m.onnx"), b"x").unwrap();

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let found = resolve_in("m.onnx", &dirs).unwrap();
        assert_eq!(found, second.path().join("m.onnx"));
    }

    #[test]
    fn test_resolve_in_prefers_earlier_directory() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(first.path().join("m.onnx"), b"a").unwrap();
        fs::write(second.path().join("m.onnx"), b"b").unwrap();

        let dirs = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(resolve_in("m.onnx", &dirs).unwrap(), first.path().join("m.onnx"));
    }

    #[test]
    fn test_resolve_in_ignores_directories_with_model_name() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("m.onnx")).unwrap();
        assert!(resolve_in("m.onnx", &[dir.path().to_path_buf()]).is_err());
    }

    #[test]
    fn test_not_found_lists_searched_paths() {
        let dir = TempDir::new().unwrap();
        let err = resolve_in("missing.onnx", &[dir.path().to_path_buf()]).unwrap_err();
        let ModelResolveError::NotFound { name, searched } = &err;
        assert_eq!(name, "missing.onnx");
        assert_eq!(searched, &vec![dir.path().join("missing.onnx")]);
        assert!(err.to_string().contains("missing.onnx"));
    }

    #[test]
    fn test_search_dirs_include_configured_and_local() {
        let configured = PathBuf::from("/opt/agesight/models");
        let dirs = search_dirs(Some(&configured));
        assert!(dirs.contains(&configured));
        assert_eq!(dirs.last(), Some(&PathBuf::from("models")));
    }

    #[test]
    fn test_model_cache_dir_ends_with_models() {
        if let Some(dir) = model_cache_dir() {
            assert!(dir.ends_with(PathBuf::from(APP_DIR_NAME).join("models")));
        }
    }
}
