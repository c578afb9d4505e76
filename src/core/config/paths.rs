use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let data_dir = discover_data_dir(&project_root);
        Self::with_data_dir(project_root, data_dir)
    }

    pub fn with_data_dir(project_root: PathBuf, data_dir: PathBuf) -> Self {
        let log_dir = data_dir.join("logs");
        let db_path = data_dir.join("rag.db");

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            project_root,
            data_dir,
            log_dir,
            db_path,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("RAG_ROOT") {
        return PathBuf::from(root);
    }

    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn discover_data_dir(project_root: &Path) -> PathBuf {
    if let Ok(dir) = env::var("RAG_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if cfg!(debug_assertions) {
        return project_root.join("db");
    }

    let xdg = env::var("XDG_DATA_HOME").unwrap_or_else(|_| {
        home_dir()
            .join(".local/share")
            .to_string_lossy()
            .to_string()
    });
    PathBuf::from(xdg).join("rag-service")
}

fn home_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}
