//! `.env` merging.
//!
//! Files are applied in order without overriding anything already set,
//! so the effective precedence is:
//!
//!   process env > ./.env > $CLAUNCH_HOME/.env

use std::path::{Path, PathBuf};

use crate::config::ENV_FILE;

/// Outcome of one file; logged by the caller once tracing is up.
#[derive(Debug)]
pub enum EnvFileLoad {
    Loaded(PathBuf),
    Failed(PathBuf, dotenvy::Error),
}

/// Merge each existing file into the process environment. Missing
/// files are skipped silently.
pub fn merge_env_files<I, P>(paths: I) -> Vec<EnvFileLoad>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    paths
        .into_iter()
        .filter(|path| path.as_ref().is_file())
        .map(|path| {
            let path = path.as_ref();
            match dotenvy::from_path(path) {
                Ok(()) => EnvFileLoad::Loaded(path.to_path_buf()),
                Err(e) => EnvFileLoad::Failed(path.to_path_buf(), e),
            }
        })
        .collect()
}

/// `./.env` under the working directory, if it can be determined.
pub fn working_dir_env_file() -> Option<PathBuf> {
    std::env::current_dir().ok().map(|cwd| cwd.join(ENV_FILE))
}

pub fn data_dir_env_file(data_dir: &Path) -> PathBuf {
    data_dir.join(ENV_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_earlier_files_and_process_env_win() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("first.env");
        let second = dir.path().join("second.env");
        std::fs::write(&first, "CLAUNCH_TEST_A=first\n").unwrap();
        std::fs::write(
            &second,
            "CLAUNCH_TEST_A=second\nCLAUNCH_TEST_B=second\nCLAUNCH_TEST_C=second\n",
        )
        .unwrap();

        std::env::remove_var("CLAUNCH_TEST_A");
        std::env::remove_var("CLAUNCH_TEST_B");
        std::env::set_var("CLAUNCH_TEST_C", "process");

        let results = merge_env_files(&[first, dir.path().join("missing.env"), second]);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| matches!(r, EnvFileLoad::Loaded(_))));

        assert_eq!(std::env::var("CLAUNCH_TEST_A").unwrap(), "first");
        assert_eq!(std::env::var("CLAUNCH_TEST_B").unwrap(), "second");
        assert_eq!(std::env::var("CLAUNCH_TEST_C").unwrap(), "process");

        for var in ["CLAUNCH_TEST_A", "CLAUNCH_TEST_B", "CLAUNCH_TEST_C"] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_data_dir_env_file() {
        assert_eq!(
            data_dir_env_file(Path::new("/tmp/claunch")),
            PathBuf::from("/tmp/claunch/.env")
        );
    }
}
