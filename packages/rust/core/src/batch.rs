//! Planning for per-subdirectory batch runs.
//!
//! Each first-level subdirectory of a parent becomes one digest run whose
//! answer lands in `<output_dir>/<name>.txt`. Runs whose output already
//! exists are skipped, so an interrupted batch can simply be restarted.

use std::path::{Path, PathBuf};

use tracing::debug;

use docdigest_shared::{DigestError, Result};

/// Name of the combined log written next to the outputs.
pub const LOG_FILE_NAME: &str = "map-reduce-subdirs.log";

/// Line written after each subdirectory's captured output.
pub const LOG_SEPARATOR: &str = "\n========================================\n\n";

/// One subdirectory to digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubdirJob {
    /// Subdirectory name, used for the output file name.
    pub name: String,
    /// Directory to crawl.
    pub input_dir: PathBuf,
    /// Where the answer is written.
    pub output: PathBuf,
    /// The output already exists; the job is skipped.
    pub already_done: bool,
}

/// Header written before a subdirectory's captured output.
pub fn log_header(input_dir: &Path) -> String {
    format!("===== Log for subdirectory: {} =====", input_dir.display())
}

/// List the first-level subdirectories of `parent`, sorted case-insensitively.
pub fn plan_subdirectory_jobs(parent: &Path, output_dir: &Path) -> Result<Vec<SubdirJob>> {
    if !parent.is_dir() {
        return Err(DigestError::validation(format!(
            "parent directory '{}' does not exist or is not a directory",
            parent.display()
        )));
    }

    let entries = std::fs::read_dir(parent).map_err(|e| DigestError::io(parent, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DigestError::io(parent, e))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort_by_key(|name| name.to_lowercase());

    let jobs: Vec<SubdirJob> = names
        .into_iter()
        .map(|name| {
            let output = output_dir.join(format!("{name}.txt"));
            SubdirJob {
                input_dir: parent.join(&name),
                already_done: output.exists(),
                output,
                name,
            }
        })
        .collect();

    debug!(
        parent = %parent.display(),
        jobs = jobs.len(),
        skipped = jobs.iter().filter(|j| j.already_done).count(),
        "subdirectory jobs planned"
    );

    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdirectories_sorted_case_insensitively() {
        let parent = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for name in ["beta", "Alpha", "gamma"] {
            std::fs::create_dir(parent.path().join(name)).unwrap();
        }
        std::fs::write(parent.path().join("loose.txt"), "not a dir").unwrap();

        let jobs = plan_subdirectory_jobs(parent.path(), out.path()).unwrap();
        let names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta", "gamma"]);
        assert_eq!(jobs[0].output, out.path().join("Alpha.txt"));
        assert_eq!(jobs[0].input_dir, parent.path().join("Alpha"));
    }

    #[test]
    fn existing_output_marks_job_done() {
        let parent = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        std::fs::create_dir(parent.path().join("reports")).unwrap();
        std::fs::create_dir(parent.path().join("notes")).unwrap();
        std::fs::write(out.path().join("reports.txt"), "previous run").unwrap();

        let jobs = plan_subdirectory_jobs(parent.path(), out.path()).unwrap();
        let done: Vec<(&str, bool)> = jobs
            .iter()
            .map(|j| (j.name.as_str(), j.already_done))
            .collect();
        assert_eq!(done, vec![("notes", false), ("reports", true)]);
    }

    #[test]
    fn missing_parent_is_rejected() {
        let out = tempfile::tempdir().unwrap();
        let err = plan_subdirectory_jobs(&out.path().join("nope"), out.path()).unwrap_err();
        assert!(matches!(err, DigestError::Validation { .. }));
    }

    #[test]
    fn log_framing() {
        assert_eq!(
            log_header(Path::new("/data/q1")),
            "===== Log for subdirectory: /data/q1 ====="
        );
        assert!(LOG_SEPARATOR.contains("========"));
    }
}
