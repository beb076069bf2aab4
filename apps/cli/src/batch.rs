//! `batch` command: one child `run` process per subdirectory.

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use color_eyre::eyre::{Result, WrapErr, eyre};
use docdigest_core::batch::{
    LOG_FILE_NAME, LOG_SEPARATOR, SubdirJob, log_header, plan_subdirectory_jobs,
};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::commands::{DigestArgs, LogFormat};

/// Segment size used by batch runs unless overridden.
const BATCH_CHUNK_SIZE: usize = 65_000;

/// Segment overlap used by batch runs unless overridden.
const BATCH_CHUNK_OVERLAP: usize = 0;

/// Global flags re-applied to every child run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GlobalFlags {
    pub verbose: u8,
    pub debug: bool,
    pub log_format: LogFormat,
}

/// Arguments forwarded to each child, everything except `-d` and `-u`.
pub(crate) fn forwarded_args(args: &DigestArgs, flags: GlobalFlags) -> Vec<String> {
    let mut out = Vec::new();
    let mut push = |flag: &str, value: String| {
        out.push(flag.to_string());
        out.push(value);
    };

    if let Some(v) = &args.path {
        push("-p", v.clone());
    }
    if let Some(v) = &args.query {
        push("-q", v.clone());
    }
    if let Some(v) = &args.query_file {
        push("-f", v.display().to_string());
    }
    if let Some(v) = &args.model {
        push("-m", v.clone());
    }
    push("-c", args.chunk_size.unwrap_or(BATCH_CHUNK_SIZE).to_string());
    push(
        "-o",
        args.chunk_overlap.unwrap_or(BATCH_CHUNK_OVERLAP).to_string(),
    );
    if let Some(v) = args.temperature {
        push("-t", v.to_string());
    }
    if let Some(v) = args.num_ctx {
        push("-x", v.to_string());
    }
    if let Some(v) = args.top_k {
        push("-K", v.to_string());
    }
    if let Some(v) = args.top_p {
        push("-P", v.to_string());
    }
    if let Some(v) = args.num_predict {
        push("-g", v.to_string());
    }
    if let Some(v) = &args.tika_server {
        push("-s", v.clone());
    }
    push("--log-format", flags.log_format.as_str().to_string());

    if args.print_responses {
        out.push("-n".into());
    }
    if args.print_queries {
        out.push("-e".into());
    }
    if flags.debug {
        out.push("-z".into());
    }
    for _ in 0..flags.verbose {
        out.push("-v".into());
    }
    out
}

pub(crate) async fn cmd_batch(
    parent: &Path,
    log: bool,
    args: &DigestArgs,
    flags: GlobalFlags,
) -> Result<()> {
    let cwd = std::env::current_dir().wrap_err("cannot determine working directory")?;
    let exe = std::env::current_exe().wrap_err("cannot locate the docdigest executable")?;
    let jobs = plan_subdirectory_jobs(parent, &cwd)?;
    let forwarded = forwarded_args(args, flags);

    let log_path = cwd.join(LOG_FILE_NAME);
    if log && log_path.exists() {
        tokio::fs::remove_file(&log_path)
            .await
            .wrap_err_with(|| format!("failed to truncate {}", log_path.display()))?;
    }

    info!(
        parent = %parent.display(),
        jobs = jobs.len(),
        log,
        "starting batch"
    );

    let mut failed: Vec<String> = Vec::new();
    for job in &jobs {
        if job.already_done {
            println!(
                "Skipping directory: {} (output already exists: {})",
                job.input_dir.display(),
                job.output.display()
            );
            continue;
        }

        println!("Processing directory: {}", job.input_dir.display());
        let mut cmd = Command::new(&exe);
        cmd.arg("run")
            .arg("-d")
            .arg(&job.input_dir)
            .arg("-u")
            .arg(&job.output)
            .args(&forwarded);

        let status = if log {
            run_logged(cmd, job, &log_path).await
        } else {
            cmd.status()
                .await
                .wrap_err_with(|| format!("failed to spawn run for {}", job.name))
        };

        match status {
            Ok(status) if status.success() => {
                println!("Output saved to: {}", job.output.display());
                if log {
                    println!("Logs appended to: {}", log_path.display());
                }
            }
            Ok(status) => {
                error!(directory = %job.input_dir.display(), %status, "run failed");
                failed.push(job.name.clone());
            }
            Err(e) => {
                error!(directory = %job.input_dir.display(), error = %e, "run could not start");
                failed.push(job.name.clone());
            }
        }
    }

    if !failed.is_empty() {
        warn!(failed = failed.len(), "batch finished with failures");
        return Err(eyre!(
            "{} of {} subdirectories failed: {}",
            failed.len(),
            jobs.len(),
            failed.join(", ")
        ));
    }

    Ok(())
}

/// Run `cmd`, echoing its stdout/stderr and appending both to `log_path`.
async fn run_logged(mut cmd: Command, job: &SubdirJob, log_path: &Path) -> Result<ExitStatus> {
    let mut logf = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .await
        .wrap_err_with(|| format!("failed to open {}", log_path.display()))?;
    logf.write_all(log_header(&job.input_dir).as_bytes()).await?;

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .wrap_err_with(|| format!("failed to spawn run for {}", job.name))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| eyre!("child stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| eyre!("child stderr was not captured"))?;
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();

    let (mut out_done, mut err_done) = (false, false);
    while !(out_done && err_done) {
        tokio::select! {
            line = out_lines.next_line(), if !out_done => match line? {
                Some(line) => {
                    println!("{line}");
                    logf.write_all(format!("{line}\n").as_bytes()).await?;
                }
                None => out_done = true,
            },
            line = err_lines.next_line(), if !err_done => match line? {
                Some(line) => {
                    eprintln!("{line}");
                    logf.write_all(format!("{line}\n").as_bytes()).await?;
                }
                None => err_done = true,
            },
        }
    }

    let status = child.wait().await?;
    logf.write_all(LOG_SEPARATOR.as_bytes()).await?;
    logf.flush().await?;
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> GlobalFlags {
        GlobalFlags {
            verbose: 0,
            debug: false,
            log_format: LogFormat::Text,
        }
    }

    #[test]
    fn batch_defaults_apply_when_unset() {
        let args = forwarded_args(&DigestArgs::default(), flags());
        let joined = args.join(" ");
        assert!(joined.contains("-c 65000"));
        assert!(joined.contains("-o 0"));
        assert!(!joined.contains("-m"));
        assert!(!args.iter().any(|a| a == "-d" || a == "-u"));
    }

    #[test]
    fn explicit_options_are_forwarded() {
        let args = DigestArgs {
            path: Some(r"\.pdf$".into()),
            query: Some("What changed?".into()),
            chunk_size: Some(1000),
            num_predict: Some(-1),
            print_queries: true,
            ..DigestArgs::default()
        };
        let out = forwarded_args(
            &args,
            GlobalFlags {
                verbose: 2,
                debug: true,
                log_format: LogFormat::Json,
            },
        );

        let pos = out.iter().position(|a| a == "-q").unwrap();
        assert_eq!(out[pos + 1], "What changed?");
        let pos = out.iter().position(|a| a == "-c").unwrap();
        assert_eq!(out[pos + 1], "1000");
        let pos = out.iter().position(|a| a == "-g").unwrap();
        assert_eq!(out[pos + 1], "-1");
        assert!(out.contains(&"-e".to_string()));
        assert!(out.contains(&"-z".to_string()));
        assert_eq!(out.iter().filter(|a| *a == "-v").count(), 2);
        assert!(out.contains(&"json".to_string()));
    }
}
