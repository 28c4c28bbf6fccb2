//! mkustar - Create USTAR tar archives from files and directories.
//!
//! Patterns name files or directories relative to the working directory (or
//! `-C DIR`); directories are archived recursively and symbolic links are
//! stored as links.

use std::{
    ffi::OsString,
    io::{self, IsTerminal},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;

use ustar_create::{
    fs::HostFilesystem, identity::SystemIdentity, scan_patterns, sink::OutputSink, write_scanned,
    ArchiveSummary, CreateOptions,
};

/// Create a USTAR archive from the given files and directories.
#[derive(Parser, Debug)]
#[command(name = "mkustar", version, about)]
struct Args {
    /// Write the archive to FILE instead of standard output.
    ///
    /// `-` also means standard output. An existing file is replaced, and
    /// removed again if the archive cannot be completed.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Resolve patterns relative to DIR.
    #[arg(short = 'C', long, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// List entries as they are scanned; repeat to also trace directories.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Files and directories to archive.
    ///
    /// Absolute paths and paths starting with `..` are skipped.
    #[arg(value_name = "PATTERN", required = true)]
    patterns: Vec<OsString>,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 | 1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(default)).init();
}

fn open_source(directory: Option<&Path>) -> Result<HostFilesystem> {
    match directory {
        Some(dir) => HostFilesystem::open_dir(dir)
            .with_context(|| format!("Failed to open directory: {dir:?}")),
        None => Ok(HostFilesystem::new()),
    }
}

fn run(args: &Args, stdout: &mut dyn io::Write, stdout_is_terminal: bool) -> Result<ArchiveSummary> {
    let output = args.output.as_deref().filter(|path| path.as_os_str() != "-");
    if output.is_none() && stdout_is_terminal {
        bail!("Refusing to write archive to terminal. Redirect stdout or use --output.");
    }

    let fs = open_source(args.directory.as_deref())?;
    let options = CreateOptions {
        verbose: args.verbose,
    };

    // create the output only after the scan so it never lists itself
    let state = scan_patterns(&fs, &args.patterns, &options);

    let sink = match output {
        Some(path) => OutputSink::create(path)?,
        None => OutputSink::borrowed("[stdout]", stdout),
    };

    let summary = write_scanned(&fs, SystemIdentity, state, sink)?;
    Ok(summary)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let stdout = io::stdout();
    let is_terminal = stdout.is_terminal();
    let summary = run(&args, &mut stdout.lock(), is_terminal)?;

    if summary.scan_problems > 0 || summary.skipped > 0 {
        log::warn!(
            "{} of the requested entries could not be archived",
            summary.scan_problems + summary.skipped
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let args = Args::parse_from(["mkustar", "-vv", "-C", "/tmp", "-o", "out.tar", "a", "b/"]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.directory.as_deref(), Some(Path::new("/tmp")));
        assert_eq!(args.output.as_deref(), Some(Path::new("out.tar")));
        assert_eq!(args.patterns, ["a", "b/"].map(OsString::from));

        assert!(Args::try_parse_from(["mkustar"]).is_err());
    }

    #[test]
    fn test_run_to_file() -> Result<()> {
        let td = ustar_create::test::tempdir();
        std::fs::create_dir(td.path().join("src"))?;
        std::fs::write(td.path().join("src/a.txt"), b"0123456789")?;
        let output = td.path().join("out.tar");

        let args = Args::parse_from([
            OsString::from("mkustar"),
            OsString::from("-C"),
            td.path().as_os_str().to_os_string(),
            OsString::from("-o"),
            output.as_os_str().to_os_string(),
            OsString::from("src"),
        ]);
        let summary = run(&args, &mut io::sink(), true)?;
        assert_eq!(summary.written, 2);
        assert_eq!(std::fs::metadata(&output)?.len(), 512 * 5);
        Ok(())
    }

    #[test]
    fn test_output_inside_archived_directory() -> Result<()> {
        let td = ustar_create::test::tempdir();
        std::fs::write(td.path().join("f"), b"x")?;
        let output = td.path().join("out.tar");

        let args = Args::parse_from([
            OsString::from("mkustar"),
            OsString::from("-C"),
            td.path().as_os_str().to_os_string(),
            OsString::from("-o"),
            output.as_os_str().to_os_string(),
            OsString::from("."),
        ]);
        let summary = run(&args, &mut io::sink(), true)?;
        assert_eq!(summary.written, 2);

        let bytes = std::fs::read(&output)?;
        let mut archive = tar::Archive::new(bytes.as_slice());
        let mut names = vec![];
        for entry in archive.entries()? {
            let entry = entry?;
            names.push(entry.path()?.into_owned());
        }
        assert_eq!(names, [Path::new("."), Path::new("./f")]);
        Ok(())
    }

    #[test]
    fn test_scan_runs_when_output_cannot_be_created() {
        let td = ustar_create::test::tempdir();
        let args = Args::parse_from([
            OsString::from("mkustar"),
            OsString::from("-C"),
            td.path().as_os_str().to_os_string(),
            OsString::from("-o"),
            td.path().join("missing/out.tar").as_os_str().to_os_string(),
            OsString::from("nonexistent"),
        ]);
        let err = run(&args, &mut io::sink(), false).unwrap_err();
        assert!(err.to_string().contains("missing/out.tar"));
    }

    #[test]
    fn test_refuses_terminal() {
        let args = Args::parse_from(["mkustar", "-o", "-", "src"]);
        let mut out = vec![];
        assert!(run(&args, &mut out, true).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_run_to_stdout() -> Result<()> {
        let td = ustar_create::test::tempdir();
        std::fs::write(td.path().join("f"), b"x")?;

        let args = Args::parse_from([
            OsString::from("mkustar"),
            OsString::from("-C"),
            td.path().as_os_str().to_os_string(),
            OsString::from("f"),
        ]);
        let mut out = vec![];
        run(&args, &mut out, false)?;
        assert_eq!(out.len(), 512 * 4);
        Ok(())
    }
}
