//! `recast compile`: bulk precompilation.
//!
//! 1. Resolve the project and load `recast.toml`
//! 2. Resume from the saved configuration, or start fresh
//! 3. Compile every file under each source directory
//! 4. Save the configuration for `recast verify` and production hosts

use std::path::Path;

use recast_compiler::{CompilerRegistry, PassthroughCompiler, PluginDescriptor};
use recast_host::{CompileAllReport, CompilerHost, HostSettings, HostSnapshot};
use tracing::debug;

use crate::project::load_settings;
use crate::{CompileArgs, GlobalArgs};

/// Compilers built into the binary.
///
/// Real translators are linked in by embedding `recast_host` in a custom
/// binary; this one only caches files verbatim.
pub fn builtin_registry() -> CompilerRegistry {
    CompilerRegistry::build([PluginDescriptor::standalone(PassthroughCompiler)])
}

/// Runs the `recast compile` command.
///
/// Returns exit code 0 if every file compiled, 1 otherwise.
pub fn run(args: &CompileArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let settings = load_settings(global)?;
    let host = open_host(settings, args.fresh)?;

    let mut failed = 0;
    for source in &args.sources {
        if !global.quiet {
            eprintln!("   Compiling {}", source.display());
        }
        let report = host.compile_all_blocking(source, |_| true)?;
        print_failures(&report);
        failed += report.failures.len();
        if !global.quiet {
            eprintln!(
                "    Finished {} file(s), {} failed",
                report.total(),
                report.failures.len()
            );
        }
    }

    let saved = host.save_configuration_blocking()?;
    if !global.quiet {
        eprintln!("       Saved {}", saved.display());
    }
    Ok(if failed == 0 { 0 } else { 1 })
}

fn open_host(
    settings: HostSettings,
    fresh: bool,
) -> Result<CompilerHost, Box<dyn std::error::Error>> {
    let saved = HostSnapshot::path(&settings.cache_root);
    if !fresh && saved.is_file() {
        debug!(path = %saved.display(), "resuming from saved configuration");
        return Ok(CompilerHost::from_configuration_blocking(
            settings,
            builtin_registry(),
        )?);
    }
    Ok(CompilerHost::new(settings, builtin_registry()))
}

/// Prints one line per failed file.
pub fn print_failures(report: &CompileAllReport) {
    for failure in &report.failures {
        eprintln!("error: {}: {}", display(&failure.path), failure.error);
    }
}

fn display(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn global(project: &Path) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            config: None,
            project: Some(project.to_path_buf()),
            cache_dir: None,
        }
    }

    fn args(sources: Vec<PathBuf>, fresh: bool) -> CompileArgs {
        CompileArgs { sources, fresh }
    }

    #[test]
    fn compiles_and_saves_configuration() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("main.js"), "console.log(1);\n").unwrap();
        std::fs::write(src.join("notes.txt"), "hello\n").unwrap();

        let code = run(&args(vec![src], false), &global(tmp.path())).unwrap();
        assert_eq!(code, 0);
        assert!(HostSnapshot::path(&tmp.path().join(".recast-cache")).is_file());
    }

    #[test]
    fn second_run_resumes() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("main.js"), "console.log(1);\n").unwrap();

        run(&args(vec![src.clone()], false), &global(tmp.path())).unwrap();
        let code = run(&args(vec![src.clone()], false), &global(tmp.path())).unwrap();
        assert_eq!(code, 0);
        let code = run(&args(vec![src], true), &global(tmp.path())).unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn missing_source_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = run(
            &args(vec![tmp.path().join("nope")], false),
            &global(tmp.path()),
        );
        assert!(result.is_err());
    }
}
