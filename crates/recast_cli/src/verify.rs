//! `recast verify`: replay a saved configuration read-only.
//!
//! Every file under the given directories must be served from the cache by a
//! host that cannot compile; anything else means the precompiled cache is
//! incomplete.

use recast_host::CompilerHost;

use crate::compile::print_failures;
use crate::project::load_settings;
use crate::{GlobalArgs, VerifyArgs};

/// Runs the `recast verify` command.
///
/// Returns exit code 0 if every file was precompiled, 1 otherwise.
pub fn run(args: &VerifyArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let settings = load_settings(global)?;
    let host = CompilerHost::read_only_from_configuration_blocking(settings)?;

    let mut missing = 0;
    for source in &args.sources {
        if !global.quiet {
            eprintln!("   Verifying {}", source.display());
        }
        let report = host.compile_all_blocking(source, |_| true)?;
        print_failures(&report);
        missing += report.failures.len();
    }

    if !global.quiet {
        if missing == 0 {
            eprintln!("    Finished all files precompiled");
        } else {
            eprintln!("    Finished {missing} file(s) not precompiled");
        }
    }
    Ok(if missing == 0 { 0 } else { 1 })
}
