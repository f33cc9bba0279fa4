//! `agentic init` command: install the default prompt templates.

use std::path::PathBuf;

use anyhow::Result;

use agentic_core::Layout;
use agentic_core::template;

use crate::resolve_working_dir;

/// Write the built-in templates into `agentic/commands/` under the working
/// directory. Existing templates are kept unless `force` is set.
pub fn run_init(working_dir: Option<PathBuf>, force: bool) -> Result<()> {
    let layout = Layout::new(resolve_working_dir(working_dir)?);
    let written = template::install_defaults(&layout, force)?;

    for path in &written {
        println!("Wrote {}", path.display());
    }
    println!("Plans will be written to {}", layout.specs_dir().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let tmp = tempfile::tempdir().unwrap();
        run_init(Some(tmp.path().to_path_buf()), false).unwrap();
        assert!(tmp.path().join("agentic/commands/plan.md").is_file());
        assert!(tmp.path().join("agentic/specs").is_dir());

        let err = run_init(Some(tmp.path().to_path_buf()), false).unwrap_err();
        assert!(err.to_string().contains("--force"));

        run_init(Some(tmp.path().to_path_buf()), true).unwrap();
    }
}
