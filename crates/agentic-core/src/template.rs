//! Prompt templates under `agentic/commands/`.
//!
//! Rendering is a single left-to-right pass: `$ARGUMENTS` becomes the whole
//! argument text and `$1`..`$9` the whitespace-separated words of it
//! (missing words render empty). Substituted text is never re-scanned, so a
//! request containing `$ARGUMENTS` is passed through literally.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::layout::Layout;

/// The built-in templates, embedded in the binary at compile time.
static CLASSIFY_MD: &str = include_str!("templates/classify.md");
static PLAN_MD: &str = include_str!("templates/plan.md");
static IMPLEMENT_MD: &str = include_str!("templates/implement.md");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    Classify,
    Plan,
    Implement,
}

impl TemplateName {
    pub const ALL: [Self; 3] = [Self::Classify, Self::Plan, Self::Implement];

    pub fn file_name(self) -> &'static str {
        match self {
            Self::Classify => "classify.md",
            Self::Plan => "plan.md",
            Self::Implement => "implement.md",
        }
    }

    /// The built-in body written by [`install_defaults`].
    pub fn default_body(self) -> &'static str {
        match self {
            Self::Classify => CLASSIFY_MD,
            Self::Plan => PLAN_MD,
            Self::Implement => IMPLEMENT_MD,
        }
    }
}

impl fmt::Display for TemplateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template not found: {} (run `agentic init` to install the defaults)", path.display())]
    Missing { path: PathBuf },

    #[error("template already exists: {} (use --force to overwrite)", path.display())]
    Exists { path: PathBuf },

    #[error("I/O error on template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Read a template from the working directory's `agentic/commands/`.
pub fn load(layout: &Layout, name: TemplateName) -> Result<String, TemplateError> {
    let path = layout.commands_dir().join(name.file_name());
    fs::read_to_string(&path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            TemplateError::Missing { path }
        } else {
            TemplateError::Io { path, source }
        }
    })
}

/// Substitute `$ARGUMENTS` and `$1`..`$9` in one pass.
pub fn render(body: &str, arguments: &str) -> String {
    const ARGUMENTS: &str = "ARGUMENTS";

    let words: Vec<&str> = arguments.split_whitespace().collect();
    let mut out = String::with_capacity(body.len() + arguments.len());
    let mut rest = body;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if after.starts_with(ARGUMENTS) {
            out.push_str(arguments);
            rest = &after[ARGUMENTS.len()..];
        } else if let Some(digit @ b'1'..=b'9') = after.bytes().next() {
            let index = usize::from(digit - b'1');
            out.push_str(words.get(index).copied().unwrap_or(""));
            rest = &after[1..];
        } else {
            out.push('$');
            rest = after;
        }
    }
    out.push_str(rest);
    out
}

/// Write the built-in templates into `agentic/commands/` and create
/// `agentic/specs/`.
///
/// Refuses to overwrite an existing template unless `force` is set; in that
/// case nothing is written. Returns the paths written.
pub fn install_defaults(layout: &Layout, force: bool) -> Result<Vec<PathBuf>, TemplateError> {
    let commands = layout.commands_dir();
    let targets: Vec<(TemplateName, PathBuf)> = TemplateName::ALL
        .into_iter()
        .map(|name| (name, commands.join(name.file_name())))
        .collect();

    if !force {
        if let Some((_, path)) = targets.iter().find(|(_, path)| path.exists()) {
            return Err(TemplateError::Exists { path: path.clone() });
        }
    }

    for dir in [&commands, &layout.specs_dir()] {
        fs::create_dir_all(dir).map_err(|source| TemplateError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let mut written = Vec::with_capacity(targets.len());
    for (name, path) in targets {
        fs::write(&path, name.default_body()).map_err(|source| TemplateError::Io {
            path: path.clone(),
            source,
        })?;
        info!(template = %name, path = %path.display(), "installed template");
        written.push(path);
    }
    Ok(written)
}
