//! File mapping specifications and the staging/collection passes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sweep_params::Context;

use crate::prelude::*;
use crate::render::Renderer;

/// How a rule's source is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    /// One source path, one target path.
    #[default]
    Simple,
    /// A glob expanded against the source root.
    Glob,
}

/// One copy specification.
///
/// Source and target strings may contain `${name}` references which are
/// rendered against the point context before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRule {
    /// Source path or glob pattern, relative to the source root.
    pub source: String,
    /// Target path (simple) or target directory (glob). Defaults to the
    /// source path for simple rules, or the root for globs.
    #[serde(default)]
    pub target: Option<String>,
    /// Render the file through the template collaborator on staging.
    #[serde(default)]
    pub template: bool,
    /// Resolution mode.
    #[serde(default)]
    pub mode: FileMode,
}

impl FileRule {
    /// A plain one-to-one copy.
    pub fn simple(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: None,
            template: false,
            mode: FileMode::Simple,
        }
    }

    /// A renamed one-to-one copy.
    pub fn renamed(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::simple(source)
        }
    }

    /// A glob copy into the target directory.
    pub fn glob(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: pattern.into(),
            target: Some(target.into()),
            template: false,
            mode: FileMode::Glob,
        }
    }

    /// A templated copy: rendered on staging, always simple mode.
    pub fn templated(source: impl Into<String>) -> Self {
        Self {
            template: true,
            ..Self::simple(source)
        }
    }
}

/// One resolved copy: paths relative to their respective roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub source: PathBuf,
    pub target: PathBuf,
    pub template: bool,
}

/// Resolve a rule against a source root and a point context.
///
/// Glob matches preserve their path relative to the source root under the
/// target directory: `a/*.jpg` into `images/` resolves `a/x.jpg` to
/// `images/a/x.jpg`, never `images/x.jpg`. Flattening only ever happens
/// through explicit target renaming on a simple rule.
pub fn resolve(
    rule: &FileRule,
    source_root: &Path,
    ctx: &Context,
    renderer: &dyn Renderer,
) -> Result<Vec<ResolvedFile>> {
    let source = renderer.render(&rule.source, ctx)?;
    let target = match &rule.target {
        Some(target) => Some(renderer.render(target, ctx)?),
        None => None,
    };

    // Templates are always one-to-one.
    let mode = if rule.template {
        FileMode::Simple
    } else {
        rule.mode
    };

    match mode {
        FileMode::Simple => {
            let target = target.unwrap_or_else(|| source.clone());
            Ok(vec![ResolvedFile {
                source: PathBuf::from(source),
                target: PathBuf::from(target),
                template: rule.template,
            }])
        }
        FileMode::Glob => {
            let target_dir = target.unwrap_or_default();
            let target_dir = Path::new(&target_dir);
            let pattern = source_root.join(&source);
            let pattern = pattern.to_string_lossy();
            let paths = glob::glob(&pattern).map_err(|source| Error::BadGlob {
                pattern: pattern.to_string(),
                source,
            })?;
            let mut resolved = Vec::new();
            for entry in paths {
                let path = entry.map_err(|err| Error::IO(err.into_error()))?;
                if !path.is_file() {
                    continue;
                }
                let relative = path.strip_prefix(source_root).unwrap_or(&path).to_path_buf();
                resolved.push(ResolvedFile {
                    target: target_dir.join(&relative),
                    source: relative,
                    template: false,
                });
            }
            Ok(resolved)
        }
    }
}

/// Stage pre-files into an instance working directory.
///
/// Files marked `template` are rendered against the point context and
/// written in place of a raw copy. Any failure here is fatal to the
/// instance: it is marked failed before any command runs.
pub fn stage_pre(
    source_root: &Path,
    work_dir: &Path,
    rules: &[FileRule],
    ctx: &Context,
    renderer: &dyn Renderer,
) -> Result<()> {
    for rule in rules {
        for file in resolve(rule, source_root, ctx, renderer)? {
            let from = source_root.join(&file.source);
            let to = work_dir.join(&file.target);
            if !from.is_file() {
                return Err(Error::MissingSource(from));
            }
            debug!(from = %from.display(), to = %to.display(), "staging");
            copy_one(&from, &to, file.template, ctx, renderer)?;
        }
    }
    Ok(())
}

/// Collect post-files from the working directory back into the instance's
/// area of the result store. No template rendering on this path.
///
/// With `ignore_missing` (used when the script did not succeed), missing
/// sources are logged and skipped instead of failing the instance.
pub fn collect_post(
    work_dir: &Path,
    dest_root: &Path,
    rules: &[FileRule],
    ctx: &Context,
    renderer: &dyn Renderer,
    ignore_missing: bool,
) -> Result<()> {
    for rule in rules {
        for file in resolve(rule, work_dir, ctx, renderer)? {
            let from = work_dir.join(&file.source);
            let to = dest_root.join(&file.target);
            if !from.is_file() {
                if ignore_missing {
                    warn!(path = %from.display(), "missing collected file");
                    continue;
                }
                return Err(Error::MissingSource(from));
            }
            debug!(from = %from.display(), to = %to.display(), "collecting");
            copy_one(&from, &to, false, ctx, renderer)?;
        }
    }
    Ok(())
}

fn copy_one(
    from: &Path,
    to: &Path,
    template: bool,
    ctx: &Context,
    renderer: &dyn Renderer,
) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if template {
        let text = fs::read_to_string(from)?;
        fs::write(to, renderer.render(&text, ctx)?)?;
        // Rendered files keep the source file's permissions.
        fs::set_permissions(to, fs::metadata(from)?.permissions())?;
    } else {
        fs::copy(from, to)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::VarRenderer;
    use sweep_params::Value;
    use tempfile::TempDir;

    fn ctx() -> Context {
        let mut ctx = Context::new();
        ctx.insert("n".into(), Value::Int(7));
        ctx
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn glob_preserves_relative_paths() {
        let src = TempDir::new().unwrap();
        write(src.path(), "subpath/a.jpg", "a");
        write(src.path(), "subpath/b.jpg", "b");
        write(src.path(), "subpath/skip.txt", "x");

        let rule = FileRule::glob("subpath/*.jpg", "images");
        let mut resolved = resolve(&rule, src.path(), &ctx(), &VarRenderer).unwrap();
        resolved.sort_by(|a, b| a.source.cmp(&b.source));

        assert_eq!(
            resolved
                .iter()
                .map(|f| f.target.clone())
                .collect::<Vec<_>>(),
            vec![
                PathBuf::from("images/subpath/a.jpg"),
                PathBuf::from("images/subpath/b.jpg"),
            ]
        );
    }

    #[test]
    fn simple_rule_defaults_target_to_source() {
        let src = TempDir::new().unwrap();
        let rule = FileRule::simple("input-${n}.txt");
        let resolved = resolve(&rule, src.path(), &ctx(), &VarRenderer).unwrap();
        assert_eq!(resolved[0].source, PathBuf::from("input-7.txt"));
        assert_eq!(resolved[0].target, PathBuf::from("input-7.txt"));
    }

    #[test]
    fn stage_pre_renders_templates() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        write(src.path(), "case.cfg", "degree = ${n}\n");

        let rules = vec![FileRule::templated("case.cfg")];
        stage_pre(src.path(), work.path(), &rules, &ctx(), &VarRenderer).unwrap();

        let staged = fs::read_to_string(work.path().join("case.cfg")).unwrap();
        assert_eq!(staged, "degree = 7\n");
    }

    #[test]
    fn stage_pre_missing_source_fails() {
        let src = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let rules = vec![FileRule::simple("no-such-file")];
        let err = stage_pre(src.path(), work.path(), &rules, &ctx(), &VarRenderer).unwrap_err();
        assert!(matches!(err, Error::MissingSource(_)));
    }

    #[test]
    fn collect_post_ignores_missing_when_asked() {
        let work = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        write(work.path(), "result.dat", "42");

        let rules = vec![FileRule::simple("result.dat"), FileRule::simple("gone.dat")];
        collect_post(work.path(), dest.path(), &rules, &ctx(), &VarRenderer, true).unwrap();
        assert!(dest.path().join("result.dat").is_file());

        let err =
            collect_post(work.path(), dest.path(), &rules, &ctx(), &VarRenderer, false).unwrap_err();
        assert!(matches!(err, Error::MissingSource(_)));
    }
}
