//! Run configuration shared by the CLI subcommands.

use std::path::{Path, PathBuf};

/// Directories that relative mark list references are resolved against.
#[derive(Clone, Debug, Default, PartialEq, Eq, clap::Args)]
pub struct Roots {
    /// Directory holding score images.
    #[arg(long = "scores-root", env = "SCORES_ROOT", value_name = "DIR")]
    pub scores_root: Option<PathBuf>,

    /// Directory holding class list files.
    #[arg(long = "classes-root", env = "CLASSES_ROOT", value_name = "DIR")]
    pub classes_root: Option<PathBuf>,
}

impl Roots {
    /// Resolves an image reference; see [`resolve_against`].
    pub fn image(&self, reference: &str, base: &Path) -> PathBuf {
        resolve_against(reference, self.scores_root.as_deref(), base)
    }

    /// Resolves a class list reference; see [`resolve_against`].
    pub fn class_list(&self, reference: &str, base: &Path) -> PathBuf {
        resolve_against(reference, self.classes_root.as_deref(), base)
    }
}

/// Absolute references are kept. A relative one is taken from `root` when
/// the file exists there, otherwise from `base`.
pub fn resolve_against(reference: &str, root: Option<&Path>, base: &Path) -> PathBuf {
    let reference = Path::new(reference);
    if reference.is_absolute() {
        return reference.to_path_buf();
    }
    if let Some(candidate) = root.map(|root| root.join(reference)) {
        if candidate.exists() {
            return candidate;
        }
    }
    base.join(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_wins_only_when_the_file_exists() {
        let root = tempfile::tempdir().expect("tempdir");
        std::fs::write(root.path().join("score.png"), b"").expect("touch");
        let base = Path::new("/data/marks");

        let roots = Roots {
            scores_root: Some(root.path().to_path_buf()),
            classes_root: Some(root.path().to_path_buf()),
        };
        assert_eq!(roots.image("score.png", base), root.path().join("score.png"));
        assert_eq!(
            roots.class_list("classes.xml", base),
            base.join("classes.xml")
        );
        assert_eq!(
            Roots::default().image("/abs/score.png", base),
            PathBuf::from("/abs/score.png")
        );
    }
}
