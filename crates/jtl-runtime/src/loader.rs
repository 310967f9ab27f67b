//! Sources of template text, looked up by logical name.

use camino::Utf8Component;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use rustc_hash::FxHashMap;

use crate::error::LoadError;

/// Maps a template name to its source.
///
/// Loaders are synchronous from the renderer's point of view and are
/// consulted at most once per name and render.
pub trait Loader: Send + Sync {
    fn load(&self, name: &str) -> Result<String, LoadError>;
}

impl<F> Loader for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn load(&self, name: &str) -> Result<String, LoadError> {
        self(name).ok_or_else(|| LoadError::NotFound {
            name: name.to_string(),
        })
    }
}

/// Templates held in memory.
#[derive(Clone, Debug, Default)]
pub struct MapLoader {
    templates: FxHashMap<String, String>,
}

impl MapLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }
}

impl<N: Into<String>, S: Into<String>> FromIterator<(N, S)> for MapLoader {
    fn from_iter<I: IntoIterator<Item = (N, S)>>(iter: I) -> Self {
        Self {
            templates: iter
                .into_iter()
                .map(|(name, source)| (name.into(), source.into()))
                .collect(),
        }
    }
}

impl Loader for MapLoader {
    fn load(&self, name: &str) -> Result<String, LoadError> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                name: name.to_string(),
            })
    }
}

/// Templates read from a list of directories, first match wins.
///
/// Names are `/`-separated paths relative to a search directory. Absolute
/// names and names with `..` segments are rejected.
#[derive(Clone, Debug)]
pub struct FileSystemLoader {
    search_path: Vec<Utf8PathBuf>,
}

impl FileSystemLoader {
    pub fn new<P: Into<Utf8PathBuf>>(search_path: impl IntoIterator<Item = P>) -> Self {
        let search_path: Vec<Utf8PathBuf> = search_path.into_iter().map(Into::into).collect();
        for dir in &search_path {
            if !dir.is_dir() {
                tracing::warn!("Template directory does not exist: {}", dir);
            }
        }
        Self { search_path }
    }

    #[must_use]
    pub fn search_path(&self) -> &[Utf8PathBuf] {
        &self.search_path
    }

    fn validate(name: &str) -> Result<&Utf8Path, LoadError> {
        let path = Utf8Path::new(name);
        let plain = !name.is_empty()
            && path
                .components()
                .all(|component| matches!(component, Utf8Component::Normal(_)));
        if plain {
            Ok(path)
        } else {
            Err(LoadError::InvalidName {
                name: name.to_string(),
            })
        }
    }
}

impl Loader for FileSystemLoader {
    fn load(&self, name: &str) -> Result<String, LoadError> {
        let relative = Self::validate(name)?;
        for dir in &self.search_path {
            let path = dir.join(relative);
            if !path.is_file() {
                continue;
            }
            return std::fs::read_to_string(&path).map_err(|source| {
                tracing::warn!("Failed to read template {}: {}", path, source);
                LoadError::Io { path, source }
            });
        }
        Err(LoadError::NotFound {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closures_are_loaders() {
        let loader = |name: &str| (name == "a.html").then(|| "A".to_string());
        assert_eq!(loader.load("a.html").unwrap(), "A");
        assert!(loader.load("b.html").unwrap_err().is_not_found());
    }

    #[test]
    fn test_map_loader_from_pairs() {
        let loader: MapLoader = [("base.html", "{% block body %}{% endblock %}")]
            .into_iter()
            .collect();
        assert!(loader.load("base.html").is_ok());
        assert!(matches!(
            loader.load("missing.html"),
            Err(LoadError::NotFound { .. })
        ));
    }

    mod filesystem {
        use super::*;

        fn utf8(dir: &tempfile::TempDir) -> Utf8PathBuf {
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
        }

        #[test]
        fn test_first_directory_wins() {
            let first = tempfile::tempdir().unwrap();
            let second = tempfile::tempdir().unwrap();
            std::fs::write(first.path().join("page.html"), "first").unwrap();
            std::fs::write(second.path().join("page.html"), "second").unwrap();
            std::fs::write(second.path().join("only.html"), "only").unwrap();

            let loader = FileSystemLoader::new([utf8(&first), utf8(&second)]);
            assert_eq!(loader.load("page.html").unwrap(), "first");
            assert_eq!(loader.load("only.html").unwrap(), "only");
        }

        #[test]
        fn test_nested_names() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir(dir.path().join("forms")).unwrap();
            std::fs::write(dir.path().join("forms/input.html"), "<input>").unwrap();

            let loader = FileSystemLoader::new([utf8(&dir)]);
            assert_eq!(loader.load("forms/input.html").unwrap(), "<input>");
        }

        #[test]
        fn test_rejects_traversal_and_absolute_names() {
            let dir = tempfile::tempdir().unwrap();
            let loader = FileSystemLoader::new([utf8(&dir)]);
            for name in ["../secret.txt", "a/../../b", "/etc/passwd", "./a.html", ""] {
                assert!(
                    matches!(loader.load(name), Err(LoadError::InvalidName { .. })),
                    "{name}"
                );
            }
        }

        #[test]
        fn test_missing_directory_is_not_fatal() {
            let dir = tempfile::tempdir().unwrap();
            let loader = FileSystemLoader::new([utf8(&dir).join("nope")]);
            assert!(loader.load("a.html").unwrap_err().is_not_found());
        }
    }
}
