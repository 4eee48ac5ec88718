use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::{Result, StencilError};
use crate::model::config::AppConfig;
use crate::template::context::BaseCapability;
use crate::template::descriptor::TemplateKey;
use crate::template::sandbox::{ScriptLoader, TemplateLoader};
use crate::template::validate::validate_metadata;
use crate::template::TemplateHandle;

#[derive(Debug, Clone)]
struct Candidate {
    key: TemplateKey,
    path: PathBuf,
    loader: usize,
}

/// A definition that was skipped during the last scan, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanError {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
struct Scan {
    candidates: Vec<Candidate>,
    handles: HashMap<TemplateKey, TemplateHandle>,
    errors: Vec<ScanError>,
}

/// Maps the script directory to resolvable template keys.
///
/// Discovery happens once per scan; handles loaded during a scan are cached
/// until the scan is dropped.
pub struct TemplateRegistry {
    script_dir: PathBuf,
    base: BaseCapability,
    loaders: Vec<Box<dyn TemplateLoader>>,
    scan: Option<Scan>,
}

impl TemplateRegistry {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_loaders(
            config.script_dir(),
            BaseCapability::new(&config.base_module),
            default_loaders(),
        )
    }

    pub fn with_loaders(
        script_dir: impl Into<PathBuf>,
        base: BaseCapability,
        loaders: Vec<Box<dyn TemplateLoader>>,
    ) -> Self {
        Self {
            script_dir: script_dir.into(),
            base,
            loaders,
            scan: None,
        }
    }

    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    /// Forget the cached scan; the next call walks the directory again.
    #[cfg(test)]
    pub fn rescan(&mut self) {
        self.scan = None;
    }

    /// Every `(key, display name)` that loads and passes metadata validation,
    /// in file-name order. Broken definitions are logged and skipped.
    pub fn list(&mut self) -> Listing<'_> {
        self.scan();
        Listing {
            registry: self,
            next: 0,
            exports: HashSet::new(),
        }
    }

    /// Whether discovery found a definition for `key`. Nothing is loaded.
    pub fn contains(&mut self, key: &str) -> bool {
        self.scan()
            .candidates
            .iter()
            .any(|candidate| candidate.key.as_str() == key)
    }

    pub fn resolve(&mut self, key: &str) -> Result<TemplateHandle> {
        let idx = self
            .scan()
            .candidates
            .iter()
            .position(|candidate| candidate.key.as_str() == key)
            .ok_or_else(|| StencilError::TemplateNotFound(key.to_string()))?;
        self.load_candidate(idx)
    }

    /// Definitions skipped during the current scan.
    pub fn errors(&mut self) -> Vec<ScanError> {
        let _ = self.list().count();
        self.scan().errors.clone()
    }

    pub fn summary(&mut self) -> String {
        let loaded = self.list().count();
        let errors = self.scan().errors.len();
        format!(
            "templates: {loaded} loaded, {errors} errors ({})",
            self.script_dir.display()
        )
    }

    fn scan(&mut self) -> &mut Scan {
        if self.scan.is_none() {
            let candidates = self.discover();
            self.scan = Some(Scan {
                candidates,
                ..Scan::default()
            });
        }
        self.scan.get_or_insert_with(Scan::default)
    }

    fn discover(&self) -> Vec<Candidate> {
        if !self.script_dir.is_dir() {
            tracing::warn!(
                "template directory {} does not exist",
                self.script_dir.display()
            );
            return Vec::new();
        }

        let mut paths: Vec<PathBuf> = WalkBuilder::new(&self.script_dir)
            .max_depth(Some(1))
            .hidden(false)
            .build()
            .flatten()
            .filter_map(|entry| {
                let metadata = entry.metadata().ok()?;
                metadata.is_file().then(|| entry.path().to_path_buf())
            })
            .collect();
        paths.sort();

        let mut candidates: Vec<Candidate> = Vec::new();
        for path in paths {
            let Some(loader) = self.loader_for(&path) else {
                continue;
            };
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                tracing::warn!("skipping non-utf8 template name {}", path.display());
                continue;
            };

            let key = TemplateKey::new(stem);
            if let Some(existing) = candidates.iter().find(|candidate| candidate.key == key) {
                tracing::warn!(
                    "template key {key} is defined by both {} and {}; keeping the first",
                    existing.path.display(),
                    path.display()
                );
                continue;
            }

            candidates.push(Candidate { key, path, loader });
        }

        tracing::debug!("discovered {} template candidates", candidates.len());
        candidates
    }

    fn loader_for(&self, path: &Path) -> Option<usize> {
        let extension = path.extension()?.to_str()?;
        self.loaders
            .iter()
            .position(|loader| loader.extension() == extension)
    }

    fn load_candidate(&mut self, idx: usize) -> Result<TemplateHandle> {
        let scan = self.scan();
        let candidate = scan.candidates[idx].clone();
        if let Some(handle) = scan.handles.get(&candidate.key) {
            return Ok(handle.clone());
        }

        let handle =
            self.loaders[candidate.loader].load(&candidate.key, &candidate.path, &self.base)?;
        tracing::debug!("loaded template {} from {}", candidate.key, candidate.path.display());

        self.scan()
            .handles
            .insert(candidate.key.clone(), handle.clone());
        Ok(handle)
    }

    fn record_error(&mut self, path: &Path, err: &StencilError) {
        tracing::warn!("skipping template {}: {err}", path.display());
        let errors = &mut self.scan().errors;
        if !errors.iter().any(|existing| existing.path == path) {
            errors.push(ScanError {
                path: path.to_path_buf(),
                reason: err.to_string(),
            });
        }
    }
}

/// Lazy walk over the current scan. Each definition is loaded when the
/// iterator reaches it; calling [`TemplateRegistry::list`] again restarts it.
pub struct Listing<'a> {
    registry: &'a mut TemplateRegistry,
    next: usize,
    exports: HashSet<String>,
}

impl Iterator for Listing<'_> {
    type Item = (TemplateKey, String);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let idx = self.next;
            let candidate = self.registry.scan().candidates.get(idx)?.clone();
            self.next += 1;

            let handle = match self
                .registry
                .load_candidate(idx)
                .and_then(|handle| validate_metadata(handle.descriptor()).map(|()| handle))
            {
                Ok(handle) => handle,
                Err(err) => {
                    self.registry.record_error(&candidate.path, &err);
                    continue;
                }
            };

            if !self.exports.insert(handle.export_name().to_string()) {
                let err = StencilError::script_load(
                    &candidate.path,
                    format!(
                        "export {} was already listed by an earlier template",
                        handle.export_name()
                    ),
                );
                self.registry.record_error(&candidate.path, &err);
                continue;
            }

            return Some((candidate.key, handle.display_name()));
        }
    }
}

fn default_loaders() -> Vec<Box<dyn TemplateLoader>> {
    #[allow(unused_mut)]
    let mut loaders: Vec<Box<dyn TemplateLoader>> = vec![Box::new(ScriptLoader)];

    #[cfg(feature = "plugins")]
    loaders.push(Box::new(crate::template::wasm::WasmLoader::default()));

    loaders
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::test_support::{BAD_METADATA, BOOK, BROKEN, NO_EXPORT, WISHLIST, write_template};

    fn registry(dir: &Path) -> TemplateRegistry {
        TemplateRegistry::with_loaders(
            dir,
            BaseCapability::new("BaseTemplate"),
            vec![Box::new(ScriptLoader)],
        )
    }

    fn keys(registry: &mut TemplateRegistry) -> Vec<String> {
        registry.list().map(|(key, _)| key.0).collect()
    }

    #[test]
    fn lists_valid_templates_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "wishlist.toml", WISHLIST);
        write_template(dir.path(), "book.toml", BOOK);
        write_template(dir.path(), "README.md", "not a template");

        let mut registry = registry(dir.path());
        let listed: Vec<_> = registry.list().collect();
        assert_eq!(
            listed,
            vec![
                (TemplateKey::new("book"), "Book".to_string()),
                (TemplateKey::new("wishlist"), "Wishlist".to_string()),
            ]
        );
    }

    #[test]
    fn one_broken_definition_does_not_hide_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "wishlist.toml", WISHLIST);
        let mut registry = registry(dir.path());
        let before = keys(&mut registry);

        write_template(dir.path(), "aaa.toml", BROKEN);
        write_template(dir.path(), "orphan.toml", NO_EXPORT);
        write_template(dir.path(), "sparse.toml", BAD_METADATA);
        registry.rescan();

        assert_eq!(keys(&mut registry), before);
        assert_eq!(registry.errors().len(), 3);
    }

    #[test]
    fn every_listed_key_resolves_with_core_fields() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "wishlist.toml", WISHLIST);
        write_template(dir.path(), "book.toml", BOOK);
        write_template(dir.path(), "broken.toml", BROKEN);

        let mut registry = registry(dir.path());
        for key in keys(&mut registry) {
            let handle = registry.resolve(&key).unwrap();
            assert!(validate_metadata(handle.descriptor()).is_ok());
            for core in ["title", "url", "type"] {
                assert!(handle.descriptor().required_fields.iter().any(|f| f == core));
            }
        }
    }

    #[test]
    fn resolve_reports_not_found_and_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "broken.toml", BROKEN);
        write_template(dir.path(), "orphan.toml", NO_EXPORT);
        let mut registry = registry(dir.path());

        assert!(matches!(
            registry.resolve("unknown"),
            Err(StencilError::TemplateNotFound(key)) if key == "unknown"
        ));
        assert!(matches!(
            registry.resolve("broken"),
            Err(StencilError::ScriptLoad { .. })
        ));
        assert!(matches!(
            registry.resolve("orphan"),
            Err(StencilError::ExportNotFound { .. })
        ));
    }

    #[test]
    fn keys_are_case_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "wishlist.toml", WISHLIST);
        let mut registry = registry(dir.path());
        assert!(registry.resolve("Wishlist").is_err());
        assert!(registry.resolve("wishlist").is_ok());
    }

    #[test]
    fn handles_are_cached_until_rescan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "wishlist.toml", WISHLIST);
        let mut registry = registry(dir.path());
        assert_eq!(registry.resolve("wishlist").unwrap().descriptor().name, "Wishlist");

        fs::write(&path, WISHLIST.replace("name = \"Wishlist\"", "name = \"Gifts\"")).unwrap();
        assert_eq!(registry.resolve("wishlist").unwrap().descriptor().name, "Wishlist");

        registry.rescan();
        assert_eq!(registry.resolve("wishlist").unwrap().descriptor().name, "Gifts");
    }

    #[test]
    fn colliding_exports_keep_the_first_file() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "Wishlist.toml", WISHLIST);
        write_template(dir.path(), "wishlist.toml", WISHLIST);

        let mut registry = registry(dir.path());
        assert_eq!(keys(&mut registry), ["Wishlist"]);

        let errors = registry.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, dir.path().join("wishlist.toml"));
        assert!(errors[0].reason.contains("WishlistTemplate"));
    }

    #[test]
    fn contains_checks_discovery_without_loading() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "broken.toml", BROKEN);
        let mut registry = registry(dir.path());

        assert!(registry.contains("broken"));
        assert!(!registry.contains("unknown"));
        let scan = registry.scan();
        assert!(scan.handles.is_empty());
        assert!(scan.errors.is_empty());
    }

    #[test]
    fn listing_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "wishlist.toml", WISHLIST);
        write_template(dir.path(), "book.toml", BOOK);
        let mut registry = registry(dir.path());

        let first = keys(&mut registry);
        let second = keys(&mut registry);
        assert_eq!(first, second);
        assert_eq!(registry.list().take(1).count(), 1);
    }

    #[test]
    fn shipped_templates_load() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates");
        let mut registry = registry(&dir);
        assert_eq!(keys(&mut registry), ["book", "wishlist"]);
        assert!(registry.errors().is_empty());
        assert_eq!(
            registry.resolve("book").unwrap().export_name(),
            "ReadingListTemplate"
        );
    }

    #[test]
    fn missing_directory_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = registry(&dir.path().join("absent"));
        assert_eq!(registry.list().count(), 0);
        assert!(matches!(
            registry.resolve("wishlist"),
            Err(StencilError::TemplateNotFound(_))
        ));
    }
}
