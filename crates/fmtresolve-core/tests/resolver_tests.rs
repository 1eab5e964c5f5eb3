use anyhow::{anyhow, Result};
use fmtresolve_core::fs::{FileSystem, RealFileSystem};
use fmtresolve_core::manifest::MarkerFileBoundary;
use fmtresolve_core::module::{
    Capability, FileInfo, FormatOptions, FormatterModule, ModuleLoader, ResolveConfigOptions,
};
use fmtresolve_core::prompt::NoPrompt;
use fmtresolve_core::workspace::WorkspaceFolders;
use fmtresolve_core::{Document, LoadError, ModuleResolver, ResolvedConfig, ResolverSettings};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const PACKAGE: &str = "formatter";
const CONFIG_FILE: &str = ".formatterrc";

/// Module described by the `package.json` of its install directory.
///
/// An optional `"capabilities"` array lists the exports; without it the
/// module has them all. Config files are JSON named `.formatterrc`.
#[derive(Debug)]
struct FixtureModule {
    version: Option<String>,
    capabilities: Vec<Capability>,
    clears: AtomicUsize,
}

impl FormatterModule for FixtureModule {
    fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    fn format(&self, source: &str, _options: &FormatOptions) -> Result<String> {
        Ok(source.to_string())
    }

    fn support_info(&self) -> Result<Value> {
        Ok(Value::Null)
    }

    fn file_info(&self, _path: &Path, _ignore_path: Option<&Path>) -> Result<FileInfo> {
        Ok(FileInfo::default())
    }

    fn resolve_config_file(&self, path: &Path) -> Result<Option<PathBuf>> {
        Ok(path
            .ancestors()
            .skip(1)
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file()))
    }

    fn resolve_config(
        &self,
        _path: &Path,
        options: &ResolveConfigOptions,
    ) -> Result<Option<FormatOptions>> {
        let Some(config) = &options.config else {
            return Ok(None);
        };
        let raw = fs::read_to_string(config)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn clear_config_cache(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct FixtureLoader {
    loads: AtomicUsize,
}

impl FixtureLoader {
    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModuleLoader for FixtureLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn FormatterModule>, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let dir = if path.is_dir() {
            path
        } else {
            path.parent().unwrap_or(path)
        };
        let raw = fs::read_to_string(dir.join("package.json"))
            .map_err(|e| LoadError::new(path, e))?;
        let manifest: Value = serde_json::from_str(&raw).map_err(|e| LoadError::new(path, e))?;

        let capabilities = match manifest.get("capabilities").and_then(Value::as_array) {
            Some(names) => Capability::ALL
                .into_iter()
                .filter(|c| names.iter().any(|n| n.as_str() == Some(c.export_name())))
                .collect(),
            None => Capability::ALL.to_vec(),
        };
        if manifest.get("broken").is_some() {
            return Err(LoadError::new(path, anyhow!("Cannot find module './lib'")));
        }

        Ok(Arc::new(FixtureModule {
            version: manifest
                .get("version")
                .and_then(Value::as_str)
                .map(str::to_string),
            capabilities,
            clears: AtomicUsize::new(0),
        }))
    }
}

/// Real filesystem that counts every probe.
#[derive(Debug, Default)]
struct CountingFs {
    probes: AtomicUsize,
}

impl CountingFs {
    fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl FileSystem for CountingFs {
    fn is_file(&self, path: &Path) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        RealFileSystem.is_file(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        RealFileSystem.is_dir(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        RealFileSystem.exists(path)
    }

    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        RealFileSystem.read_to_string(path)
    }
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

struct Fixture {
    _tmp: tempfile::TempDir,
    proj: PathBuf,
    loader: Arc<FixtureLoader>,
    bundled: Arc<FixtureModule>,
}

impl Fixture {
    /// `proj/` declaring `formatter` as a devDependency, installed with `install_manifest`.
    fn new(install_manifest: Option<&str>) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join(MarkerFileBoundary::DEFAULT_MARKER), "");
        let proj = tmp.path().join("proj");
        write(&proj.join("src/a.js"), "const a = 1;\n");
        write(&proj.join("src/nested/deep/b.js"), "");

        if let Some(manifest) = install_manifest {
            write(
                &proj.join("package.json"),
                r#"{"name": "proj", "devDependencies": {"formatter": "^2.0.0"}}"#,
            );
            write(&proj.join("node_modules/formatter/package.json"), manifest);
            write(&proj.join("node_modules/formatter/index.js"), "");
        }

        Self {
            _tmp: tmp,
            proj,
            loader: Arc::new(FixtureLoader::default()),
            bundled: Arc::new(FixtureModule {
                version: Some("3.3.3".into()),
                capabilities: Capability::ALL.to_vec(),
                clears: AtomicUsize::new(0),
            }),
        }
    }

    fn resolver(&self) -> ModuleResolver {
        ModuleResolver::new(
            PACKAGE,
            self.bundled.clone(),
            self.loader.clone(),
            Arc::new(NoPrompt),
        )
        .with_walk_boundary(Arc::new(MarkerFileBoundary::default()))
        .with_workspace(WorkspaceFolders::new([self.proj.clone()]))
    }

    fn file(&self) -> PathBuf {
        self.proj.join("src/a.js")
    }
}

#[tokio::test]
async fn test_local_dev_dependency_is_resolved_and_cached() {
    let fixture = Fixture::new(Some(r#"{"name": "formatter", "version": "2.3.0"}"#));
    let resolver = fixture.resolver();
    let settings = ResolverSettings::default();

    let first = resolver
        .get_instance(&fixture.file(), &settings)
        .await
        .unwrap()
        .expect("local module");
    let second = resolver
        .get_instance(&fixture.file(), &settings)
        .await
        .unwrap()
        .expect("local module");

    assert_eq!(first.version(), Some("2.3.0"));
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fixture.loader.loads(), 1);
}

#[tokio::test]
async fn test_outdated_local_version_is_unresolved() {
    let fixture = Fixture::new(Some(r#"{"name": "formatter", "version": "1.0.0"}"#));
    let resolver = fixture.resolver();

    let resolved = resolver
        .get_instance(&fixture.file(), &ResolverSettings::default())
        .await
        .unwrap();

    assert!(resolved.is_none());
    assert!(resolver.caches().modules.is_empty());
}

#[tokio::test]
async fn test_minimum_version_is_accepted() {
    let fixture = Fixture::new(Some(r#"{"name": "formatter", "version": "1.13.0"}"#));
    let resolved = fixture
        .resolver()
        .get_instance(&fixture.file(), &ResolverSettings::default())
        .await
        .unwrap();
    assert_eq!(resolved.unwrap().version(), Some("1.13.0"));
}

#[tokio::test]
async fn test_missing_capability_is_unresolved() {
    let fixture = Fixture::new(Some(
        r#"{"version": "2.3.0", "capabilities": ["format", "getSupportInfo", "getFileInfo"]}"#,
    ));
    let resolved = fixture
        .resolver()
        .get_instance(&fixture.file(), &ResolverSettings::default())
        .await
        .unwrap();
    assert!(resolved.is_none());
}

#[tokio::test]
async fn test_explicit_path_to_non_formatter_is_unresolved() {
    let fixture = Fixture::new(None);
    write(
        &fixture.proj.join("vendor/not-a-formatter/package.json"),
        r#"{"version": "9.0.0", "capabilities": ["resolveConfig"]}"#,
    );
    let settings = ResolverSettings {
        prettier_path: Some("vendor/not-a-formatter".into()),
        ..ResolverSettings::default()
    };

    let resolved = fixture
        .resolver()
        .get_instance(&fixture.file(), &settings)
        .await
        .unwrap();
    assert!(resolved.is_none());
    assert_eq!(fixture.loader.loads(), 1);
}

#[tokio::test]
async fn test_broken_install_does_not_fall_back() {
    let fixture = Fixture::new(Some(r#"{"version": "2.3.0", "broken": true}"#));
    let resolved = fixture
        .resolver()
        .get_instance(&fixture.file(), &ResolverSettings::default())
        .await
        .unwrap();
    assert!(resolved.is_none());
}

#[tokio::test]
async fn test_no_dependency_uses_bundled() {
    let fixture = Fixture::new(None);
    let resolver = fixture.resolver();

    let resolved = resolver
        .get_instance(&fixture.file(), &ResolverSettings::default())
        .await
        .unwrap()
        .expect("bundled module");

    assert_eq!(resolved.version(), Some("3.3.3"));
    assert!(Arc::ptr_eq(&resolved, &resolver.bundled()));
    assert_eq!(fixture.loader.loads(), 0);
}

#[tokio::test]
async fn test_only_local_version_without_local_module() {
    let fixture = Fixture::new(None);
    let settings = ResolverSettings {
        only_use_local_version: true,
        resolve_global_modules: true,
        ..ResolverSettings::default()
    };
    let resolved = fixture
        .resolver()
        .get_instance(&fixture.file(), &settings)
        .await
        .unwrap();
    assert!(resolved.is_none());
}

#[tokio::test]
async fn test_descendants_share_the_cached_path() {
    let fixture = Fixture::new(Some(r#"{"version": "2.3.0"}"#));
    let fs = Arc::new(CountingFs::default());
    let resolver = fixture.resolver().with_file_system(fs.clone());
    let settings = ResolverSettings::default();
    let deep = fixture.proj.join("src/nested/deep/b.js");

    resolver.get_instance(&fixture.file(), &settings).await.unwrap();
    resolver.get_instance(&deep, &settings).await.unwrap();

    let entry = fixture.proj.join("node_modules/formatter/index.js");
    let paths = &resolver.caches().paths;
    assert_eq!(paths.get(&fixture.file(), PACKAGE), Some(entry.clone()));
    assert_eq!(paths.get(&deep, PACKAGE), Some(entry));

    let probes = fs.probes();
    assert!(probes > 0);
    resolver.get_instance(&deep, &settings).await.unwrap();
    assert_eq!(fs.probes(), probes);
    assert_eq!(fixture.loader.loads(), 1);
}

#[tokio::test]
async fn test_dispose_forces_fresh_load() {
    let fixture = Fixture::new(Some(r#"{"version": "2.3.0"}"#));
    let resolver = fixture.resolver();
    let settings = ResolverSettings::default();

    let before = resolver
        .get_instance(&fixture.file(), &settings)
        .await
        .unwrap()
        .unwrap();
    resolver.dispose();

    assert!(resolver.caches().modules.is_empty());
    assert_eq!(fixture.bundled.clears.load(Ordering::SeqCst), 1);

    let after = resolver
        .get_instance(&fixture.file(), &settings)
        .await
        .unwrap()
        .unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(fixture.loader.loads(), 2);
}

#[tokio::test]
async fn test_config_from_nearest_file() {
    let fixture = Fixture::new(Some(r#"{"version": "2.3.0"}"#));
    write(&fixture.proj.join(CONFIG_FILE), r#"{"semi": false, "tabWidth": 4}"#);
    let document = Document::from_path(fixture.file()).unwrap();

    let resolved = fixture
        .resolver()
        .get_resolved_config(&document, &ResolverSettings::default())
        .await
        .unwrap();

    assert_eq!(
        resolved.to_json(),
        serde_json::json!({ "semi": false, "tabWidth": 4 })
    );
}

#[tokio::test]
async fn test_invalid_config_reports_error() {
    let fixture = Fixture::new(None);
    write(&fixture.proj.join(CONFIG_FILE), "{ semi: ");
    let document = Document::from_path(fixture.file()).unwrap();

    let resolved = fixture
        .resolver()
        .get_resolved_config(&document, &ResolverSettings::default())
        .await
        .unwrap();
    assert_eq!(resolved, ResolvedConfig::Error);
}

#[tokio::test]
async fn test_require_config_without_file_is_disabled() {
    let fixture = Fixture::new(None);
    let document = Document::from_path(fixture.file()).unwrap();
    let settings = ResolverSettings {
        require_config: true,
        ..ResolverSettings::default()
    };

    let resolved = fixture
        .resolver()
        .get_resolved_config(&document, &settings)
        .await
        .unwrap();
    assert_eq!(resolved, ResolvedConfig::Disabled);
}

#[tokio::test]
async fn test_virtual_document_has_no_config() {
    let fixture = Fixture::new(Some(r#"{"version": "2.3.0"}"#));
    let fs = Arc::new(CountingFs::default());
    let resolver = fixture.resolver().with_file_system(fs.clone());
    let document = Document::new(url::Url::parse("untitled:Untitled-1").unwrap());

    let resolved = resolver
        .get_resolved_config(&document, &ResolverSettings::default())
        .await
        .unwrap();

    assert_eq!(resolved, ResolvedConfig::NoConfig);
    assert_eq!(fs.probes(), 0);
    assert_eq!(fixture.loader.loads(), 0);
}
