//! Plugin loading
//!
//! The [`Loader`] fetches descriptors from a [`PluginSource`], validates
//! them once, and caches them until invalidated (reload drops the cache
//! entry so the descriptor and code are re-fetched). Code arrives as a
//! [`PluginFactory`]: a one-shot constructor taking the sandbox-built
//! capability surface as its only input.
//!
//! Two sources ship with the runtime: [`DirectorySource`] loads
//! `plugin.json` plus a dynamic library from a plugins directory, and
//! [`StaticSource`] serves factories compiled into the host binary
//! (built-in plugins, and every test in this crate).

use crate::error::HostError;
use crate::manifest;
use async_trait::async_trait;
use libloading::Library;
use modforge_plugin_api::{API_VERSION, CapabilitySurface, Plugin, PluginDescriptor};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// A one-shot plugin constructor.
///
/// `library`, when present, must stay alive for as long as the constructed
/// instance does; the host moves it into the plugin's record.
pub struct PluginFactory {
    construct: Box<dyn FnOnce(CapabilitySurface) -> Box<dyn Plugin> + Send>,
    library: Option<Library>,
}

impl PluginFactory {
    /// Factory for a statically linked plugin.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce(CapabilitySurface) -> Box<dyn Plugin> + Send + 'static,
    {
        Self {
            construct: Box::new(f),
            library: None,
        }
    }

    /// Construct the instance, splitting off the backing library (if any).
    pub fn build(self, surface: CapabilitySurface) -> (Box<dyn Plugin>, Option<Library>) {
        ((self.construct)(surface), self.library)
    }
}

/// Where descriptors and plugin code come from.
#[async_trait]
pub trait PluginSource: Send + Sync {
    /// Fetch the raw (unvalidated) descriptor JSON for `id`.
    async fn fetch_descriptor(&self, id: &str) -> Result<Value, HostError>;

    /// Fetch the plugin's code as an instantiable factory.
    async fn fetch_factory(&self, descriptor: &PluginDescriptor) -> Result<PluginFactory, HostError>;
}

/// Descriptor cache and factory fetch, in front of a [`PluginSource`].
pub struct Loader {
    source: Box<dyn PluginSource>,
    cache: Mutex<HashMap<String, Arc<PluginDescriptor>>>,
}

impl Loader {
    pub fn new(source: Box<dyn PluginSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch and validate the descriptor for `id`, or return the cached one.
    pub async fn load_descriptor(&self, id: &str) -> Result<Arc<PluginDescriptor>, HostError> {
        if let Some(cached) = self.cache.lock().ok().and_then(|c| c.get(id).cloned()) {
            return Ok(cached);
        }

        let raw = self.source.fetch_descriptor(id).await?;
        let descriptor = manifest::validate(&raw).map_err(|source| HostError::Validation {
            id: id.to_string(),
            source,
        })?;
        let descriptor = Arc::new(descriptor);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(id.to_string(), descriptor.clone());
        }
        Ok(descriptor)
    }

    /// Fetch the plugin's code and wrap it as a factory.
    pub async fn load_factory(
        &self,
        descriptor: &PluginDescriptor,
    ) -> Result<PluginFactory, HostError> {
        self.source.fetch_factory(descriptor).await
    }

    /// Drop one cached descriptor, or all of them.
    pub fn invalidate(&self, id: Option<&str>) {
        if let Ok(mut cache) = self.cache.lock() {
            match id {
                Some(id) => {
                    cache.remove(id);
                }
                None => cache.clear(),
            }
        }
    }
}

// ─── Directory source ────────────────────────────────────────────────

type CreateFn = extern "C" fn(*mut CapabilitySurface) -> *mut dyn Plugin;

/// Loads plugins from a directory tree: `<root>/<id>/plugin.json` plus a
/// dynamic library named by the descriptor's `main` field (or the platform
/// `lib<id>.<ext>` conventions).
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn find_library(&self, descriptor: &PluginDescriptor) -> Result<PathBuf, HostError> {
        let dir = self.root.join(&descriptor.id);

        if let Some(main) = &descriptor.main {
            let path = dir.join(main);
            if path.exists() {
                return Ok(path);
            }
            return Err(HostError::Fetch {
                id: descriptor.id.clone(),
                reason: format!("entry point {} not found", path.display()),
            });
        }

        let extensions: &[&str] = if cfg!(target_os = "macos") {
            &["dylib", "so"]
        } else if cfg!(target_os = "windows") {
            &["dll"]
        } else {
            &["so"]
        };

        for ext in extensions {
            for name in [
                format!("{}.{ext}", descriptor.id),
                format!("lib{}.{ext}", descriptor.id.replace('-', "_")),
            ] {
                let path = dir.join(name);
                if path.exists() {
                    return Ok(path);
                }
            }
        }

        Err(HostError::Fetch {
            id: descriptor.id.clone(),
            reason: format!("no plugin library in {}", dir.display()),
        })
    }
}

#[async_trait]
impl PluginSource for DirectorySource {
    async fn fetch_descriptor(&self, id: &str) -> Result<Value, HostError> {
        let path = self.root.join(id).join("plugin.json");
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| HostError::Fetch {
                id: id.to_string(),
                reason: format!("{}: {e}", path.display()),
            })?;
        serde_json::from_str(&content).map_err(|e| HostError::Validation {
            id: id.to_string(),
            source: manifest::ValidationError::Malformed(e.to_string()),
        })
    }

    async fn fetch_factory(
        &self,
        descriptor: &PluginDescriptor,
    ) -> Result<PluginFactory, HostError> {
        let id = descriptor.id.clone();
        let lib_path = self.find_library(descriptor)?;

        // SAFETY: loading a library the operator placed in the plugins
        // directory; it is expected to be built against this API version,
        // which is checked below before anything is instantiated.
        let library = unsafe { Library::new(&lib_path) }.map_err(|e| HostError::Fetch {
            id: id.clone(),
            reason: e.to_string(),
        })?;

        // SAFETY: symbols generated by the plugin-api export macro.
        let found = unsafe {
            library
                .get::<extern "C" fn() -> u32>(b"_modforge_plugin_api_version")
                .map(|f| f())
        }
        .map_err(|e| HostError::Fetch {
            id: id.clone(),
            reason: e.to_string(),
        })?;
        if found != API_VERSION {
            return Err(HostError::ApiVersionMismatch {
                id,
                expected: API_VERSION,
                found,
            });
        }

        // SAFETY: same contract; the fn pointer is copied out and the
        // library is carried alongside it in the factory.
        let create: CreateFn = unsafe {
            library
                .get::<CreateFn>(b"_modforge_plugin_create")
                .map(|sym| *sym)
        }
        .map_err(|e| HostError::Fetch {
            id: id.clone(),
            reason: e.to_string(),
        })?;

        let construct = Box::new(move |surface: CapabilitySurface| -> Box<dyn Plugin> {
            let surface = Box::into_raw(Box::new(surface));
            let raw = create(surface);
            // SAFETY: the create entry point returns a Box::into_raw'd
            // instance; ownership transfers back to the host here.
            unsafe { Box::from_raw(raw) }
        });

        Ok(PluginFactory {
            construct,
            library: Some(library),
        })
    }
}

// ─── Static source ───────────────────────────────────────────────────

type StaticFactory = Arc<dyn Fn(CapabilitySurface) -> Box<dyn Plugin> + Send + Sync>;

/// Serves descriptors and factories registered in memory.
///
/// This is how built-in plugins compiled into the host binary are loaded,
/// and the source every test uses.
#[derive(Default)]
pub struct StaticSource {
    descriptors: Mutex<HashMap<String, Value>>,
    factories: Mutex<HashMap<String, StaticFactory>>,
    descriptor_fetches: Mutex<HashMap<String, usize>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. The descriptor JSON must carry an `id` field.
    pub fn register<F>(&self, descriptor: Value, factory: F)
    where
        F: Fn(CapabilitySurface) -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let id = descriptor
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if let Ok(mut descriptors) = self.descriptors.lock() {
            descriptors.insert(id.clone(), descriptor);
        }
        if let Ok(mut factories) = self.factories.lock() {
            factories.insert(id, Arc::new(factory));
        }
    }

    /// How many times the descriptor for `id` has been fetched (cache
    /// misses only). Reload tests assert this goes up.
    pub fn descriptor_fetches(&self, id: &str) -> usize {
        self.descriptor_fetches
            .lock()
            .ok()
            .and_then(|m| m.get(id).copied())
            .unwrap_or(0)
    }
}

#[async_trait]
impl PluginSource for StaticSource {
    async fn fetch_descriptor(&self, id: &str) -> Result<Value, HostError> {
        if let Ok(mut fetches) = self.descriptor_fetches.lock() {
            *fetches.entry(id.to_string()).or_insert(0) += 1;
        }
        self.descriptors
            .lock()
            .ok()
            .and_then(|d| d.get(id).cloned())
            .ok_or_else(|| HostError::Fetch {
                id: id.to_string(),
                reason: "no such plugin registered".to_string(),
            })
    }

    async fn fetch_factory(
        &self,
        descriptor: &PluginDescriptor,
    ) -> Result<PluginFactory, HostError> {
        let factory = self
            .factories
            .lock()
            .ok()
            .and_then(|f| f.get(&descriptor.id).cloned())
            .ok_or_else(|| HostError::Fetch {
                id: descriptor.id.clone(),
                reason: "no factory registered".to_string(),
            })?;
        Ok(PluginFactory::from_fn(move |surface| factory(surface)))
    }
}
