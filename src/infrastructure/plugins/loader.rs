//! Dynamic-library module source

use libloading::{Library, Symbol};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::application::errors::PluginError;
use crate::plugins::{Module, ModuleSource};

/// Symbol every module library must export
pub const ENTRY_SYMBOL: &[u8] = b"argent_module_init";

/// Function signature for module construction.
///
/// Libraries must be built with the same compiler as the host.
pub type ModuleInitFn = unsafe extern "Rust" fn() -> Box<dyn Module>;

/// Every library this process opened, keyed by path.
///
/// Statics are never dropped, so nothing here is ever unmapped: module
/// instances, handler closures and their vtables may outlive any registry
/// or source that loaded them.
static LIBRARIES: Lazy<Mutex<HashMap<PathBuf, Arc<Library>>>> = Lazy::new(Default::default);

/// Whether `path` has been opened by this process
pub fn is_mapped(path: &Path) -> bool {
    LIBRARIES
        .lock()
        .map(|libraries| libraries.contains_key(path))
        .unwrap_or(false)
}

/// Loads modules from `<dir>/<DLL_PREFIX><identifier><DLL_SUFFIX>`.
///
/// Opened libraries are shared process-wide and stay mapped until exit.
pub struct DylibSource {
    directory: PathBuf,
}

impl DylibSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn unit_path(&self, identifier: &str) -> PathBuf {
        self.directory.join(format!(
            "{}{}{}",
            std::env::consts::DLL_PREFIX,
            identifier,
            std::env::consts::DLL_SUFFIX
        ))
    }

    /// Identifier encoded in a library file name, if it looks like a module
    fn identifier_of(path: &Path) -> Option<String> {
        let name = path.file_name()?.to_str()?;
        let stem = name
            .strip_prefix(std::env::consts::DLL_PREFIX)?
            .strip_suffix(std::env::consts::DLL_SUFFIX)?;
        (!stem.is_empty()).then(|| stem.to_string())
    }

    fn open(path: &Path) -> Result<Arc<Library>, PluginError> {
        let mut libraries = LIBRARIES
            .lock()
            .map_err(|_| PluginError::Internal("Library cache poisoned".to_string()))?;

        if let Some(library) = libraries.get(path) {
            return Ok(library.clone());
        }

        let library = unsafe {
            Library::new(path)
                .map_err(|e| PluginError::Load(format!("Failed to open {}: {}", path.display(), e)))?
        };
        let library = Arc::new(library);
        libraries.insert(path.to_path_buf(), library.clone());
        Ok(library)
    }
}

impl ModuleSource for DylibSource {
    fn name(&self) -> &str {
        "dylib"
    }

    fn list_units(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Module directory {} unreadable: {}", self.directory.display(), e);
                return Vec::new();
            }
        };

        let mut units: Vec<String> = entries
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.path()),
                Err(e) => {
                    tracing::warn!("Failed to read directory entry: {}", e);
                    None
                }
            })
            .filter(|path| path.is_file())
            .filter_map(|path| Self::identifier_of(&path))
            .collect();
        units.sort();
        units
    }

    fn contains(&self, identifier: &str) -> bool {
        self.unit_path(identifier).is_file()
    }

    fn instantiate(&self, identifier: &str) -> Result<Box<dyn Module>, PluginError> {
        let path = self.unit_path(identifier);
        if !path.is_file() {
            return Err(PluginError::NotFound(identifier.to_string()));
        }

        let library = Self::open(&path)?;

        let init: Symbol<ModuleInitFn> = unsafe {
            library
                .get(ENTRY_SYMBOL)
                .map_err(|_| PluginError::NoModuleClass(identifier.to_string()))?
        };

        let module = catch_unwind(AssertUnwindSafe(|| unsafe { init() }))
            .map_err(|_| PluginError::Load(format!("{} panicked during construction", identifier)))?;

        tracing::info!("Opened module library: {}", path.display());
        Ok(module)
    }
}
