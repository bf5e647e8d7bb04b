use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;
use zip::ZipArchive;

use crate::classfile;
use crate::filter::CallFilter;
use crate::model::ClassInfo;

/// Extraction failure. `NotFound` and `Malformed` are non-fatal to a build
/// and end up as negative cache entries; `Callback` wraps a filter failure
/// and aborts the whole build.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("class {0} not found on the classpath")]
    NotFound(String),
    #[error("failed to parse class {class_name}: {reason:#}")]
    Malformed {
        class_name: String,
        reason: anyhow::Error,
    },
    #[error("call filter failed: {0:#}")]
    Callback(anyhow::Error),
}

/// Produces the declared methods of one class together with their immediate,
/// unexpanded call sites, in declaration and program order respectively.
pub trait MethodExtractor {
    fn extract(
        &mut self,
        class_name: &str,
        filter: &dyn CallFilter,
    ) -> Result<ClassInfo, ExtractError>;
}

/// Extractor backed by classpath roots: directories of `.class` files and
/// JAR archives. Archives are opened once and kept open for the life of the
/// extractor; directories are probed per lookup.
pub struct ClasspathExtractor {
    directories: Vec<PathBuf>,
    jars: Vec<PathBuf>,
    archives: HashMap<PathBuf, ZipArchive<fs::File>>,
}

impl ClasspathExtractor {
    pub fn new(roots: &[PathBuf]) -> Result<Self> {
        let mut directories = Vec::new();
        let mut jars = Vec::new();
        for root in roots {
            if root.is_dir() {
                directories.push(root.clone());
            } else if root.extension().and_then(|ext| ext.to_str()) == Some("jar") {
                jars.push(root.clone());
            } else {
                anyhow::bail!("unsupported classpath entry: {}", root.display());
            }
        }
        Ok(Self {
            directories,
            jars,
            archives: HashMap::new(),
        })
    }

    fn locate(&mut self, class_name: &str) -> Result<Option<Vec<u8>>> {
        let entry_path = format!("{}.class", class_name.replace('.', "/"));

        for directory in &self.directories {
            let candidate = directory.join(&entry_path);
            if candidate.is_file() {
                let data = fs::read(&candidate)
                    .with_context(|| format!("failed to read {}", candidate.display()))?;
                return Ok(Some(data));
            }
        }

        for index in 0..self.jars.len() {
            let jar = self.jars[index].clone();
            let archive = self.archive(&jar)?;
            let Ok(mut entry) = archive.by_name(&entry_path) else {
                continue;
            };
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .with_context(|| format!("failed to read {}:{}", jar.display(), entry_path))?;
            return Ok(Some(data));
        }

        Ok(None)
    }

    fn archive(&mut self, path: &Path) -> Result<&mut ZipArchive<fs::File>> {
        match self.archives.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = fs::File::open(path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                let archive = ZipArchive::new(file)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Ok(entry.insert(archive))
            }
        }
    }
}

impl MethodExtractor for ClasspathExtractor {
    fn extract(
        &mut self,
        class_name: &str,
        filter: &dyn CallFilter,
    ) -> Result<ClassInfo, ExtractError> {
        let data = match self.locate(class_name) {
            Ok(Some(data)) => data,
            Ok(None) => return Err(ExtractError::NotFound(class_name.to_string())),
            Err(reason) => {
                return Err(ExtractError::Malformed {
                    class_name: class_name.to_string(),
                    reason,
                });
            }
        };
        classfile::parse_class(class_name, &data, filter)
    }
}
