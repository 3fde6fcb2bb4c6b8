//! On-disk definition files.
//!
//! A [`Definition`] abstracts one schema file: it parses the filename
//! grammar `(PORT_ID '.')? SHORT_NAME '.' MAJOR '.' MINOR '.' EXT`, derives
//! the full name from the directory path relative to the root namespace,
//! and reads the source text on demand. Upper layers never touch the file
//! system through anything else.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, ErrorKind, Result};
use crate::types::{Version, NAME_COMPONENT_SEPARATOR};

/// Recognized definition file extensions.
pub const DSDL_FILE_EXTENSIONS: &[&str] = &["dsdl", "uavcan"];

#[derive(Debug, Clone)]
pub struct Definition {
    file_path: PathBuf,
    full_name: String,
    version: Version,
    fixed_port_id: Option<u32>,
}

impl Definition {
    /// `file_path` must be located under `root_namespace_path`; the name of
    /// the root directory becomes the first name component.
    pub fn new(file_path: PathBuf, root_namespace_path: &Path) -> Result<Self> {
        let at = |kind: ErrorKind| Error::new(kind).with_location(Some(&file_path), None);

        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| at(ErrorKind::FileName("Invalid file name".into())))?;

        // E.g. "434.GetTransportStatistics.0.1.dsdl" -> 434, name, 0, 1.
        let parts: Vec<&str> = file_name.split(NAME_COMPONENT_SEPARATOR).collect();
        let (fixed_port_id, short_name, major, minor) = match parts.as_slice() {
            [port, short, major, minor, _ext] => (Some(*port), *short, *major, *minor),
            [short, major, minor, _ext] => (None, *short, *major, *minor),
            _ => return Err(at(ErrorKind::FileName("Invalid file name".into()))),
        };

        let fixed_port_id = match fixed_port_id {
            Some(text) => Some(text.parse::<u32>().map_err(|_| {
                at(ErrorKind::FileName(format!(
                    "Not a valid fixed port-ID: {}. \
                     Namespaces are defined as directories; \
                     putting the namespace name in the file name will not work.",
                    text
                )))
            })?),
            None => None,
        };

        let parse_version = |text: &str| {
            text.parse::<u64>().map_err(|_| {
                at(ErrorKind::FileName(
                    "Could not parse the version numbers".into(),
                ))
            })
        };
        let version = Version::new(parse_version(major)?, parse_version(minor)?)
            .map_err(|e| e.with_location(Some(&file_path), None))?;

        // Directory components between the root and the file extend the name.
        let root_name = root_namespace_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| at(ErrorKind::FileName("Invalid namespace name".into())))?;
        if root_name.contains(NAME_COMPONENT_SEPARATOR) {
            return Err(at(ErrorKind::FileName("Invalid namespace name".into())));
        }
        let relative = file_path.strip_prefix(root_namespace_path).map_err(|_| {
            at(ErrorKind::Internal(
                "Definition file is not under its root namespace directory".into(),
            ))
        })?;
        let mut components = vec![root_name.to_string()];
        for part in relative.parent().unwrap_or_else(|| Path::new("")).components() {
            let part = part
                .as_os_str()
                .to_str()
                .ok_or_else(|| at(ErrorKind::FileName("Invalid namespace name".into())))?;
            if part.contains(NAME_COMPONENT_SEPARATOR) {
                return Err(at(ErrorKind::FileName(format!(
                    "Invalid name for namespace component: {:?}",
                    part
                ))));
            }
            components.push(part.to_string());
        }
        components.push(short_name.to_string());
        let full_name = components.join(".");

        Ok(Definition {
            file_path,
            full_name,
            version,
            fixed_port_id,
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn short_name(&self) -> &str {
        self.full_name
            .rsplit(NAME_COMPONENT_SEPARATOR)
            .next()
            .unwrap_or_default()
    }

    pub fn full_namespace(&self) -> &str {
        self.full_name
            .rsplit_once(NAME_COMPONENT_SEPARATOR)
            .map(|(ns, _)| ns)
            .unwrap_or_default()
    }

    pub fn root_namespace(&self) -> &str {
        self.full_name
            .split(NAME_COMPONENT_SEPARATOR)
            .next()
            .unwrap_or_default()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn fixed_port_id(&self) -> Option<u32> {
        self.fixed_port_id
    }

    /// Reads the whole source text; the file handle is not kept open.
    pub fn read_text(&self) -> Result<String> {
        fs::read_to_string(&self.file_path)
            .map_err(|e| Error::from(e).with_location(Some(&self.file_path), None))
    }
}
