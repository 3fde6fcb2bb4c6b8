//! Namespace reading: the entry point of the front-end.
//!
//! [`read_namespace`] discovers every definition under a root namespace
//! directory, builds them all (resolving cross-references against the root
//! and the lookup namespaces), and runs the namespace-wide post-pass:
//! fixed port-ID uniqueness and bit compatibility across minor versions
//! under the same major version.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::builder::BuildContext;
use crate::definition::{Definition, DSDL_FILE_EXTENSIONS};
use crate::error::{Error, ErrorKind, Result};
use crate::types::{DataType, NAME_COMPONENT_SEPARATOR};

/// Invoked for `@print` output and diagnostics: (path, 1-based line, text).
pub type PrintHandler<'a> = dyn FnMut(&Path, usize, &str) + 'a;

/// Reads all definitions from the root namespace directory and returns them
/// sorted by full name, then by newest version first.
///
/// `lookup_directories` supply additional root namespaces for resolving
/// cross-namespace references; the target root itself is always included.
/// `print_handler` receives `@print` output and diagnostics. Unregulated
/// fixed port identifiers are rejected unless
/// `allow_unregulated_fixed_port_id` is set.
pub fn read_namespace<'a>(
    root_namespace_directory: &Path,
    lookup_directories: &[PathBuf],
    print_handler: Option<&'a mut PrintHandler<'a>>,
    allow_unregulated_fixed_port_id: bool,
) -> Result<Vec<DataType>> {
    let root = fs::canonicalize(root_namespace_directory)?;
    let mut roots = vec![root.clone()];
    for dir in lookup_directories {
        let dir = fs::canonicalize(dir)?;
        if !roots.contains(&dir) {
            roots.push(dir);
        }
    }
    roots.sort();

    ensure_no_nested_root_namespaces(&roots)?;
    ensure_no_namespace_name_collisions(&roots)?;

    let target_definitions = discover_definitions(&root)?;
    ensure_no_version_collisions(&target_definitions)?;

    let mut lookup_definitions = Vec::new();
    for dir in &roots {
        lookup_definitions.extend(discover_definitions(dir)?);
    }
    ensure_no_name_collisions(&target_definitions, &lookup_definitions)?;

    log::info!(
        "Reading {} definitions from the root namespace {:?} with {} lookup definitions",
        target_definitions.len(),
        root.display(),
        lookup_definitions.len()
    );

    let mut ctx = BuildContext::new(
        &lookup_definitions,
        print_handler,
        allow_unregulated_fixed_port_id,
    );
    let mut types = Vec::new();
    for definition in &target_definitions {
        types.push(ctx.build(definition)?);
    }

    ensure_no_fixed_port_id_collisions(&types)?;
    ensure_minor_version_compatibility(&types)?;

    types.sort_by(|a, b| {
        a.full_name()
            .cmp(b.full_name())
            .then(b.version().cmp(&a.version()))
    });
    Ok(types)
}

// ==================== Discovery ====================

/// Files and directories whose names begin with `.` or `_` are skipped.
fn discover_definitions(root: &Path) -> Result<Vec<Definition>> {
    let root_name = root.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if root_name.is_empty() || root_name.contains(NAME_COMPONENT_SEPARATOR) {
        return Err(
            Error::new(ErrorKind::FileName("Invalid namespace name".into()))
                .with_location(Some(root), None),
        );
    }
    let mut files = Vec::new();
    collect_definition_files(root, &mut files)?;
    files.sort();
    let mut definitions = Vec::new();
    for file in files {
        definitions.push(Definition::new(file, root)?);
    }
    // Lexicographically by name, newest version first.
    definitions.sort_by(|a, b| {
        a.full_name()
            .cmp(b.full_name())
            .then(b.version().cmp(&a.version()))
    });
    log::debug!(
        "Discovered {} definitions under {}",
        definitions.len(),
        root.display()
    );
    Ok(definitions)
}

fn collect_definition_files(directory: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || name.starts_with('_') {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            collect_definition_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| DSDL_FILE_EXTENSIONS.contains(&e))
        {
            out.push(path);
        }
    }
    Ok(())
}

// ==================== Pre-checks ====================

fn ensure_no_nested_root_namespaces(roots: &[PathBuf]) -> Result<()> {
    for a in roots {
        for b in roots {
            if a != b && a.starts_with(b) {
                return Err(Error::new(ErrorKind::Naming(format!(
                    "The following namespace is nested inside this one, \
                     which is not permitted: {}",
                    a.display()
                )))
                .with_location(Some(b), None));
            }
        }
    }
    Ok(())
}

fn ensure_no_namespace_name_collisions(roots: &[PathBuf]) -> Result<()> {
    let name_of = |p: &Path| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default()
    };
    for (i, a) in roots.iter().enumerate() {
        for b in &roots[i + 1..] {
            if name_of(a) == name_of(b) {
                return Err(Error::new(ErrorKind::Naming(format!(
                    "The name of this namespace conflicts with {}",
                    b.display()
                )))
                .with_location(Some(a), None));
            }
        }
    }
    Ok(())
}

/// True when `whole` equals `prefix` or begins with `prefix` followed by a
/// name component separator.
fn is_dotted_prefix(prefix: &str, whole: &str) -> bool {
    whole == prefix
        || (whole.len() > prefix.len()
            && whole.starts_with(prefix)
            && whole[prefix.len()..].starts_with(NAME_COMPONENT_SEPARATOR))
}

fn ensure_no_name_collisions(targets: &[Definition], lookups: &[Definition]) -> Result<()> {
    for target in targets {
        let target_name = target.full_name().to_ascii_lowercase();
        let target_namespace = target.full_namespace().to_ascii_lowercase();
        for lookup in lookups {
            let lookup_name = lookup.full_name().to_ascii_lowercase();
            if target.full_name() != lookup.full_name() && target_name == lookup_name {
                return Err(Error::new(ErrorKind::Naming(format!(
                    "Full name of this definition differs from {} only by letter case, \
                     which is not permitted",
                    lookup.file_path().display()
                )))
                .with_location(Some(target.file_path()), None));
            }
            if is_dotted_prefix(&lookup_name, &target_namespace) {
                return Err(Error::new(ErrorKind::Naming(format!(
                    "The namespace of this type conflicts with {}",
                    lookup.file_path().display()
                )))
                .with_location(Some(target.file_path()), None));
            }
            if is_dotted_prefix(&target_name, &lookup.full_namespace().to_ascii_lowercase()) {
                return Err(Error::new(ErrorKind::Naming(format!(
                    "This type conflicts with the namespace of {}",
                    lookup.file_path().display()
                )))
                .with_location(Some(target.file_path()), None));
            }
        }
    }
    Ok(())
}

fn ensure_no_version_collisions(targets: &[Definition]) -> Result<()> {
    for (i, a) in targets.iter().enumerate() {
        for b in &targets[i + 1..] {
            if a.full_name() == b.full_name() && a.version() == b.version() {
                return Err(Error::new(ErrorKind::Version(format!(
                    "This definition shares its version number with {}",
                    b.file_path().display()
                )))
                .with_location(Some(a.file_path()), None));
            }
        }
    }
    Ok(())
}

// ==================== Post-pass ====================

fn ensure_no_fixed_port_id_collisions(types: &[DataType]) -> Result<()> {
    for (i, a) in types.iter().enumerate() {
        for (j, b) in types.iter().enumerate() {
            if i == j {
                continue;
            }
            let different_names = a.full_name() != b.full_name();
            let different_major_versions = a.version().major != b.version().major;
            // Subject and service port ID sets are orthogonal.
            let same_kind = a.is_service() == b.is_service();
            // Types under major version zero are allowed to collide.
            let both_released = a.version().major > 0 && b.version().major > 0;
            let must_differ =
                same_kind && (different_names || (different_major_versions && both_released));
            if must_differ {
                if let (Some(x), Some(y)) = (a.fixed_port_id(), b.fixed_port_id()) {
                    if x == y {
                        return Err(Error::new(ErrorKind::PortId(format!(
                            "The fixed port ID of this definition is also used in {}",
                            b.source_file_path().display()
                        )))
                        .with_location(Some(a.source_file_path()), None));
                    }
                }
            }
        }
    }
    Ok(())
}

fn ensure_minor_version_compatibility(types: &[DataType]) -> Result<()> {
    let mut by_name: BTreeMap<&str, Vec<&DataType>> = BTreeMap::new();
    for t in types {
        by_name.entry(t.full_name()).or_default().push(t);
    }
    for group in by_name.values() {
        let mut by_major: BTreeMap<u8, Vec<&DataType>> = BTreeMap::new();
        for t in group {
            by_major.entry(t.version().major).or_default().push(t);
        }
        for subjects in by_major.values() {
            for (i, a) in subjects.iter().enumerate() {
                for (j, b) in subjects.iter().enumerate() {
                    if i == j {
                        continue;
                    }
                    check_minor_version_pair(a, b)?;
                }
            }
        }
    }
    Ok(())
}

fn check_minor_version_pair(a: &DataType, b: &DataType) -> Result<()> {
    let located =
        |kind: ErrorKind| Error::new(kind).with_location(Some(a.source_file_path()), None);

    if a.version().minor == b.version().minor {
        return Err(located(ErrorKind::Version(format!(
            "This definition shares its version number with {}",
            b.source_file_path().display()
        ))));
    }
    let compatible = match (a, b) {
        (DataType::Message(x), DataType::Message(y)) => x.is_bit_compatible_with(y),
        (DataType::Service(x), DataType::Service(y)) => {
            x.request_type().is_bit_compatible_with(y.request_type())
                && x.response_type().is_bit_compatible_with(y.response_type())
        }
        _ => {
            return Err(located(ErrorKind::Version(format!(
                "This definition is not of the same kind as {}",
                b.source_file_path().display()
            ))));
        }
    };
    if !compatible {
        return Err(located(ErrorKind::BitCompatibility(format!(
            "This definition is not bit-compatible with {}",
            b.source_file_path().display()
        ))));
    }
    // The same port ID must be used, or the older minor version may omit it.
    match (a.fixed_port_id(), b.fixed_port_id()) {
        (Some(x), Some(y)) if x != y => Err(located(ErrorKind::PortId(format!(
            "Different fixed port ID values under the same major version: {}",
            b.source_file_path().display()
        )))),
        (None, None) | (Some(_), Some(_)) => Ok(()),
        _ => {
            let must_have = if a.version().minor > b.version().minor {
                a
            } else {
                b
            };
            if must_have.fixed_port_id().is_none() {
                Err(Error::new(ErrorKind::PortId(
                    "Fixed port ID cannot be removed under the same major version".into(),
                ))
                .with_location(Some(must_have.source_file_path()), None))
            } else {
                Ok(())
            }
        }
    }
}
