use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use serde_sarif::sarif::{Artifact, ArtifactLocation, ArtifactRoles};
use zip::ZipArchive;

use crate::classfile::parse_class;
use crate::ir::Class;

/// Classes and artifacts collected from one input path.
#[derive(Debug, Default)]
pub struct ScanOutput {
    pub classes: Vec<Class>,
    pub artifacts: Vec<Artifact>,
    pub class_count: usize,
}

/// Read a `.class` file, a `.jar` or a directory tree of them.
///
/// Directory listings and JAR entries are visited in sorted order so the output is
/// deterministic.
pub fn scan_inputs(input: &Path) -> Result<ScanOutput> {
    let mut output = ScanOutput::default();
    scan_path(input, true, &mut output)?;
    log::debug!(
        "scanned {} classes from {}",
        output.class_count,
        input.display()
    );
    Ok(output)
}

fn scan_path(path: &Path, is_input: bool, output: &mut ScanOutput) -> Result<()> {
    if path.is_dir() {
        return scan_dir(path, output);
    }

    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    let roles = if is_input {
        Some(vec![
            serde_json::to_value(ArtifactRoles::AnalysisTarget)
                .context("failed to serialize artifact role")?,
        ])
    } else {
        None
    };

    match extension {
        "class" => scan_class_file(path, roles, output),
        "jar" => scan_jar_file(path, roles, output),
        _ if is_input => anyhow::bail!("unsupported input file: {}", path.display()),
        _ => Ok(()),
    }
}

fn scan_dir(path: &Path, output: &mut ScanOutput) -> Result<()> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)
        .with_context(|| format!("failed to read directory {}", path.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read entry under {}", path.display()))?;
        entries.push(entry.path());
    }

    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            scan_dir(&entry, output)?;
        } else {
            scan_path(&entry, false, output)?;
        }
    }

    Ok(())
}

fn scan_class_file(path: &Path, roles: Option<Vec<Value>>, output: &mut ScanOutput) -> Result<()> {
    if is_module_info(&path.to_string_lossy()) {
        return Ok(());
    }
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let class = parse_class(&data).with_context(|| format!("failed to parse {}", path.display()))?;
    output.classes.push(class);
    output.class_count += 1;

    push_artifact(path_to_uri(path), data.len() as u64, None, roles, output);
    Ok(())
}

fn scan_jar_file(path: &Path, roles: Option<Vec<Value>>, output: &mut ScanOutput) -> Result<()> {
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("failed to read {}", path.display()))?;

    let jar_len = fs::metadata(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .len();
    let jar_index = push_artifact(path_to_uri(path), jar_len, None, roles, output);

    let mut entry_names = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name.ends_with(".class") && !is_module_info(&name) {
            entry_names.push(name);
        }
    }

    entry_names.sort();

    for name in entry_names {
        let mut entry = archive
            .by_name(&name)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;
        let class = parse_class(&data)
            .with_context(|| format!("failed to parse {}:{}", path.display(), name))?;
        output.classes.push(class);
        output.class_count += 1;

        push_artifact(
            jar_entry_uri(path, &name),
            entry.size(),
            Some(jar_index),
            None,
            output,
        );
    }

    Ok(())
}

/// Push an artifact and return its index for parent linkage of JAR entries.
fn push_artifact(
    uri: String,
    len: u64,
    parent_index: Option<i64>,
    roles: Option<Vec<Value>>,
    output: &mut ScanOutput,
) -> i64 {
    let location = ArtifactLocation::builder().uri(uri).build();
    let artifact = match (parent_index, roles) {
        (Some(parent_index), Some(roles)) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .parent_index(parent_index)
            .roles(roles)
            .build(),
        (Some(parent_index), None) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .parent_index(parent_index)
            .build(),
        (None, Some(roles)) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .roles(roles)
            .build(),
        (None, None) => Artifact::builder()
            .location(location)
            .length(len as i64)
            .build(),
    };
    let index = output.artifacts.len() as i64;
    output.artifacts.push(artifact);
    index
}

fn is_module_info(name: &str) -> bool {
    name.ends_with("module-info.class")
}

fn path_to_uri(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn jar_entry_uri(jar_path: &Path, entry_name: &str) -> String {
    format!("jar:{}!/{}", jar_path.to_string_lossy(), entry_name)
}
