// Copyright The MQTT Dataplane Authors
// SPDX-License-Identifier: Apache-2.0

//! Workspace convention checks, run with `cargo xtask check`.
//!
//! Verifies that every workspace member inherits the shared package
//! metadata from the root manifest and that every Rust source file starts
//! with the license header.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};

const LICENSE_HEADER: &str = "// Copyright The MQTT Dataplane Authors";
const INHERITED_KEYS: &[&str] = &[
    "version",
    "authors",
    "edition",
    "repository",
    "license",
    "rust-version",
];

fn main() -> Result<()> {
    let task = std::env::args().nth(1);
    match task.as_deref() {
        Some("check") | None => check(),
        Some(other) => bail!("unknown xtask `{other}`; available tasks: check"),
    }
}

fn check() -> Result<()> {
    let root = workspace_root()?;
    let members = workspace_members(&root)?;
    let mut failures = Vec::new();

    for member in &members {
        let manifest_path = root.join(member).join("Cargo.toml");
        check_manifest_inheritance(&manifest_path, &mut failures)?;
        check_license_headers(&root.join(member).join("src"), &mut failures)?;
    }

    if failures.is_empty() {
        println!("workspace checks passed ({} members)", members.len());
        Ok(())
    } else {
        for failure in &failures {
            eprintln!("error: {failure}");
        }
        bail!("{} workspace check(s) failed", failures.len());
    }
}

fn workspace_root() -> Result<PathBuf> {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .map(Path::to_path_buf)
        .context("xtask must live one level below the workspace root")
}

fn workspace_members(root: &Path) -> Result<Vec<String>> {
    let manifest_path = root.join("Cargo.toml");
    let manifest: toml::Value = fs::read_to_string(&manifest_path)
        .with_context(|| format!("reading {}", manifest_path.display()))?
        .parse()
        .with_context(|| format!("parsing {}", manifest_path.display()))?;
    let members = manifest
        .get("workspace")
        .and_then(|workspace| workspace.get("members"))
        .and_then(toml::Value::as_array)
        .context("root manifest has no [workspace] members list")?;
    Ok(members
        .iter()
        .filter_map(toml::Value::as_str)
        .filter(|member| *member != "xtask")
        .map(str::to_owned)
        .collect())
}

fn check_manifest_inheritance(manifest_path: &Path, failures: &mut Vec<String>) -> Result<()> {
    let manifest: toml::Value = fs::read_to_string(manifest_path)
        .with_context(|| format!("reading {}", manifest_path.display()))?
        .parse()
        .with_context(|| format!("parsing {}", manifest_path.display()))?;
    let Some(package) = manifest.get("package") else {
        failures.push(format!("{}: missing [package]", manifest_path.display()));
        return Ok(());
    };
    for key in INHERITED_KEYS {
        let inherits = package
            .get(*key)
            .and_then(|value| value.get("workspace"))
            .and_then(toml::Value::as_bool)
            .unwrap_or(false);
        if !inherits {
            failures.push(format!(
                "{}: `{key}` must be inherited with `{key}.workspace = true`",
                manifest_path.display()
            ));
        }
    }
    let lints_inherited = manifest
        .get("lints")
        .and_then(|lints| lints.get("workspace"))
        .and_then(toml::Value::as_bool)
        .unwrap_or(false);
    if !lints_inherited {
        failures.push(format!(
            "{}: lints must be inherited with `[lints] workspace = true`",
            manifest_path.display()
        ));
    }
    Ok(())
}

fn check_license_headers(src_dir: &Path, failures: &mut Vec<String>) -> Result<()> {
    if !src_dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(src_dir).with_context(|| format!("reading {}", src_dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            check_license_headers(&path, failures)?;
        } else if path.extension().is_some_and(|extension| extension == "rs") {
            let source = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            if !source.starts_with(LICENSE_HEADER) {
                failures.push(format!("{}: missing license header", path.display()));
            }
        }
    }
    Ok(())
}
