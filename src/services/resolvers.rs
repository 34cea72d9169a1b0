//! Structured merge-conflict resolvers.
//!
//! A small whitelist of conflict-prone files gets content-aware
//! resolution instead of a side pick: the project manifest merges
//! dependency sections, the ignore file merges line sets, the readme takes
//! the branch side. Everything else defaults to "prefer theirs" (the
//! branch being merged wins).

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::infrastructure::git;

/// Dependency sections merged by union in the project manifest.
const DEPENDENCY_SECTIONS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

/// Merge the three index stages of `package.json`.
///
/// Recognized dependency sections take the union of base/ours/theirs with
/// theirs winning on a version conflict. Scripts merge as ours ∪ theirs,
/// theirs winning on a duplicate key. All other keys keep our side.
pub fn merge_manifest(
    base: Option<&str>,
    ours: &str,
    theirs: &str,
) -> Result<String, String> {
    let base_json: Value = match base {
        Some(text) if !text.trim().is_empty() => {
            serde_json::from_str(text).map_err(|e| format!("base manifest: {}", e))?
        }
        _ => Value::Object(Map::new()),
    };
    let our_json: Value = serde_json::from_str(ours).map_err(|e| format!("our manifest: {}", e))?;
    let their_json: Value =
        serde_json::from_str(theirs).map_err(|e| format!("their manifest: {}", e))?;

    let mut merged = our_json
        .as_object()
        .cloned()
        .ok_or_else(|| "our manifest is not an object".to_string())?;
    let their_obj = their_json
        .as_object()
        .ok_or_else(|| "their manifest is not an object".to_string())?;

    for section in DEPENDENCY_SECTIONS {
        let mut combined = Map::new();
        for source in [&base_json, &our_json, &their_json] {
            if let Some(Value::Object(deps)) = source.get(*section) {
                for (name, version) in deps {
                    combined.insert(name.clone(), version.clone());
                }
            }
        }
        if !combined.is_empty() {
            merged.insert((*section).to_string(), Value::Object(combined));
        }
    }

    let mut scripts = Map::new();
    if let Some(Value::Object(ours_scripts)) = our_json.get("scripts") {
        for (k, v) in ours_scripts {
            scripts.insert(k.clone(), v.clone());
        }
    }
    if let Some(Value::Object(their_scripts)) = their_obj.get("scripts") {
        for (k, v) in their_scripts {
            scripts.insert(k.clone(), v.clone());
        }
    }
    if !scripts.is_empty() {
        merged.insert("scripts".to_string(), Value::Object(scripts));
    }

    let mut out = serde_json::to_string_pretty(&Value::Object(merged))
        .map_err(|e| e.to_string())?;
    out.push('\n');
    Ok(out)
}

/// Merge two sides of an ignore file.
///
/// Takes the union of non-empty lines, grouping each entry under the
/// closest preceding comment header of its source, and sorts entries
/// within a group. Group order follows first appearance (ours, then
/// theirs).
pub fn merge_ignore(ours: &str, theirs: &str) -> String {
    const GENERAL: &str = "";

    let mut group_order: Vec<String> = Vec::new();
    let mut groups: Vec<BTreeSet<String>> = Vec::new();

    fn group_index(
        group_order: &mut Vec<String>,
        groups: &mut Vec<BTreeSet<String>>,
        header: &str,
    ) -> usize {
        match group_order.iter().position(|h| h == header) {
            Some(idx) => idx,
            None => {
                group_order.push(header.to_string());
                groups.push(BTreeSet::new());
                group_order.len() - 1
            }
        }
    }

    for side in [ours, theirs] {
        let mut current = GENERAL.to_string();
        for line in side.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('#') {
                current = line.to_string();
                group_index(&mut group_order, &mut groups, &current);
            } else {
                let idx = group_index(&mut group_order, &mut groups, &current);
                groups[idx].insert(line.to_string());
            }
        }
    }

    let mut out = String::new();
    for (header, entries) in group_order.iter().zip(groups.iter()) {
        if entries.is_empty() && !header.is_empty() {
            continue;
        }
        if !header.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(header);
            out.push('\n');
        }
        for entry in entries {
            out.push_str(entry);
            out.push('\n');
        }
    }
    out
}

/// Outcome of a conflict-resolution pass over a working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionReport {
    pub resolved: Vec<String>,
    /// Non-whitelisted files resolved by preferring the branch side
    pub theirs_preferred: Vec<String>,
}

/// Resolve every conflicted file in `repo`, staging each result.
///
/// Whitelisted paths get their structured resolver; any other conflicted
/// path takes the branch side. A whitelisted resolver failure is an error;
/// the caller aborts the merge and leaves trunk untouched.
pub async fn resolve_conflicts(
    repo: &Path,
    conflicts: &[String],
) -> DomainResult<ResolutionReport> {
    let mut report = ResolutionReport {
        resolved: Vec::new(),
        theirs_preferred: Vec::new(),
    };

    for path in conflicts {
        match path.as_str() {
            "package.json" => {
                let base = git::show_index_stage(repo, 1, path).await;
                let ours = git::show_index_stage(repo, 2, path).await.ok_or_else(|| {
                    DomainError::ResolverFailed(format!("{}: missing our side", path))
                })?;
                let theirs = git::show_index_stage(repo, 3, path).await.ok_or_else(|| {
                    DomainError::ResolverFailed(format!("{}: missing their side", path))
                })?;

                let merged = merge_manifest(base.as_deref(), &ours, &theirs)
                    .map_err(|e| DomainError::ResolverFailed(format!("{}: {}", path, e)))?;
                tokio::fs::write(repo.join(path), merged).await?;
                stage(repo, path).await?;
                report.resolved.push(path.clone());
            }
            ".gitignore" => {
                let ours = git::show_index_stage(repo, 2, path).await.unwrap_or_default();
                let theirs = git::show_index_stage(repo, 3, path).await.unwrap_or_default();
                let merged = merge_ignore(&ours, &theirs);
                tokio::fs::write(repo.join(path), merged).await?;
                stage(repo, path).await?;
                report.resolved.push(path.clone());
            }
            "README.md" => {
                take_theirs(repo, path).await?;
                report.resolved.push(path.clone());
            }
            other => {
                warn!(path = other, "no structured resolver; preferring branch side");
                take_theirs(repo, other).await?;
                report.theirs_preferred.push(other.to_string());
            }
        }
        debug!(path = %path, "conflict resolved");
    }

    Ok(report)
}

async fn take_theirs(repo: &Path, path: &str) -> DomainResult<()> {
    git::run_git(repo, &["checkout", "--theirs", "--", path])
        .await
        .map_err(|e| DomainError::ResolverFailed(format!("{}: {}", path, e)))?;
    stage(repo, path).await
}

async fn stage(repo: &Path, path: &str) -> DomainResult<()> {
    git::run_git(repo, &["add", "--", path])
        .await
        .map_err(|e| DomainError::ResolverFailed(format!("{}: {}", path, e)))?;
    Ok(())
}
