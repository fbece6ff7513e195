//! Dirtiness resolution.
//!
//! An artifact is dirty when ANY of its declared sources reports Created or
//! Updated. `Error` results never make an artifact dirty; they are carried
//! along so the run report can surface them. Sources absent from the change
//! results count as NoChanges.

use pallet_core::{ArtifactName, ArtifactTarget, ChangeResult, ChangeResults, SourceName};

/// Resolution for one declared artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirtiness {
    pub artifact: ArtifactName,
    pub dirty: bool,
    /// Sources with Created/Updated, in declaration order.
    pub triggered_by: Vec<SourceName>,
    /// Sources with Error, in declaration order.
    pub upstream_errors: Vec<SourceName>,
    /// Dirty only because it was forced.
    pub forced: bool,
}

/// Resolve every declaration in order. Repeated artifact names collapse into
/// the first occurrence, merging their sources.
pub fn resolve<'a, I>(
    declarations: I,
    changes: &ChangeResults,
    forced: &[ArtifactName],
) -> Vec<Dirtiness>
where
    I: IntoIterator<Item = (&'a ArtifactName, &'a [SourceName])>,
{
    let mut resolved: Vec<Dirtiness> = Vec::new();

    for (artifact, sources) in declarations {
        let idx = match resolved.iter().position(|d| &d.artifact == artifact) {
            Some(idx) => idx,
            None => {
                resolved.push(Dirtiness {
                    artifact: artifact.clone(),
                    dirty: false,
                    triggered_by: vec![],
                    upstream_errors: vec![],
                    forced: false,
                });
                resolved.len() - 1
            }
        };
        let entry = &mut resolved[idx];

        for source in sources {
            match changes.get(source).copied().unwrap_or_default() {
                result if result.is_change() => {
                    if !entry.triggered_by.contains(source) {
                        entry.triggered_by.push(source.clone());
                    }
                }
                ChangeResult::Error => {
                    if !entry.upstream_errors.contains(source) {
                        tracing::warn!(artifact = %artifact, source = %source, "upstream refresh reported an error; not rebuilding for it");
                        entry.upstream_errors.push(source.clone());
                    }
                }
                _ => {
                    if !changes.contains_key(source) {
                        tracing::debug!(artifact = %artifact, source = %source, "no change result; treating as no_changes");
                    }
                }
            }
        }
        entry.dirty = !entry.triggered_by.is_empty();
    }

    for entry in &mut resolved {
        if !entry.dirty && forced.contains(&entry.artifact) {
            entry.dirty = true;
            entry.forced = true;
        }
    }
    resolved
}

/// Convenience over [`resolve`] for resolved config targets.
pub fn resolve_targets(
    targets: &[ArtifactTarget],
    changes: &ChangeResults,
    forced: &[ArtifactName],
) -> Vec<Dirtiness> {
    resolve(
        targets.iter().map(|t| (&t.name, t.sources.as_slice())),
        changes,
        forced,
    )
}

/// Names of the dirty artifacts, in declaration order.
pub fn dirty_set(resolution: &[Dirtiness]) -> Vec<&ArtifactName> {
    resolution
        .iter()
        .filter(|d| d.dirty)
        .map(|d| &d.artifact)
        .collect()
}
