//! Distribution fan-out: staged file set → live location → replicas.
//!
//! Destinations are attempted in order and independently. A destination
//! counts as delivered only when its copy digests to the staged digest.

use std::path::{Path, PathBuf};

use crate::error::SwapError;
use crate::rebuild::StagedArtifact;
use crate::report::{DeliveryStatus, DestinationResult};

/// Copy `staged` to `live` first, then to each replica.
///
/// Never short-circuits: a failed destination is logged and recorded, and
/// the remaining destinations are still attempted.
pub fn distribute(staged: &StagedArtifact, live: &Path, replicas: &[PathBuf]) -> Vec<DestinationResult> {
    let destinations = std::iter::once((live, true)).chain(replicas.iter().map(|r| (r.as_path(), false)));

    destinations
        .map(|(dest, is_live)| {
            let status = match deliver(staged, dest) {
                Ok(()) => {
                    tracing::info!(dest = %dest.display(), live = is_live, "delivered");
                    DeliveryStatus::Delivered
                }
                Err(err) => {
                    tracing::error!(dest = %dest.display(), live = is_live, error = %err, "delivery failed");
                    DeliveryStatus::Failed {
                        error: err.to_string(),
                    }
                }
            };
            DestinationResult {
                path: dest.to_path_buf(),
                live: is_live,
                status,
            }
        })
        .collect()
}

fn deliver(staged: &StagedArtifact, dest: &Path) -> Result<(), SwapError> {
    let copy = staged.files.copy_to(dest)?;
    let actual = copy.digest()?;
    if actual != staged.digest {
        return Err(SwapError::DigestMismatch {
            dest: dest.to_path_buf(),
            expected: staged.digest.clone(),
            actual,
        });
    }
    Ok(())
}
