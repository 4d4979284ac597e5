//! `setup` and `remove` maintenance verbs.
//!
//! Both act on the configuration document only and never start the server.

use std::path::Path;

use crate::config::{default_document, save_document};
use crate::error::Result;

/// Write the default configuration unless a document already exists.
///
/// Returns whether a new document was created. The document path is printed
/// to stderr either way.
pub async fn setup(path: &Path) -> Result<bool> {
    let created = if tokio::fs::try_exists(path).await? {
        tracing::info!("Configuration already present at {}", path.display());
        false
    } else {
        save_document(path, &default_document()).await?;
        tracing::info!("Wrote default configuration to {}", path.display());
        true
    };
    eprintln!("{}", setup_message(path, created));
    Ok(created)
}

fn setup_message(path: &Path, created: bool) -> String {
    if created {
        format!("Configuration written to {}", path.display())
    } else {
        format!("Configuration already exists at {}", path.display())
    }
}

/// Delete the configuration document. A missing document is not an error.
///
/// Returns whether a document was removed.
pub async fn remove(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::info!("Removed configuration at {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No configuration at {}", path.display());
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
