//! Making sure a model is present before the first request.

use llamawrap_types::{ModelRegistry, PullProgress, RegistryError};

/// What [`ensure_model_available`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// The model was already installed.
    Present,
    /// The model was downloaded just now.
    Pulled,
}

/// Pull `name` unless a local model has exactly that name.
///
/// Names are compared verbatim, so `"llama3"` does not match
/// `"llama3:latest"`. Calling this for a present model never pulls.
///
/// # Errors
///
/// [`RegistryError::List`] if the local models cannot be listed,
/// [`RegistryError::Pull`] if the download fails.
pub async fn ensure_model_available<R: ModelRegistry>(
    registry: &R,
    name: &str,
    stream: bool,
    on_progress: impl FnMut(PullProgress) + Send,
) -> Result<Availability, RegistryError> {
    let models = registry
        .list_local_models()
        .await
        .map_err(RegistryError::List)?;

    if models.iter().any(|m| m.name == name) {
        tracing::debug!(model = %name, "model already available");
        return Ok(Availability::Present);
    }

    tracing::info!(model = %name, "model not found locally, pulling");
    registry
        .pull_model(name, stream, on_progress)
        .await
        .map_err(|source| RegistryError::Pull {
            model: name.to_string(),
            source,
        })?;
    Ok(Availability::Pulled)
}
