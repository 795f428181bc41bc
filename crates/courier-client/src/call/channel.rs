use courier_core::{Error, Result};
use tonic::transport::{Channel, Endpoint};

/// Opens a channel to `url`, e.g. `http://127.0.0.1:50051`.
///
/// # Errors
///
/// [`Error::InvalidArgument`] for a malformed URL, [`Error::Internal`] when
/// the server cannot be reached.
pub async fn connect(url: impl Into<String>) -> Result<Channel> {
    let url = url.into();
    let endpoint = Endpoint::from_shared(url.clone())
        .map_err(|e| Error::invalid_argument(format!("Invalid server URL {url}: {e}")))?;
    endpoint
        .connect()
        .await
        .map_err(|e| Error::internal(format!("Unable to connect to {url}: {e}")))
}
