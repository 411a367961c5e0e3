//! Construct handlers from configuration.

use crate::config::{resolve_defaults, ConfigLoader, GuzzleConfig};
use crate::error::Result;
use crate::handler::Handler;
use crate::options::OptionMap;
use crate::transport::{Transport, UreqTransport};

/// Build a handler from the configuration found by [`ConfigLoader::new`].
pub fn from_defaults() -> Result<Handler> {
    let config = ConfigLoader::new().load()?;
    from_config(&config)
}

/// Build a `ureq`-backed handler from already loaded configuration.
pub fn from_config(config: &GuzzleConfig) -> Result<Handler> {
    from_config_with(config, UreqTransport::new)
}

/// Build a handler whose transport is created from the resolved client
/// options by `make_transport`.
pub fn from_config_with<T, F>(config: &GuzzleConfig, make_transport: F) -> Result<Handler<T>>
where
    T: Transport,
    F: FnOnce(&OptionMap) -> Result<T>,
{
    let (client_options, request_options, auth) = resolve_defaults(config);
    let transport = make_transport(&client_options)?;
    let mut handler = Handler::with_transport(client_options, request_options, transport)?;
    if let Some(auth) = auth {
        handler.set_auth(&auth.username, &auth.password, auth.method.as_deref());
    }
    Ok(handler)
}
