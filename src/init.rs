use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

use crate::error::ConfigError;
use crate::layer::BridgeLayer;
use crate::logger::Logger;

/// Settings for the global `tracing` bridge.
///
/// **Fields**
/// - `enable_stdout`: also install a `tracing_subscriber::fmt` layer so
///   events are printed to the console as-is, next to the bridge.
/// - `ignored_targets`: extra target prefixes the bridge should skip, on top
///   of [`DEFAULT_IGNORED_TARGETS`](crate::layer::DEFAULT_IGNORED_TARGETS).
#[derive(Clone, Debug, Default)]
pub struct BridgeConfig {
    pub enable_stdout: bool,
    pub ignored_targets: Vec<String>,
}

/// Route every `tracing` event in the process into `logger`.
///
/// Installs a [`Registry`] with a [`BridgeLayer`] as the global default
/// subscriber. Fails if a global subscriber is already set.
pub fn init_tracing_with_config(logger: Arc<Logger>, config: BridgeConfig) -> Result<(), ConfigError> {
    let mut layer = BridgeLayer::new(logger);
    for target in config.ignored_targets {
        layer = layer.ignore_target(target);
    }

    // Two subscriber shapes, since the layered types differ.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// [`init_tracing_with_config`] with [`BridgeConfig::default`].
pub fn init_tracing(logger: Arc<Logger>) -> Result<(), ConfigError> {
    init_tracing_with_config(logger, BridgeConfig::default())
}
