//! Built-in SiteKit plugins.
//!
//! Each plugin is compiled in and registered in the catalog under its
//! factory name; a `plugin.toml` in the plugin directory selects it.

pub mod asset_stamp;
pub mod hooks;
pub mod request_logger;
pub mod site_stats;

use std::sync::Arc;

use sitekit_plugin::catalog::PluginCatalog;
use sitekit_plugin::traits::Plugin;

pub use asset_stamp::AssetStampPlugin;
pub use request_logger::RequestLoggerPlugin;
pub use site_stats::SiteStatsPlugin;

/// Registers every built-in plugin factory in `catalog`.
pub fn register_builtins(catalog: &mut PluginCatalog) -> &mut PluginCatalog {
    catalog
        .register(asset_stamp::NAME, |settings| {
            let plugin: Arc<dyn Plugin> = Arc::new(AssetStampPlugin::new(&settings));
            Ok(plugin)
        })
        .register(request_logger::NAME, |settings| {
            let plugin: Arc<dyn Plugin> = Arc::new(RequestLoggerPlugin::new(&settings));
            Ok(plugin)
        })
        .register(site_stats::NAME, |settings| {
            let plugin: Arc<dyn Plugin> = Arc::new(SiteStatsPlugin::new(&settings));
            Ok(plugin)
        })
}

/// A catalog holding only the built-in plugins.
pub fn catalog() -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    register_builtins(&mut catalog);
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names() {
        assert_eq!(
            catalog().names(),
            vec!["asset-stamp", "request-logger", "site-stats"]
        );
    }
}
