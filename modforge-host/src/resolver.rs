//! Dependency resolution
//!
//! Dependencies are resolved in declaration order before the declaring
//! plugin is constructed. A missing dependency is loaded on demand; an
//! already loaded one is only version-checked. Version constraints are
//! minimums, compared with [`crate::version::is_compatible`].

use crate::error::HostError;
use crate::version;
use modforge_plugin_api::DependencySpec;
use std::future::Future;

/// Check one declared dependency against the installed version.
pub fn check_version(plugin: &str, dep: &DependencySpec, installed: &str) -> Result<(), HostError> {
    if version::is_compatible(installed, &dep.version) {
        Ok(())
    } else {
        Err(HostError::DependencyVersion {
            plugin: plugin.to_string(),
            dependency: dep.id.clone(),
            installed: installed.to_string(),
            required: dep.version.clone(),
        })
    }
}

/// Resolve a plugin's dependency list in declaration order.
///
/// `installed` reports the version of a loaded plugin, `load` loads one that
/// is not. A dependency loaded here is version-checked afterwards with the
/// version it actually came up with.
pub async fn resolve<Installed, Load, Fut>(
    plugin: &str,
    dependencies: &[DependencySpec],
    installed: Installed,
    load: Load,
) -> Result<(), HostError>
where
    Installed: Fn(&str) -> Option<String>,
    Load: Fn(String) -> Fut,
    Fut: Future<Output = Result<(), HostError>>,
{
    for dep in dependencies {
        let version = match installed(&dep.id) {
            Some(version) => version,
            None => {
                tracing::debug!(plugin = %plugin, dependency = %dep.id, "Loading dependency");
                load(dep.id.clone()).await?;
                installed(&dep.id).ok_or_else(|| HostError::LoadFailed {
                    id: dep.id.clone(),
                    reason: "dependency did not register after loading".to_string(),
                })?
            }
        };
        check_version(plugin, dep, &version)?;
    }
    Ok(())
}
