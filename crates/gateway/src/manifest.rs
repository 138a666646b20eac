//! Asset manifests consumed by the install warm-up.
//!
//! Three lists with different failure tolerances: critical assets must end
//! up cached (bulk first, then per-URL retry with logged misses), secondary
//! and external-library assets are best-effort.

/// URL lists precached at install time.
///
/// Critical and secondary entries are origin-relative paths resolved
/// against the upstream origin; external entries are absolute cross-origin
/// library URLs and also seed the allowed static origin set of
/// [`crate::InterceptPolicy`].
#[derive(Debug, Clone)]
pub struct AssetManifest {
    /// The app shell; a repeated individual failure here is logged loudly.
    pub critical: Vec<String>,
    /// Nice-to-have pages and imagery; failures are logged and skipped.
    pub secondary: Vec<String>,
    /// Cross-origin library assets; failures are logged and skipped.
    pub external: Vec<String>,
}

impl AssetManifest {
    /// The storefront's default manifest.
    #[must_use]
    pub fn storefront_default() -> Self {
        Self {
            critical: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/assets/app.js".to_string(),
                "/manifest.webmanifest".to_string(),
            ],
            secondary: vec![
                "/catalog.html".to_string(),
                "/cart.html".to_string(),
                "/product.html".to_string(),
                "/about.html".to_string(),
                "/returns-policy.html".to_string(),
                "/img/logo-512.png".to_string(),
                "/img/banner1.png".to_string(),
                "/img/banner2.png".to_string(),
                "/img/banner3.png".to_string(),
                "/icons/icon-192.png".to_string(),
                "/icons/icon-512.png".to_string(),
            ],
            external: vec![
                "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.0/css/all.min.css"
                    .to_string(),
                "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css"
                    .to_string(),
                "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/js/bootstrap.bundle.min.js"
                    .to_string(),
            ],
        }
    }

    /// An empty manifest; warm-up becomes a no-op. Used by tests.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            critical: Vec::new(),
            secondary: Vec::new(),
            external: Vec::new(),
        }
    }
}
