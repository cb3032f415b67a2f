// ── Handler registry ──
//
// Ordered list of handlers. The first handler whose `matches` claims a URL
// wins, so specific families register before broad ones. The generic
// NexusPHP handler doubles as the fallback.

use std::sync::Arc;

use tracing::debug;

use super::{
    ButterflyHandler, HdKylinHandler, HhClubHandler, MTeamHandler, NexusPhpHandler, SiteHandler,
    XiangDaoHandler,
};
use crate::config::RosterLimits;

/// Resolves a site URL to the handler for its family.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn SiteHandler>>,
    fallback: Arc<dyn SiteHandler>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handler_names())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

impl HandlerRegistry {
    /// An empty registry that resolves everything to `fallback`.
    pub fn new(fallback: Arc<dyn SiteHandler>) -> Self {
        Self {
            handlers: Vec::new(),
            fallback,
        }
    }

    /// Every built-in family with default pagination limits.
    pub fn with_default_handlers() -> Self {
        Self::with_limits(RosterLimits::default())
    }

    /// Every built-in family, paged handlers using `limits`.
    pub fn with_limits(limits: RosterLimits) -> Self {
        let nexusphp: Arc<dyn SiteHandler> = Arc::new(NexusPhpHandler::new(limits));
        let mut registry = Self::new(Arc::clone(&nexusphp));
        registry.register(Arc::new(MTeamHandler));
        registry.register(Arc::new(HhClubHandler::new(limits)));
        registry.register(Arc::new(XiangDaoHandler::new(limits)));
        registry.register(Arc::new(ButterflyHandler));
        registry.register(Arc::new(HdKylinHandler::new(limits)));
        registry.register(nexusphp);
        registry
    }

    /// Append a handler. Earlier registrations take precedence.
    pub fn register(&mut self, handler: Arc<dyn SiteHandler>) {
        debug!(handler = handler.name(), "handler registered");
        self.handlers.push(handler);
    }

    /// The first handler claiming `site_url`, else the fallback.
    pub fn resolve(&self, site_url: &str) -> Arc<dyn SiteHandler> {
        self.handlers
            .iter()
            .find(|h| h.matches(site_url))
            .map_or_else(|| Arc::clone(&self.fallback), Arc::clone)
    }

    /// Registered handler names in resolution order.
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_default_handlers()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use ptinvitee_api::SiteSession;

    use super::*;
    use crate::config::SiteConfig;
    use crate::error::CoreError;
    use crate::model::SiteSnapshot;

    struct Claims(&'static str);

    #[async_trait]
    impl SiteHandler for Claims {
        fn name(&self) -> &'static str {
            "custom"
        }

        fn matches(&self, site_url: &str) -> bool {
            site_url.contains(self.0)
        }

        async fn parse_invite_page(
            &self,
            _site: &SiteConfig,
            _session: &SiteSession,
        ) -> Result<SiteSnapshot, CoreError> {
            Ok(SiteSnapshot::default())
        }
    }

    #[test]
    fn resolves_families_in_priority_order() {
        let registry = HandlerRegistry::with_default_handlers();
        assert_eq!(
            registry.handler_names(),
            vec!["mteam", "hhclub", "xiangdao", "butterfly", "hdkylin", "nexusphp"]
        );
        assert_eq!(registry.resolve("https://kp.m-team.cc/").name(), "mteam");
        assert_eq!(registry.resolve("https://hhanclub.top/").name(), "hhclub");
        assert_eq!(registry.resolve("https://ptvicomo.net/").name(), "xiangdao");
        assert_eq!(registry.resolve("https://discfan.net/").name(), "butterfly");
        assert_eq!(registry.resolve("https://www.hdkyl.in/").name(), "hdkylin");
        assert_eq!(registry.resolve("https://springsunday.net/").name(), "nexusphp");
    }

    #[test]
    fn unknown_sites_fall_back_to_nexusphp() {
        let registry = HandlerRegistry::default();
        assert_eq!(registry.resolve("https://unknown.example/").name(), "nexusphp");
    }

    #[test]
    fn registration_order_is_significant() {
        let mut registry = HandlerRegistry::new(Arc::new(NexusPhpHandler::default()));
        registry.register(Arc::new(Claims("example")));
        registry.register(Arc::new(MTeamHandler));
        assert_eq!(registry.resolve("https://m-team.example/").name(), "custom");
    }
}
