//! Wiring: one governor, resolver and scanner built from a [`DiscoveryConfig`].

use std::sync::Arc;

use futures::StreamExt;
use story_cache::{FsRecordStore, LocalRecordStore};
use story_discovery_types::DiscoveryResult;
use story_transport::{ContentFetcher, GatewayFetcher, JsonRpcRegistry, RegistryReader};

use crate::config::DiscoveryConfig;
use crate::governor::Governor;
use crate::presentation::VisibleSet;
use crate::resolver::TokenResolver;
use crate::scanner::{ScanEvent, ScanMode, TokenScanner};
use crate::session::ScanSession;

pub struct DiscoveryEngine {
    scanner: TokenScanner,
}

impl DiscoveryEngine {
    pub fn new(
        registry: Arc<dyn RegistryReader>,
        fetcher: Arc<dyn ContentFetcher>,
        store: Arc<dyn LocalRecordStore>,
        config: &DiscoveryConfig,
    ) -> Self {
        let governor = Arc::new(Governor::new(config.governor.clone()));
        let resolver = Arc::new(TokenResolver::new(
            registry,
            fetcher,
            store,
            governor,
            config.key_prefix.clone(),
        ));
        Self {
            scanner: TokenScanner::new(resolver, config.scan.clone()),
        }
    }

    /// JSON-RPC registry, gateway fetcher and filesystem store from `config`.
    pub fn from_config(config: &DiscoveryConfig) -> DiscoveryResult<Self> {
        let registry = JsonRpcRegistry::new(&config.rpc_url, &config.registry_address)?;
        let fetcher = GatewayFetcher::new(config.gateway.clone());
        let store = FsRecordStore::new(&config.store_dir)?;
        Ok(Self::new(
            Arc::new(registry),
            Arc::new(fetcher),
            Arc::new(store),
            config,
        ))
    }

    pub fn scanner(&self) -> &TokenScanner {
        &self.scanner
    }

    pub fn resolver(&self) -> &Arc<TokenResolver> {
        self.scanner.resolver()
    }

    pub fn governor(&self) -> &Arc<Governor> {
        self.scanner.resolver().governor()
    }

    /// Drive one scan to completion into `visible`, calling `on_event` for every event.
    pub async fn run_scan(
        &self,
        mode: ScanMode,
        session: &mut ScanSession,
        visible: &mut VisibleSet,
        mut on_event: impl FnMut(&ScanEvent),
    ) {
        visible.reopen();
        let stream = self.scanner.scan(mode, session);
        futures::pin_mut!(stream);
        while let Some(event) = stream.next().await {
            on_event(&event);
            visible.apply(event);
        }
    }

    /// [`run_scan`](Self::run_scan) for the next `load_more` page.
    pub async fn run_load_more(
        &self,
        session: &mut ScanSession,
        visible: &mut VisibleSet,
        mut on_event: impl FnMut(&ScanEvent),
    ) {
        visible.reopen();
        let stream = self.scanner.load_more(session);
        futures::pin_mut!(stream);
        while let Some(event) = stream.next().await {
            on_event(&event);
            visible.apply(event);
        }
    }

    /// Fresh session, one scan, final visible set.
    pub async fn discover(&self, mode: ScanMode) -> VisibleSet {
        let mut session = ScanSession::new();
        let mut visible = VisibleSet::new();
        self.run_scan(mode, &mut session, &mut visible, |_| {}).await;
        visible
    }
}
