//! Engine registry for name-based dispatch
//!
//! Engines are registered once under their short name (`arp.spoof`,
//! `net.recon`, ...) and then started and stopped through the registry.
//! Shutdown walks the engines in reverse registration order, so the
//! tracker registered first is stopped last.

use netspoof_core::{Engine, EngineStats, Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Snapshot of one registered engine
#[derive(Debug, Clone)]
pub struct EngineInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub is_running: bool,
    pub stats: EngineStats,
}

/// Thread-safe, name-keyed set of engines
pub struct EngineRegistry {
    engines: RwLock<HashMap<&'static str, Arc<dyn Engine>>>,
    /// Registration order
    order: RwLock<Vec<&'static str>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            engines: RwLock::new(HashMap::new()),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Register an engine under its name
    ///
    /// Returns [`Error::AlreadyExists`] if the name is taken.
    pub fn register(&self, engine: Arc<dyn Engine>) -> Result<()> {
        let name = engine.name();

        let mut engines = self.engines.write();
        if engines.contains_key(name) {
            warn!(engine = name, "engine already registered");
            return Err(Error::AlreadyExists(format!(
                "engine '{}' already registered",
                name
            )));
        }
        engines.insert(name, engine);
        self.order.write().push(name);

        debug!(engine = name, "engine registered");
        Ok(())
    }

    /// Remove an engine without stopping it
    pub fn unregister(&self, name: &str) -> Result<Arc<dyn Engine>> {
        let engine = self
            .engines
            .write()
            .remove(name)
            .ok_or_else(|| Error::not_found(format!("engine '{}'", name)))?;
        self.order.write().retain(|n| *n != name);
        Ok(engine)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Engine>> {
        self.engines.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.engines.read().contains_key(name)
    }

    fn require(&self, name: &str) -> Result<Arc<dyn Engine>> {
        self.get(name)
            .ok_or_else(|| Error::not_found(format!("engine '{}'", name)))
    }

    pub async fn start(&self, name: &str) -> Result<()> {
        let engine = self.require(name)?;
        info!(engine = name, "starting");
        engine.start().await
    }

    pub async fn stop(&self, name: &str) -> Result<()> {
        let engine = self.require(name)?;
        info!(engine = name, "stopping");
        engine.stop().await
    }

    /// Stop every running engine, newest first
    ///
    /// All engines are attempted; the first failure is returned.
    pub async fn stop_all(&self) -> Result<()> {
        let engines: Vec<Arc<dyn Engine>> = {
            let engines = self.engines.read();
            self.order
                .read()
                .iter()
                .rev()
                .filter_map(|name| engines.get(name).cloned())
                .collect()
        };

        let mut first_error = None;
        for engine in engines.into_iter().filter(|e| e.is_running()) {
            info!(engine = engine.name(), "stopping");
            if let Err(e) = engine.stop().await {
                warn!(engine = engine.name(), error = %e, "stop failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Registered engines in registration order
    pub fn list(&self) -> Vec<EngineInfo> {
        let engines = self.engines.read();
        self.order
            .read()
            .iter()
            .filter_map(|name| engines.get(name))
            .map(|engine| EngineInfo {
                name: engine.name(),
                description: engine.description(),
                is_running: engine.is_running(),
                stats: engine.stats(),
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.engines.read().len()
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct TestEngine {
        name: &'static str,
        running: AtomicBool,
        fail_stop: bool,
        stopped: Arc<Mutex<Vec<&'static str>>>,
    }

    impl TestEngine {
        fn new(name: &'static str, stopped: &Arc<Mutex<Vec<&'static str>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                running: AtomicBool::new(false),
                fail_stop: false,
                stopped: stopped.clone(),
            })
        }
    }

    #[async_trait]
    impl Engine for TestEngine {
        fn name(&self) -> &'static str {
            self.name
        }

        fn description(&self) -> &'static str {
            "test engine"
        }

        async fn start(&self) -> Result<()> {
            if self.running.swap(true, Ordering::SeqCst) {
                return Err(Error::already_started(self.name));
            }
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            self.running.store(false, Ordering::SeqCst);
            self.stopped.lock().push(self.name);
            if self.fail_stop {
                return Err(Error::ExecutionFailed(format!("{} stop", self.name)));
            }
            Ok(())
        }

        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn stats(&self) -> EngineStats {
            EngineStats::default()
        }
    }

    #[test]
    fn test_register_duplicate_name() {
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let registry = EngineRegistry::new();

        registry.register(TestEngine::new("net.recon", &stopped)).unwrap();
        let err = registry
            .register(TestEngine::new("net.recon", &stopped))
            .unwrap_err();

        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_by_name() {
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let registry = EngineRegistry::new();
        registry.register(TestEngine::new("arp.spoof", &stopped)).unwrap();

        registry.start("arp.spoof").await.unwrap();
        assert!(registry.get("arp.spoof").unwrap().is_running());
        assert!(matches!(
            registry.start("arp.spoof").await,
            Err(Error::AlreadyStarted(_))
        ));

        registry.stop("arp.spoof").await.unwrap();
        assert!(!registry.get("arp.spoof").unwrap().is_running());

        assert!(matches!(
            registry.start("dns.spoof").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stop_all_in_reverse_order() {
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let registry = EngineRegistry::new();
        for name in ["net.recon", "arp.spoof", "dns.spoof", "ndp.spoof"] {
            registry.register(TestEngine::new(name, &stopped)).unwrap();
        }
        for name in ["net.recon", "arp.spoof", "ndp.spoof"] {
            registry.start(name).await.unwrap();
        }

        registry.stop_all().await.unwrap();

        assert_eq!(*stopped.lock(), vec!["ndp.spoof", "arp.spoof", "net.recon"]);
        assert!(registry.list().iter().all(|info| !info.is_running));
    }

    #[tokio::test]
    async fn test_stop_all_continues_after_failure() {
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let registry = EngineRegistry::new();
        registry.register(TestEngine::new("net.recon", &stopped)).unwrap();
        registry
            .register(Arc::new(TestEngine {
                name: "arp.spoof",
                running: AtomicBool::new(true),
                fail_stop: true,
                stopped: stopped.clone(),
            }))
            .unwrap();
        registry.start("net.recon").await.unwrap();

        assert!(matches!(
            registry.stop_all().await,
            Err(Error::ExecutionFailed(_))
        ));
        assert_eq!(*stopped.lock(), vec!["arp.spoof", "net.recon"]);
    }

    #[test]
    fn test_list_and_unregister() {
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let registry = EngineRegistry::new();
        registry.register(TestEngine::new("net.recon", &stopped)).unwrap();
        registry.register(TestEngine::new("dns.spoof", &stopped)).unwrap();

        let names: Vec<_> = registry.list().iter().map(|info| info.name).collect();
        assert_eq!(names, vec!["net.recon", "dns.spoof"]);

        registry.unregister("net.recon").unwrap();
        assert!(!registry.contains("net.recon"));
        assert!(registry.unregister("net.recon").is_err());
        assert_eq!(registry.count(), 1);
    }
}
