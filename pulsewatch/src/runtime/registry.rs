use crate::error::RegistryError;
use crate::monitor::state::StatusSnapshot;
use crate::runtime::MonitorHandle;
use std::collections::HashMap;
use tracing::info;

/// Running monitors keyed by device id. Created at startup and torn down
/// with [`MonitorRegistry::shutdown`] before the process exits.
#[derive(Default)]
pub struct MonitorRegistry {
    monitors: HashMap<String, MonitorHandle>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a monitor under its device id
    pub fn insert(&mut self, handle: MonitorHandle) -> Result<(), RegistryError> {
        let device_id = handle.device_id().to_string();
        if self.monitors.contains_key(&device_id) {
            return Err(RegistryError::AlreadyMonitored(device_id));
        }
        self.monitors.insert(device_id, handle);
        Ok(())
    }

    pub fn get(&self, device_id: &str) -> Option<&MonitorHandle> {
        self.monitors.get(device_id)
    }

    pub fn get_mut(&mut self, device_id: &str) -> Option<&mut MonitorHandle> {
        self.monitors.get_mut(device_id)
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.monitors.contains_key(device_id)
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Sorted device ids
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.monitors.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Latest published snapshot of every monitor, sorted by device id
    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.device_ids()
            .iter()
            .filter_map(|id| self.monitors.get(id))
            .map(|handle| handle.current_snapshot())
            .collect()
    }

    /// Tear down and forget one monitor
    pub async fn remove(&mut self, device_id: &str) -> Result<(), RegistryError> {
        let mut handle = self
            .monitors
            .remove(device_id)
            .ok_or_else(|| RegistryError::NotMonitored(device_id.to_string()))?;
        handle.shutdown().await;
        Ok(())
    }

    /// Tear down every monitor
    pub async fn shutdown(&mut self) {
        let count = self.monitors.len();
        for (_, mut handle) in self.monitors.drain() {
            handle.shutdown().await;
        }
        if count > 0 {
            info!(monitors = count, "all monitors stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::monitor::Monitor;
    use crate::runtime::spawn;
    use crate::telemetry::KnownDevice;
    use crate::transport::{StatusRequest, Transport};
    use chrono::Utc;
    use std::sync::Arc;

    struct Idle;

    impl Transport for Idle {
        fn reconnect(&self) {}
        fn send_request(&self, _request: &StatusRequest) {}
    }

    fn handle(device_id: &str, transport: Arc<dyn Transport>) -> MonitorHandle {
        let device = KnownDevice::new(device_id, Some(Utc::now()));
        spawn(Monitor::new(&MonitorConfig::default(), &device, transport, Utc::now()).unwrap())
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates() {
        let transport: Arc<dyn Transport> = Arc::new(Idle);
        let mut registry = MonitorRegistry::new();
        registry.insert(handle("b", transport.clone())).unwrap();
        registry.insert(handle("a", transport.clone())).unwrap();
        assert_eq!(
            registry.insert(handle("a", transport.clone())),
            Err(RegistryError::AlreadyMonitored("a".to_string()))
        );
        assert_eq!(registry.device_ids(), vec!["a".to_string(), "b".to_string()]);
        registry.shutdown().await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_remove_tears_down() {
        let transport: Arc<dyn Transport> = Arc::new(Idle);
        let mut registry = MonitorRegistry::new();
        registry.insert(handle("a", transport)).unwrap();
        assert!(registry.contains("a"));

        registry.remove("a").await.unwrap();
        assert!(!registry.contains("a"));
        assert_eq!(
            registry.remove("a").await,
            Err(RegistryError::NotMonitored("a".to_string()))
        );
    }

    #[tokio::test]
    async fn test_snapshots_are_sorted_by_device_id() {
        let transport: Arc<dyn Transport> = Arc::new(Idle);
        let mut registry = MonitorRegistry::new();
        registry.insert(handle("z", transport.clone())).unwrap();
        registry.insert(handle("m", transport)).unwrap();
        for id in registry.device_ids() {
            registry.get(&id).unwrap().snapshot().await.unwrap();
        }
        let ids: Vec<String> = registry
            .snapshots()
            .into_iter()
            .map(|s| s.device_id)
            .collect();
        assert_eq!(ids, vec!["m".to_string(), "z".to_string()]);
        registry.shutdown().await;
    }
}
