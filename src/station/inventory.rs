//! Inventory snapshots.
//!
//! An [`Inventory`] is a full, unfiltered read of the station overview. Each
//! [`Inventory::fetch`] allocates a new value owned by the caller, so
//! concurrent reconciliations never observe each other's snapshot.

use crate::station::client::StationApi;
use crate::station::models::{ContainerRef, Overview, ResourceKind};
use crate::station::Result;
use serde::Serialize;
use tracing::debug;

/// One resource as seen in the overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub kind: ResourceKind,
    pub name: String,
    /// Container id; empty for applications
    pub id: String,
    /// Container runtime type; empty for applications
    pub ctype: String,
    pub status: String,
}

impl InventoryEntry {
    /// Container identity, if this entry is a container.
    pub fn container_ref(&self) -> Option<ContainerRef> {
        (self.kind == ResourceKind::Container)
            .then(|| ContainerRef::new(self.id.clone(), self.ctype.clone()))
    }
}

/// Snapshot of every application and container known to the station.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    pub apps: Vec<InventoryEntry>,
    pub containers: Vec<InventoryEntry>,
}

impl Inventory {
    /// Fetch a fresh snapshot.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the request fails and a decode error if
    /// the overview does not have the expected shape.
    pub async fn fetch(api: &dyn StationApi) -> Result<Self> {
        let overview = api.overview().await?;
        let inventory = Self::from(overview);
        debug!(
            apps = inventory.apps.len(),
            containers = inventory.containers.len(),
            "Fetched inventory snapshot"
        );
        Ok(inventory)
    }

    pub fn app(&self, name: &str) -> Option<&InventoryEntry> {
        self.apps.iter().find(|entry| entry.name == name)
    }

    pub fn container_by_name(&self, name: &str) -> Option<&InventoryEntry> {
        self.containers.iter().find(|entry| entry.name == name)
    }

    pub fn container_by_id(&self, id: &str) -> Option<&InventoryEntry> {
        self.containers.iter().find(|entry| entry.id == id)
    }

    /// Look up a resource by name within one kind.
    ///
    /// Volumes never appear in the overview.
    pub fn find_by_name(&self, kind: ResourceKind, name: &str) -> Option<&InventoryEntry> {
        match kind {
            ResourceKind::Container => self.container_by_name(name),
            ResourceKind::Application => self.app(name),
            ResourceKind::Volume => None,
        }
    }
}

impl From<Overview> for Inventory {
    fn from(overview: Overview) -> Self {
        let apps = overview
            .data
            .app
            .into_iter()
            .map(|app| InventoryEntry {
                kind: ResourceKind::Application,
                name: app.name,
                id: String::new(),
                ctype: String::new(),
                status: app.status,
            })
            .collect();

        let containers = overview
            .data
            .container
            .into_iter()
            .map(|container| InventoryEntry {
                kind: ResourceKind::Container,
                name: container.name,
                id: container.id,
                ctype: container.ctype,
                status: container.status,
            })
            .collect();

        Self { apps, containers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overview() -> Overview {
        serde_json::from_value(json!({
            "data": {
                "app": [{"name": "blog", "status": "running"}],
                "container": [
                    {"id": "abc123", "name": "web1", "type": "docker", "status": "running", "cpu": 0.5, "memory": 12.0},
                    {"id": "def456", "name": "db", "type": "lxd", "status": "stopped"}
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_inventory_from_overview() {
        let inventory = Inventory::from(overview());
        assert_eq!(inventory.apps.len(), 1);
        assert_eq!(inventory.containers.len(), 2);

        let web = inventory.container_by_name("web1").unwrap();
        assert_eq!(web.id, "abc123");
        assert_eq!(web.ctype, "docker");
        assert_eq!(
            web.container_ref(),
            Some(ContainerRef::new("abc123", "docker"))
        );

        assert_eq!(inventory.container_by_id("def456").unwrap().status, "stopped");
        assert_eq!(inventory.app("blog").unwrap().status, "running");
        assert!(inventory.app("blog").unwrap().container_ref().is_none());
    }

    #[test]
    fn test_find_by_name_is_kind_scoped() {
        let inventory = Inventory::from(overview());
        assert!(inventory.find_by_name(ResourceKind::Container, "web1").is_some());
        assert!(inventory.find_by_name(ResourceKind::Application, "web1").is_none());
        assert!(inventory.find_by_name(ResourceKind::Volume, "web1").is_none());
    }
}
