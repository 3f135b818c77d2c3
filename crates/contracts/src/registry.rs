//! ChannelRegistry - the fixed channel set, shared read-only after startup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{ChannelDescriptor, ChannelId, ContractError};

/// Immutable, cheaply cloneable set of channel descriptors.
///
/// Iteration order is configuration order.
#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    descriptors: Vec<ChannelDescriptor>,
    index: HashMap<ChannelId, usize>,
}

impl ChannelRegistry {
    /// Build a registry, rejecting invalid or duplicate ids.
    pub fn new(descriptors: Vec<ChannelDescriptor>) -> Result<Self, ContractError> {
        let mut index = HashMap::with_capacity(descriptors.len());
        for (i, desc) in descriptors.iter().enumerate() {
            ChannelId::check_name(&desc.id)
                .map_err(|reason| ContractError::invalid_channel_id(desc.id.as_str(), reason))?;
            if index.insert(desc.id.clone(), i).is_some() {
                return Err(ContractError::config_validation(
                    format!("channels[{i}].id"),
                    format!("duplicate channel id '{}'", desc.id),
                ));
            }
        }
        Ok(Self {
            inner: Arc::new(RegistryInner { descriptors, index }),
        })
    }

    pub fn get(&self, id: &str) -> Option<&ChannelDescriptor> {
        self.inner
            .index
            .get(id)
            .map(|&i| &self.inner.descriptors[i])
    }

    /// Like [`get`](Self::get) but reports a missing id as an error.
    pub fn require(&self, id: &str) -> Result<&ChannelDescriptor, ContractError> {
        self.get(id).ok_or_else(|| ContractError::unknown_channel(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelDescriptor> {
        self.inner.descriptors.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ChannelId> {
        self.inner.descriptors.iter().map(|d| &d.id)
    }

    pub fn len(&self) -> usize {
        self.inner.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_str() {
        let registry = ChannelRegistry::new(vec![
            ChannelDescriptor::color("mobile_rgb", 4, 4),
            ChannelDescriptor::color("hand_rgb", 4, 4),
        ])
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("hand_rgb"));
        assert_eq!(registry.get("mobile_rgb").unwrap().region, "shm_mobile_rgb");
        assert!(matches!(
            registry.require("map"),
            Err(ContractError::UnknownChannel { .. })
        ));
        let ids: Vec<&str> = registry.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["mobile_rgb", "hand_rgb"]);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let result = ChannelRegistry::new(vec![
            ChannelDescriptor::color("map", 4, 4),
            ChannelDescriptor::color("map", 8, 8),
        ]);
        assert!(matches!(result, Err(ContractError::ConfigValidation { .. })));
    }

    #[test]
    fn unsafe_ids_rejected() {
        let result = ChannelRegistry::new(vec![ChannelDescriptor::color("hand/rgb", 4, 4)]);
        assert!(matches!(
            result,
            Err(ContractError::InvalidChannelId { ref channel_id, .. }) if channel_id == "hand/rgb"
        ));
    }
}
