//! TelemetryMirror - multi-writer field map
//!
//! Writers (one per producer topic, plus the command relay) race freely.
//! Each write is atomic per field; derived fields are updated inside the
//! same lock as the field they come from.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{fields, ContractError, GearStatus, SensorSnapshot, TelemetrySchema, TelemetryValue};

#[derive(Debug)]
pub struct TelemetryMirror {
    fields: Mutex<BTreeMap<String, TelemetryValue>>,
}

impl TelemetryMirror {
    /// Start with every declared field at its initial value.
    pub fn new(schema: &TelemetrySchema) -> Self {
        Self {
            fields: Mutex::new(schema.fields().cloned().collect()),
        }
    }

    /// Set one field (last writer wins).
    pub fn set_field(
        &self,
        name: &str,
        value: impl Into<TelemetryValue>,
    ) -> Result<(), ContractError> {
        let mut map = self.lock();
        if !map.contains_key(name) {
            return Err(ContractError::unknown_field(name));
        }
        write_field(&mut map, name, value.into());
        Ok(())
    }

    /// Set several fields under one lock.
    ///
    /// All names are checked first; on an unknown name nothing is written.
    pub fn set_fields<'a, I>(&self, updates: I) -> Result<(), ContractError>
    where
        I: IntoIterator<Item = (&'a str, TelemetryValue)>,
    {
        let updates: Vec<_> = updates.into_iter().collect();
        let mut map = self.lock();
        if let Some((name, _)) = updates.iter().find(|(name, _)| !map.contains_key(*name)) {
            return Err(ContractError::unknown_field(*name));
        }
        for (name, value) in updates {
            write_field(&mut map, name, value);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<TelemetryValue> {
        self.lock().get(name).cloned()
    }

    /// Full copy of every field.
    pub fn snapshot(&self) -> SensorSnapshot {
        SensorSnapshot(self.lock().clone())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, TelemetryValue>> {
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Store `value` and refresh whatever is derived from it.
fn write_field(map: &mut BTreeMap<String, TelemetryValue>, name: &str, value: TelemetryValue) {
    if name == fields::ACCEL {
        if let Some(accel) = value.as_f64() {
            if let Some(gear) = map.get_mut(fields::GEAR_STATUS) {
                *gear = GearStatus::from_accel(accel).as_str().into();
            }
        }
    }
    if let Some(slot) = map.get_mut(name) {
        *slot = value;
    }
}
