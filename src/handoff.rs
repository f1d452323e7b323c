//!
//! src/handoff.rs
//!
//! Typed per-run key-value handoff between pipeline stages. Each key is
//! written by exactly one stage and read by exactly one downstream stage,
//! mirroring the keyed handoff a workflow scheduler provides
//!

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::EtlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Transform,
    Load
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extract   => "extract",
            Stage::Transform => "transform",
            Stage::Load      => "load"
        }
    }
}

pub trait Handoff {
    fn put_value(&self, stage: Stage, key: &str, value: Value)
        -> Result<(), EtlError>;
    fn get_value(&self, stage: Stage, key: &str)
        -> Result<Value, EtlError>;

    fn put<T: Serialize>(&self, stage: Stage, key: &str, value: &T)
        -> Result<(), EtlError> {
        self.put_value(stage, key, serde_json::to_value(value)?)
    }

    fn get<T: DeserializeOwned>(&self, stage: Stage, key: &str)
        -> Result<T, EtlError> {
        Ok(serde_json::from_value(self.get_value(stage, key)?)?)
    }
}

/// In-process handoff backing a single sequential run
#[derive(Debug, Default)]
pub struct MemoryHandoff {
    slots: Mutex<HashMap<(Stage, String), Value>>
}

impl MemoryHandoff {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Handoff for MemoryHandoff {
    fn put_value(&self, stage: Stage, key: &str, value: Value)
        -> Result<(), EtlError> {
        let mut slots = self.slots.lock()
            .unwrap_or_else(|e| e.into_inner());
        slots.insert((stage, key.to_string()), value);
        Ok(())
    }

    fn get_value(&self, stage: Stage, key: &str)
        -> Result<Value, EtlError> {
        let slots = self.slots.lock()
            .unwrap_or_else(|e| e.into_inner());
        slots.get(&(stage, key.to_string()))
            .cloned()
            .ok_or_else(|| EtlError::NotFound(
                format!("no handoff value for {}/{key}", stage.as_str())
            ))
    }
}
