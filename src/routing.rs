//! Keyword routing between the two supported device families.
//!
//! The rule is a single case-insensitive substring test for `"focus"`. It does
//! not tokenize, so "how do I focus the camera on GO9" routes to Focus too.

use serde::Serialize;

use crate::constants::{URL_FOCUS, URL_GO9};

const FOCUS_KEYWORD: &str = "focus";

/// Device families the assistant knows documentation for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Go9,
    Focus,
}

impl Device {
    pub fn label(self) -> &'static str {
        match self {
            Device::Go9 => "Geotab GO9",
            Device::Focus => "GO Focus / Focus Plus",
        }
    }

    pub fn reference_url(self) -> &'static str {
        match self {
            Device::Go9 => URL_GO9,
            Device::Focus => URL_FOCUS,
        }
    }
}

/// Routing decision for one question. Recomputed per question, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingResult {
    pub device_label: String,
    pub reference_url: String,
}

impl From<Device> for RoutingResult {
    fn from(device: Device) -> Self {
        Self {
            device_label: device.label().to_string(),
            reference_url: device.reference_url().to_string(),
        }
    }
}

pub fn classify(question: &str) -> Device {
    if question.to_lowercase().contains(FOCUS_KEYWORD) {
        Device::Focus
    } else {
        Device::Go9
    }
}

pub fn route(question: &str) -> RoutingResult {
    classify(question).into()
}
