// ── Capabilities and device classification ──
//
// A device's kind is derived once from what its services can do. Both
// classifiers are pure functions over capability sets so they can be
// tested without a registry.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Map, Value};
use strum::{Display, EnumString};

use super::identity::ResourceType;

/// One facet of a light-like service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Capability {
    On,
    Dimming,
    ColorTemperature,
    Color,
}

pub type CapabilitySet = BTreeSet<Capability>;

/// Capabilities present in a light-like service document.
pub fn capabilities_of(data: &Map<String, Value>) -> CapabilitySet {
    [
        ("on", Capability::On),
        ("dimming", Capability::Dimming),
        ("color_temperature", Capability::ColorTemperature),
        ("color", Capability::Color),
    ]
    .into_iter()
    .filter(|(key, _)| data.get(*key).is_some_and(Value::is_object))
    .map(|(_, cap)| cap)
    .collect()
}

/// Bulb variants, most to least capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum LightKind {
    ExtendedColor,
    Color,
    WhiteAmbiance,
    Dimmable,
    OnOff,
    /// A light whose capabilities match no known combination.
    Generic,
}

/// Known exact capability combinations, checked in order.
const LIGHT_COMBINATIONS: &[(&[Capability], LightKind)] = &[
    (
        &[
            Capability::On,
            Capability::Dimming,
            Capability::ColorTemperature,
            Capability::Color,
        ],
        LightKind::ExtendedColor,
    ),
    (
        &[Capability::On, Capability::Dimming, Capability::Color],
        LightKind::Color,
    ),
    (
        &[
            Capability::On,
            Capability::Dimming,
            Capability::ColorTemperature,
        ],
        LightKind::WhiteAmbiance,
    ),
    (&[Capability::On, Capability::Dimming], LightKind::Dimmable),
    (&[Capability::On], LightKind::OnOff),
];

/// Exact-match a capability set against the known combinations.
pub fn classify_light(caps: &CapabilitySet) -> LightKind {
    LIGHT_COMBINATIONS
        .iter()
        .find(|(combo, _)| combo.len() == caps.len() && combo.iter().all(|c| caps.contains(c)))
        .map_or(LightKind::Generic, |(_, kind)| *kind)
}

/// Effective subtype of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// The device carrying the bridge service. There is exactly one.
    Bridge,
    Light(LightKind),
    MotionSensor,
    Switch,
    Plain,
}

impl DeviceKind {
    pub fn light_kind(self) -> Option<LightKind> {
        match self {
            Self::Light(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bridge => f.write_str("bridge"),
            Self::Light(kind) => write!(f, "light:{kind}"),
            Self::MotionSensor => f.write_str("motion_sensor"),
            Self::Switch => f.write_str("switch"),
            Self::Plain => f.write_str("device"),
        }
    }
}

/// Classify a device from its owned services.
///
/// `light` carries the capabilities of the owned light service when there
/// is one. Precedence: bridge, light, motion, button, plain.
pub fn classify_device<'a>(
    service_types: impl IntoIterator<Item = &'a ResourceType>,
    light: Option<&CapabilitySet>,
) -> DeviceKind {
    let types: Vec<&ResourceType> = service_types.into_iter().collect();
    let has = |t: &ResourceType| types.iter().any(|s| *s == t);

    if has(&ResourceType::Bridge) {
        return DeviceKind::Bridge;
    }
    if let Some(caps) = light {
        return DeviceKind::Light(classify_light(caps));
    }
    if has(&ResourceType::Light) {
        return DeviceKind::Light(LightKind::Generic);
    }
    if has(&ResourceType::Motion) {
        return DeviceKind::MotionSensor;
    }
    if has(&ResourceType::Button) || has(&ResourceType::RelativeRotary) {
        return DeviceKind::Switch;
    }
    DeviceKind::Plain
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn caps(list: &[Capability]) -> CapabilitySet {
        list.iter().copied().collect()
    }

    #[test]
    fn exact_combinations() {
        use Capability::{Color, ColorTemperature, Dimming, On};

        assert_eq!(classify_light(&caps(&[On])), LightKind::OnOff);
        assert_eq!(classify_light(&caps(&[On, Dimming])), LightKind::Dimmable);
        assert_eq!(
            classify_light(&caps(&[On, Dimming, ColorTemperature])),
            LightKind::WhiteAmbiance
        );
        assert_eq!(classify_light(&caps(&[On, Dimming, Color])), LightKind::Color);
        assert_eq!(
            classify_light(&caps(&[On, Dimming, ColorTemperature, Color])),
            LightKind::ExtendedColor
        );
    }

    #[test]
    fn non_matching_sets_are_generic() {
        use Capability::{Color, Dimming, On};

        assert_eq!(classify_light(&caps(&[On, Color])), LightKind::Generic);
        assert_eq!(classify_light(&caps(&[Dimming])), LightKind::Generic);
        assert_eq!(classify_light(&caps(&[])), LightKind::Generic);
    }

    #[test]
    fn classification_is_deterministic() {
        let set = caps(&[Capability::On, Capability::Dimming]);
        let first = classify_light(&set);
        for _ in 0..10 {
            assert_eq!(classify_light(&set), first);
        }
    }

    #[test]
    fn capabilities_from_document() {
        let data = json!({
            "on": {"on": true},
            "dimming": {"brightness": 50.0, "min_dim_level": 2.0},
            "color_temperature": {"mirek": 300},
            "metadata": {"name": "Desk"}
        });
        let set = capabilities_of(data.as_object().unwrap_or(&Map::new()));
        assert_eq!(
            set,
            caps(&[Capability::On, Capability::Dimming, Capability::ColorTemperature])
        );
    }

    #[test]
    fn device_precedence() {
        let full = caps(&[Capability::On]);
        assert_eq!(
            classify_device(&[ResourceType::Bridge, ResourceType::ZigbeeConnectivity], None),
            DeviceKind::Bridge
        );
        assert_eq!(
            classify_device(&[ResourceType::Light, ResourceType::Motion], Some(&full)),
            DeviceKind::Light(LightKind::OnOff)
        );
        assert_eq!(
            classify_device(&[ResourceType::Motion, ResourceType::Button], None),
            DeviceKind::MotionSensor
        );
        assert_eq!(classify_device(&[ResourceType::Button], None), DeviceKind::Switch);
        assert_eq!(classify_device(&[ResourceType::DevicePower], None), DeviceKind::Plain);
    }
}
