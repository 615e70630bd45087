// ── Resource identity ──
//
// `(type, id)` is the universal key into the graph. The canonical lookup
// string is `"{type}/{id}"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use huesync_api::ResourceIdentifier;

// ── ResourceType ────────────────────────────────────────────────────

/// Type tag of a resource, as sent in the `type` / `rtype` fields.
///
/// Unknown tags are kept verbatim in [`Other`](Self::Other) so new bridge
/// firmware never breaks ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Device,
    BridgeHome,
    Room,
    Zone,
    Scene,
    SmartScene,
    Light,
    GroupedLight,
    Bridge,
    Motion,
    Button,
    RelativeRotary,
    Temperature,
    LightLevel,
    DevicePower,
    ZigbeeConnectivity,
    Entertainment,
    EntertainmentConfiguration,
    Other(String),
}

/// How ingestion treats a type: processed in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Device,
    Group,
    Container,
    Service,
}

const NAMES: &[(&str, ResourceType)] = &[
    ("device", ResourceType::Device),
    ("bridge_home", ResourceType::BridgeHome),
    ("room", ResourceType::Room),
    ("zone", ResourceType::Zone),
    ("scene", ResourceType::Scene),
    ("smart_scene", ResourceType::SmartScene),
    ("light", ResourceType::Light),
    ("grouped_light", ResourceType::GroupedLight),
    ("bridge", ResourceType::Bridge),
    ("motion", ResourceType::Motion),
    ("button", ResourceType::Button),
    ("relative_rotary", ResourceType::RelativeRotary),
    ("temperature", ResourceType::Temperature),
    ("light_level", ResourceType::LightLevel),
    ("device_power", ResourceType::DevicePower),
    ("zigbee_connectivity", ResourceType::ZigbeeConnectivity),
    ("entertainment", ResourceType::Entertainment),
    ("entertainment_configuration", ResourceType::EntertainmentConfiguration),
];

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Other(tag) => tag,
            known => NAMES
                .iter()
                .find(|(_, t)| t == known)
                .map_or("unknown", |(name, _)| name),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Device => Category::Device,
            Self::BridgeHome | Self::Room | Self::Zone => Category::Group,
            Self::Scene | Self::SmartScene => Category::Container,
            _ => Category::Service,
        }
    }

    /// Services whose light setters apply directly.
    pub fn is_light_like(&self) -> bool {
        matches!(self, Self::Light | Self::GroupedLight)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map_or_else(|| Self::Other(s.to_owned()), |(_, t)| t.clone()))
    }
}

impl From<&str> for ResourceType {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }
}

impl Serialize for ResourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

// ── ResourceIdentity ────────────────────────────────────────────────

/// Composite key of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceIdentity {
    #[serde(rename = "type")]
    pub rtype: ResourceType,
    pub id: String,
}

impl ResourceIdentity {
    pub fn new(rtype: impl Into<ResourceType>, id: impl Into<String>) -> Self {
        Self {
            rtype: rtype.into(),
            id: id.into(),
        }
    }

    /// Identity of a full document or delta (`{"id": .., "type": ..}`).
    pub fn from_document(doc: &Value) -> Option<Self> {
        let id = doc.get("id")?.as_str()?;
        let rtype = doc.get("type")?.as_str()?;
        Some(Self::new(rtype, id))
    }

    /// Identity of an embedded reference (`{"rid": .., "rtype": ..}`).
    pub fn from_reference(reference: &Value) -> Option<Self> {
        ResourceIdentifier::from_value(reference).map(Self::from)
    }

    pub fn category(&self) -> Category {
        self.rtype.category()
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.rtype, self.id)
    }
}

/// Error parsing a `"{type}/{id}"` string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected \"type/id\", got {0:?}")]
pub struct ParseIdentityError(String);

impl FromStr for ResourceIdentity {
    type Err = ParseIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((rtype, id)) if !rtype.is_empty() && !id.is_empty() => Ok(Self::new(rtype, id)),
            _ => Err(ParseIdentityError(s.to_owned())),
        }
    }
}

impl From<ResourceIdentifier> for ResourceIdentity {
    fn from(r: ResourceIdentifier) -> Self {
        Self::new(r.rtype.as_str(), r.rid)
    }
}

impl From<&ResourceIdentity> for ResourceIdentifier {
    fn from(identity: &ResourceIdentity) -> Self {
        ResourceIdentifier::new(identity.id.clone(), identity.rtype.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn display_and_parse_round_trip() {
        let id = ResourceIdentity::new("grouped_light", "abc-123");
        assert_eq!(id.to_string(), "grouped_light/abc-123");
        assert_eq!("grouped_light/abc-123".parse::<ResourceIdentity>().unwrap(), id);
        assert!("nonsense".parse::<ResourceIdentity>().is_err());
    }

    #[test]
    fn unknown_types_are_preserved() {
        let t = ResourceType::from("geofence_client");
        assert_eq!(t, ResourceType::Other("geofence_client".into()));
        assert_eq!(t.to_string(), "geofence_client");
        assert_eq!(t.category(), Category::Service);
    }

    #[test]
    fn categories() {
        assert_eq!(ResourceType::Device.category(), Category::Device);
        assert_eq!(ResourceType::Zone.category(), Category::Group);
        assert_eq!(ResourceType::SmartScene.category(), Category::Container);
        assert_eq!(ResourceType::GroupedLight.category(), Category::Service);
    }

    #[test]
    fn identities_from_json() {
        let doc = json!({"id": "L1", "type": "light", "on": {"on": true}});
        assert_eq!(
            ResourceIdentity::from_document(&doc),
            Some(ResourceIdentity::new(ResourceType::Light, "L1"))
        );

        let reference = json!({"rid": "D1", "rtype": "device"});
        assert_eq!(
            ResourceIdentity::from_reference(&reference),
            Some(ResourceIdentity::new(ResourceType::Device, "D1"))
        );
    }

    #[test]
    fn serde_uses_wire_names() {
        let id = ResourceIdentity::new("smart_scene", "s1");
        let value = serde_json::to_value(&id).unwrap();
        assert_eq!(value, json!({"type": "smart_scene", "id": "s1"}));
    }
}
