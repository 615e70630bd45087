// ── Light state view ──
//
// Typed read-only view over a light-like resource's canonical data. The
// optional sub-records mirror the capability set: a dimmable-only light
// has no colour temperature, and so on.

use serde::Serialize;
use serde_json::{Map, Value};

use super::capability::{CapabilitySet, capabilities_of};

/// Default colour temperature range when a light omits its schema.
pub const DEFAULT_MIREK_MIN: u16 = 153;
pub const DEFAULT_MIREK_MAX: u16 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MirekSchema {
    pub minimum: u16,
    pub maximum: u16,
}

impl Default for MirekSchema {
    fn default() -> Self {
        Self {
            minimum: DEFAULT_MIREK_MIN,
            maximum: DEFAULT_MIREK_MAX,
        }
    }
}

impl MirekSchema {
    pub fn clamp(self, mirek: u16) -> u16 {
        mirek.clamp(self.minimum, self.maximum)
    }

    pub fn contains(self, mirek: u16) -> bool {
        (self.minimum..=self.maximum).contains(&mirek)
    }
}

/// CIE xy chromaticity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Xy {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dimming {
    /// Percentage, 0-100.
    pub brightness: Option<f64>,
    pub min_dim_level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorTemperature {
    /// `None` when the light is currently outside the white range.
    pub mirek: Option<u16>,
    pub schema: MirekSchema,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Color {
    pub xy: Option<Xy>,
    pub gamut_type: Option<String>,
}

/// Snapshot of a light-like resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightState {
    pub on: Option<bool>,
    pub dimming: Option<Dimming>,
    pub color_temperature: Option<ColorTemperature>,
    pub color: Option<Color>,
    #[serde(skip)]
    pub capabilities: CapabilitySet,
}

impl LightState {
    pub fn from_data(data: &Map<String, Value>) -> Self {
        let dimming = data.get("dimming").filter(|v| v.is_object()).map(|d| Dimming {
            brightness: d.get("brightness").and_then(Value::as_f64),
            min_dim_level: d.get("min_dim_level").and_then(Value::as_f64),
        });

        let color_temperature = data
            .get("color_temperature")
            .filter(|v| v.is_object())
            .map(|ct| ColorTemperature {
                mirek: ct.get("mirek").and_then(as_u16),
                schema: mirek_schema(ct),
            });

        let color = data.get("color").filter(|v| v.is_object()).map(|c| Color {
            xy: c.get("xy").and_then(|xy| {
                Some(Xy {
                    x: xy.get("x")?.as_f64()?,
                    y: xy.get("y")?.as_f64()?,
                })
            }),
            gamut_type: c
                .get("gamut_type")
                .and_then(Value::as_str)
                .map(str::to_owned),
        });

        Self {
            on: data
                .get("on")
                .and_then(|on| on.get("on"))
                .and_then(Value::as_bool),
            dimming,
            color_temperature,
            color,
            capabilities: capabilities_of(data),
        }
    }

    pub fn is_on(&self) -> bool {
        self.on.unwrap_or(false)
    }

    pub fn brightness(&self) -> Option<f64> {
        self.dimming.as_ref()?.brightness
    }

    pub fn min_brightness(&self) -> Option<f64> {
        self.dimming.as_ref()?.min_dim_level
    }

    pub fn mirek(&self) -> Option<u16> {
        self.color_temperature.as_ref()?.mirek
    }

    pub fn xy(&self) -> Option<Xy> {
        self.color.as_ref()?.xy
    }
}

/// `mirek_schema` of a `color_temperature` object, with defaults.
pub(crate) fn mirek_schema(ct: &Value) -> MirekSchema {
    let defaults = MirekSchema::default();
    let schema = ct.get("mirek_schema");
    MirekSchema {
        minimum: schema
            .and_then(|s| s.get("mirek_minimum"))
            .and_then(as_u16)
            .unwrap_or(defaults.minimum),
        maximum: schema
            .and_then(|s| s.get("mirek_maximum"))
            .and_then(as_u16)
            .unwrap_or(defaults.maximum),
    }
}

fn as_u16(value: &Value) -> Option<u16> {
    value.as_u64().and_then(|v| u16::try_from(v).ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn state(doc: &Value) -> LightState {
        LightState::from_data(doc.as_object().unwrap_or(&Map::new()))
    }

    #[test]
    fn white_ambiance_state() {
        let s = state(&json!({
            "on": {"on": true},
            "dimming": {"brightness": 42.5, "min_dim_level": 1.5},
            "color_temperature": {"mirek": 250, "mirek_valid": true,
                "mirek_schema": {"mirek_minimum": 153, "mirek_maximum": 454}}
        }));

        assert!(s.is_on());
        assert_eq!(s.brightness(), Some(42.5));
        assert_eq!(s.min_brightness(), Some(1.5));
        assert_eq!(s.mirek(), Some(250));
        assert_eq!(
            s.color_temperature.map(|ct| ct.schema),
            Some(MirekSchema { minimum: 153, maximum: 454 })
        );
        assert!(s.color.is_none());
    }

    #[test]
    fn missing_schema_uses_defaults() {
        let s = state(&json!({"color_temperature": {"mirek": null}}));
        let ct = s.color_temperature.unwrap_or(ColorTemperature {
            mirek: Some(0),
            schema: MirekSchema { minimum: 0, maximum: 0 },
        });
        assert_eq!(ct.mirek, None);
        assert_eq!(ct.schema, MirekSchema::default());
        assert_eq!(ct.schema.clamp(1000), DEFAULT_MIREK_MAX);
    }

    #[test]
    fn color_state() {
        let s = state(&json!({
            "on": {"on": false},
            "color": {"xy": {"x": 0.3, "y": 0.4}, "gamut_type": "C"}
        }));
        assert!(!s.is_on());
        assert_eq!(s.xy(), Some(Xy { x: 0.3, y: 0.4 }));
        assert_eq!(s.color.and_then(|c| c.gamut_type).as_deref(), Some("C"));
    }
}
