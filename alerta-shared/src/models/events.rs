//! Domain event schemas for the incident backend.
//!
//! Wire tags and field names match what producers already emit; the Spanish
//! names are the protocol, not a choice this crate gets to revisit.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::envelope::NotificationEnvelope;

/// The incident event kinds carried in an envelope's `eventType` tag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IncidentEventKind {
    Created,
    Updated,
    Prioritized,
    Attending,
    Resolved,
    Closed,
    Deleted,
}

impl IncidentEventKind {
    /// The wire tag expected by subscribers.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "IncidenteCreado",
            Self::Updated => "IncidenteActualizado",
            Self::Prioritized => "PriorizarIncidente",
            Self::Attending => "IncidenteEnAtencion",
            Self::Resolved => "IncidenteResuelto",
            Self::Closed => "CerrarIncidente",
            Self::Deleted => "IncidenteEliminado",
        }
    }
}

impl fmt::Display for IncidentEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IncidentEventKind {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "IncidenteCreado" => Ok(Self::Created),
            "IncidenteActualizado" => Ok(Self::Updated),
            "PriorizarIncidente" => Ok(Self::Prioritized),
            "IncidenteEnAtencion" => Ok(Self::Attending),
            "IncidenteResuelto" => Ok(Self::Resolved),
            "CerrarIncidente" => Ok(Self::Closed),
            "IncidenteEliminado" => Ok(Self::Deleted),
            _ => Err("unknown incident event kind"),
        }
    }
}

/// Incident urgency levels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Alto,
    Medio,
    Bajo,
}

/// Payload of an `IncidenteCreado` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentCreated {
    #[serde(rename = "incidenciaId")]
    pub incidencia_id: String,
    pub titulo: String,
    pub descripcion: String,
    pub urgencia: Urgency,
    pub tipo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ubicacion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(rename = "creadoPor")]
    pub creado_por: String,
}

/// Payload of an `IncidenteActualizado` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentUpdated {
    #[serde(rename = "incidenciaId")]
    pub incidencia_id: String,
    pub campos: Vec<String>,
    #[serde(rename = "actualizadoPor")]
    pub actualizado_por: String,
}

/// Payload of a `PriorizarIncidente` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentPrioritized {
    #[serde(rename = "incidenciaId")]
    pub incidencia_id: String,
    #[serde(rename = "tipoPriorizacion")]
    pub tipo_priorizacion: PrioritizationKind,
    #[serde(rename = "nuevaPrioridad")]
    pub nueva_prioridad: i32,
    #[serde(rename = "priorizadoPor")]
    pub priorizado_por: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PrioritizationKind {
    Horizontal,
    Vertical,
}

/// Payload of an `IncidenteResuelto` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentResolved {
    #[serde(rename = "incidenciaId")]
    pub incidencia_id: String,
    pub resolucion: String,
    #[serde(rename = "resueltoPor")]
    pub resuelto_por: String,
}

/// Payload of an `IncidenteEliminado` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncidentDeleted {
    #[serde(rename = "incidenciaId")]
    pub incidencia_id: String,
    #[serde(rename = "eliminadoPor")]
    pub eliminado_por: String,
}

/// Build the envelope a producer publishes for an incident event.
///
/// # Errors
/// Returns a serialization error if the payload cannot be represented as
/// JSON.
pub fn incident_envelope<T: Serialize>(
    kind: IncidentEventKind,
    channel: impl Into<String>,
    payload: &T,
) -> Result<NotificationEnvelope, serde_json::Error> {
    Ok(NotificationEnvelope::new(
        channel,
        kind.as_str(),
        serde_json::to_value(payload)?,
    ))
}
