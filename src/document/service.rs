//! Services advertise ways of communicating with the DID subject or associated entities.

use serde::{Deserialize, Serialize};

/// A service entry in a DID document. Can be any type of service the DID subject wants to
/// advertise, including decentralized identity management services for further discovery,
/// authentication, authorization, or interaction.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    /// Identifier for the service. Uniqueness is left to the registrar to enforce.
    pub id: String,
    /// The type of service.
    #[serde(rename = "type")]
    pub type_: String,
    /// The endpoint at which the service can be reached.
    pub service_endpoint: String,
}

impl Service {
    /// Construct a service entry.
    #[must_use]
    pub fn new(id: &str, type_: &str, endpoint: &str) -> Self {
        Self {
            id: id.to_string(),
            type_: type_.to_string(),
            service_endpoint: endpoint.to_string(),
        }
    }
}
