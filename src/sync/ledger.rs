use serde::Serialize;
use uuid::Uuid;

use crate::db::Versioned;
use crate::error::ApiResult;
use crate::models::{Candidate, EntityKind};

/// A client write that was rejected because the server changed the entity
/// after the client's checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Conflict {
    pub id: Uuid,
    pub kind: EntityKind,
    pub server_value: serde_json::Value,
    pub client_value: serde_json::Value,
}

/// Conflicts collected during one sync call. Lives only as long as the call.
#[derive(Debug, Default)]
pub(crate) struct ConflictLedger {
    conflicts: Vec<Conflict>,
}

impl ConflictLedger {
    pub(crate) fn record<E: Versioned>(
        &mut self,
        server: &E,
        client: &Candidate<E::Input>,
    ) -> ApiResult<()> {
        self.conflicts.push(Conflict {
            id: server.id(),
            kind: E::KIND,
            server_value: serde_json::to_value(server)?,
            client_value: serde_json::to_value(client)?,
        });
        Ok(())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub(crate) fn into_conflicts(self) -> Vec<Conflict> {
        self.conflicts
    }
}
