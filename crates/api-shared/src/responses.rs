//! Response envelopes shared by every route.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `{ "message": ... }`, used for errors and plain acknowledgements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    pub message: String,
}

impl MessageRes {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Returned by every delete route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeletedRes {
    pub message: String,
    pub id: String,
}
