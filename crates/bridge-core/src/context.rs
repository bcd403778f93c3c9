use uuid::Uuid;

use bridge_validate::Principal;

/// Request-scoped context threaded explicitly through validator →
/// resilience → executor → parser → stream publish (§9 "Replacement for
/// thread-local / dynamic context"). Never retrieved from an ambient
/// source — every layer that needs the caller's identity or trace id takes
/// one of these as a parameter.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub principal: Principal,
    pub trace_id: Uuid,
}

impl RequestContext {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            trace_id: Uuid::new_v4(),
        }
    }

    pub fn with_trace_id(principal: Principal, trace_id: Uuid) -> Self {
        Self { principal, trace_id }
    }
}
