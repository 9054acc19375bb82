/// Observer event hub and payloads.
pub mod events;
/// Completed-round persistence coordination.
pub mod record_service;
