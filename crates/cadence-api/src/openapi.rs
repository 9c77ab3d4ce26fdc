// OpenAPI specification generation
//
// Used by the API server (for Swagger UI) and by the export-openapi binary
// (for static spec generation).

use crate::api;
use crate::api::{DataResponse, ErrorResponse, ListResponse, ValidationErrorResponse};
use crate::api::events::{EventPayload, EventResource};
use cadence_core::{Event, Frequency};
use utoipa::OpenApi;

/// OpenAPI documentation for the Cadence API
#[derive(OpenApi)]
#[openapi(
    paths(
        api::events::list_events,
        api::events::create_event,
        api::events::get_event,
        api::events::update_event,
        api::events::delete_event,
    ),
    components(
        schemas(
            Event, Frequency,
            EventPayload, EventResource,
            ListResponse<EventResource>,
            DataResponse<EventResource>,
            ErrorResponse, ValidationErrorResponse,
        )
    ),
    tags(
        (name = "events", description = "Calendar events and recurring series")
    ),
    info(
        title = "Cadence API",
        version = "0.1.0",
        description = "API for calendar events with recurring series and overlap protection",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Generate the OpenAPI spec as a pretty-printed JSON string
    pub fn to_json() -> serde_json::Result<String> {
        Self::openapi().to_pretty_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_event_routes() {
        let spec: serde_json::Value = serde_json::from_str(&ApiDoc::to_json().unwrap()).unwrap();
        assert!(spec["paths"]["/v1/events"]["get"].is_object());
        assert!(spec["paths"]["/v1/events"]["post"].is_object());
        assert!(spec["paths"]["/v1/events/{event_id}"]["delete"].is_object());
        assert!(spec["components"]["schemas"]["Event"].is_object());
    }
}
