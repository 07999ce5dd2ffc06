//! OpenAPI documentation configuration

use utoipa::OpenApi;

/// Combined OpenAPI documentation, served at `/api-docs/openapi.json`
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Outfit Finder API",
        version = "0.1.0",
        description = "Extract the items of an outfit from a photo and recommend matching catalogue products"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    nest(
        (path = "/api", api = domain_outfit::ApiDoc)
    ),
    tags(
        (name = "Outfit", description = "Outfit extraction and product recommendation")
    )
)]
pub struct ApiDoc;
