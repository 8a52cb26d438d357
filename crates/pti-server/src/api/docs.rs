//! OpenAPI documentation and Swagger UI.

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::{ErrorResponse, images};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PTI",
        description = "Pass The Image: upload an image, get a short link back",
    ),
    paths(images::upload_image, images::get_image, images::root),
    components(schemas(images::UploadResponse, ErrorResponse)),
    tags((name = "images", description = "Image upload and retrieval"))
)]
pub struct ApiDoc;

/// - `/docs` - Swagger UI
/// - `/openapi.json` - Raw OpenAPI document
pub fn router() -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}
