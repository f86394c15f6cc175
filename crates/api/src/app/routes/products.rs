use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use campuscart_core::ProductId;
use campuscart_infra::CommerceStore;
use campuscart_products::Category;

use crate::app::{AppServices, dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ProductQuery>,
) -> axum::response::Response {
    let result = match query.category {
        Some(category) => {
            let category = match Category::new(category) {
                Ok(c) => c,
                Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_category", e.to_string()),
            };
            services.store().products_by_category(&category).await
        }
        None => services.store().all_products().await,
    };

    match result {
        Ok(products) => Json(products).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match ProductId::parse(&id) {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };

    match services.store().get_product(&product_id).await {
        Ok(Some(product)) => Json(product).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}
