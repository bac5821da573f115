use crate::{
    entities::{category, product, Product},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Listing query: `search` is a case-insensitive substring match over
/// name and description; `ordering` accepts `price`, `name`, `-price`,
/// `-name` (unrecognized values are ignored, matching the original
/// listing behavior).
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ProductListQuery {
    pub search: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub image_url: Option<String>,
    pub category: Option<CategoryResponse>,
}

impl ProductResponse {
    fn from_models(product: product::Model, category: Option<category::Model>) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            image_url: product.image_url,
            category: category.map(CategoryResponse::from),
        }
    }
}

enum Ordering {
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
}

impl Ordering {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "price" => Some(Ordering::PriceAsc),
            "-price" => Some(Ordering::PriceDesc),
            "name" => Some(Ordering::NameAsc),
            "-name" => Some(Ordering::NameDesc),
            _ => None,
        }
    }
}

/// Read-only product catalog.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// List products with their category, filtered and sorted per query.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: ProductListQuery,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        let mut select = Product::find();

        if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let needle = format!("%{}%", search.trim().to_lowercase());
            // lower(..) LIKE keeps the match case-insensitive on every backend
            select = select.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(product::Column::Name)))
                            .like(needle.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(product::Column::Description)))
                            .like(needle),
                    ),
            );
        }

        select = match query.ordering.as_deref().and_then(Ordering::parse) {
            Some(Ordering::PriceAsc) => select.order_by_asc(product::Column::Price),
            Some(Ordering::PriceDesc) => select.order_by_desc(product::Column::Price),
            Some(Ordering::NameAsc) => select.order_by_asc(product::Column::Name),
            Some(Ordering::NameDesc) => select.order_by_desc(product::Column::Name),
            None => select.order_by_asc(product::Column::CreatedAt),
        };

        let rows = select
            .find_also_related(crate::entities::Category)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(product, category)| ProductResponse::from_models(product, category))
            .collect())
    }
}
