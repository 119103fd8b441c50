use anyhow::{Context, Result};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::{LoadedCatalog, Product, RecordError, RejectedRow, Sku};

const PRODUCTS_QUERY: &str = r#"
SELECT p."Id", p."SKU", p."Name", p."Price"::float8, c."Name", p."FeaturedImageUrl"
FROM "Products" p
LEFT JOIN "Categories" c ON p."CategoryId" = c."Id"
WHERE p."IsActive" OR NOT $1
ORDER BY p."SKU"
"#;

/// Read-only access to the products table.
pub struct DbFetcher {
    client: Client,
}

impl DbFetcher {
    /// Opens the single connection used for the run. Failure is fatal to the caller.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;

        let (client, connection) = config
            .to_pg_config()
            .connect(NoTls)
            .await
            .with_context(|| format!("Failed to connect to database {}", config.describe()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("❌ Database connection error: {}", e);
            }
        });

        info!("✅ Connected to {}", config.describe());
        Ok(DbFetcher { client })
    }

    pub async fn fetch_products(&self, only_active: bool) -> Result<LoadedCatalog> {
        let rows = self
            .client
            .query(PRODUCTS_QUERY, &[&only_active])
            .await
            .context("Failed to query products")?;

        let mut catalog = LoadedCatalog::empty("database");
        catalog.rows = rows.len();

        for (index, row) in rows.iter().enumerate() {
            match product_from_row(row) {
                Ok(product) => {
                    if !catalog.insert(product) {
                        warn!("⚠️ Duplicate SKU in products table at row {}", index + 1);
                    }
                }
                Err(reason) => {
                    let sku = row.try_get::<_, Option<String>>(1).ok().flatten();
                    warn!("⚠️ Skipping database row {}: {}", index + 1, reason);
                    catalog.rejected.push(RejectedRow {
                        line: index + 1,
                        sku,
                        reason,
                    });
                }
            }
        }

        info!(
            "✅ Fetched {} products from database ({} rejected)",
            catalog.len(),
            catalog.rejected.len()
        );
        Ok(catalog)
    }
}

fn product_from_row(row: &Row) -> Result<Product, RecordError> {
    let id: Uuid = row
        .try_get(0)
        .map_err(|_| RecordError::MissingField("Id"))?;
    let sku: Option<String> = row
        .try_get(1)
        .map_err(|_| RecordError::MissingField("SKU"))?;
    let name: Option<String> = row
        .try_get(2)
        .map_err(|_| RecordError::MissingField("Name"))?;
    let price: Option<f64> = row
        .try_get(3)
        .map_err(|_| RecordError::MissingField("Price"))?;

    let sku = Sku::parse(sku.as_deref().unwrap_or(""))?;
    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or(RecordError::EmptyName)?;

    Ok(Product {
        id: Some(id.to_string()),
        sku,
        name,
        price,
        category_label: row.try_get::<_, Option<String>>(4).ok().flatten(),
        image_url: row
            .try_get::<_, Option<String>>(5)
            .ok()
            .flatten()
            .filter(|url| !url.trim().is_empty()),
    })
}
