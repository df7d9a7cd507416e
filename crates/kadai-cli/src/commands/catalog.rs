//! `kadai products ...`: catalog maintenance against the shared database.

use std::path::Path;

use anyhow::{Context, Result};
use kadai_schemas::prices::{format_minor, price_to_minor};
use kadai_shop::{CatalogError, CatalogService, ImageUpload, ProductForm};

use super::{load_config, open_store};

async fn service() -> Result<CatalogService> {
    let cfg = load_config()?;
    let store = open_store(&cfg).await?;
    let objects = kadai_storage::object_store_from_config(&cfg.storage);
    Ok(CatalogService::new(
        store,
        objects,
        cfg.catalog.clone(),
        cfg.images.clone(),
    ))
}

pub async fn list() -> Result<()> {
    let products = service().await?.list_products().await?;
    println!("products={}", products.len());
    for p in products {
        println!(
            "product id={} price={} created_at={} name={:?} image_url={}",
            p.id,
            format_minor(p.price),
            p.created_at.to_rfc3339(),
            p.name,
            p.image_url
        );
    }
    Ok(())
}

pub async fn add(name: String, description: String, price: f64, image: String) -> Result<()> {
    let price = price_to_minor(price).map_err(|e| anyhow::anyhow!("invalid --price: {e}"))?;
    let image = read_image(Path::new(&image))?;

    let form = ProductForm {
        name,
        description,
        price,
        image: Some(image),
    };

    match service().await?.create_product(form).await {
        Ok(p) => {
            println!("product_created=true id={} image_url={}", p.id, p.image_url);
            Ok(())
        }
        Err(CatalogError::Invalid(errors)) => {
            for f in &errors.fields {
                eprintln!("  {}={}", f.field, f.message);
            }
            Err(CatalogError::Invalid(errors).into())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn delete(id: &str) -> Result<()> {
    service().await?.delete_product(id).await?;
    println!("product_deleted=true id={}", id);
    Ok(())
}

fn read_image(path: &Path) -> Result<ImageUpload> {
    let bytes = std::fs::read(path).with_context(|| format!("read image failed: {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();
    Ok(ImageUpload {
        content_type: content_type_for(path).to_string(),
        filename,
        bytes,
    })
}

/// Extension-based guess; anything unknown is left for validation to refuse.
fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
