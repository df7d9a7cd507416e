//! Catalog reader and the admin catalog writer.

use std::sync::Arc;

use chrono::Utc;
use kadai_config::{CatalogConfig, ImagesConfig};
use kadai_db::{DocumentStore, StoreError};
use kadai_schemas::{NewProduct, Product, ProductPatch};
use kadai_storage::{ObjectKey, ObjectStore, StorageError};
use tracing::info;

use crate::validation::{check_image, ImageUpload, ValidationErrors};

/// Admin product form. `price` is already in minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub price: i64,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error("product image upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `require_image` is true on create; an edit may keep the stored image.
pub fn validate_product(
    form: &ProductForm,
    require_image: bool,
    rules: &CatalogConfig,
    images: &ImagesConfig,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if form.name.trim().chars().count() < rules.name_min_chars {
        errors.push(
            "name",
            format!("Product name must be at least {} characters", rules.name_min_chars),
        );
    }
    if form.description.trim().chars().count() < rules.description_min_chars {
        errors.push(
            "description",
            format!(
                "Description must be at least {} characters",
                rules.description_min_chars
            ),
        );
    }
    if form.price < 0 {
        errors.push("price", "Price must be a positive number");
    }
    match &form.image {
        Some(img) => check_image(&mut errors, "image", img, images),
        None if require_image => errors.push("image", "Please upload a product image."),
        None => {}
    }
    errors.into_result()
}

pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
    objects: Arc<dyn ObjectStore>,
    rules: CatalogConfig,
    images: ImagesConfig,
}

impl CatalogService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        rules: CatalogConfig,
        images: ImagesConfig,
    ) -> Self {
        Self {
            store,
            objects,
            rules,
            images,
        }
    }

    /// Field checks with this service's rules, without writing anything.
    pub fn validate(&self, form: &ProductForm, require_image: bool) -> Result<(), ValidationErrors> {
        validate_product(form, require_image, &self.rules, &self.images)
    }

    /// Newest first.
    pub async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        self.store.list_products().await
    }

    pub async fn get_product(&self, id: &str) -> Result<Product, StoreError> {
        self.store.get_product(id).await
    }

    pub async fn create_product(&self, form: ProductForm) -> Result<Product, CatalogError> {
        validate_product(&form, true, &self.rules, &self.images)?;
        let image_url = match form.image {
            Some(img) => self.upload(img).await?,
            None => return Err(missing_image().into()),
        };
        let product = self
            .store
            .insert_product(NewProduct {
                name: form.name.trim().to_string(),
                description: form.description.trim().to_string(),
                price: form.price,
                image_url,
            })
            .await?;
        info!(product_id = %product.id, price = product.price, "product created");
        Ok(product)
    }

    /// Replaces the editable fields; the image reference changes only when a
    /// new image is supplied.
    pub async fn update_product(&self, id: &str, form: ProductForm) -> Result<Product, CatalogError> {
        validate_product(&form, false, &self.rules, &self.images)?;
        // Fail before uploading anything for a product that is gone.
        self.store.get_product(id).await?;

        let image_url = match form.image {
            Some(img) => Some(self.upload(img).await?),
            None => None,
        };
        let product = self
            .store
            .update_product(
                id,
                ProductPatch {
                    name: form.name.trim().to_string(),
                    description: form.description.trim().to_string(),
                    price: form.price,
                    image_url,
                },
            )
            .await?;
        info!(product_id = %product.id, "product updated");
        Ok(product)
    }

    /// Removes the record only. The stored image stays where it is.
    pub async fn delete_product(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete_product(id).await?;
        info!(product_id = %id, "product deleted");
        Ok(())
    }

    async fn upload(&self, img: ImageUpload) -> Result<String, StorageError> {
        let key = ObjectKey::product(Utc::now().timestamp_millis(), &img.filename);
        self.objects.put(&key, img.bytes, &img.content_type).await
    }
}

fn missing_image() -> ValidationErrors {
    let mut e = ValidationErrors::new();
    e.push("image", "Please upload a product image.");
    e
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, description: &str, price: i64, image: bool) -> ProductForm {
        ProductForm {
            name: name.into(),
            description: description.into(),
            price,
            image: image.then(|| ImageUpload {
                filename: "tea.jpg".into(),
                content_type: "image/jpeg".into(),
                bytes: vec![0xff, 0xd8],
            }),
        }
    }

    fn check(f: &ProductForm, require_image: bool) -> Result<(), ValidationErrors> {
        validate_product(f, require_image, &CatalogConfig::default(), &ImagesConfig::default())
    }

    #[test]
    fn messages_match_the_form() {
        let err = check(&form("ab", "short", -1, false), true).unwrap_err();
        let msgs: Vec<_> = err.fields.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(
            msgs,
            vec![
                "Product name must be at least 3 characters",
                "Description must be at least 10 characters",
                "Price must be a positive number",
                "Please upload a product image.",
            ]
        );
    }

    #[test]
    fn zero_price_is_allowed_and_edit_may_skip_image() {
        assert!(check(&form("Tea", "Fresh masala tea", 0, true), true).is_ok());
        assert!(check(&form("Tea", "Fresh masala tea", 0, false), false).is_ok());
    }

    #[test]
    fn padding_does_not_count_toward_length() {
        let err = check(&form("  ab  ", "Fresh masala tea", 10, true), true).unwrap_err();
        assert!(err.has("name"));
    }
}
