//! Product management for the signed-in seller.
//!
//! Every handler is scoped to products the current user created. Add and
//! edit take `multipart/form-data` so an image can be attached.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use bazaar_core::ProductId;

use super::forms::{self, FieldErrors, ProductForm};
use super::views::ProductView;
use crate::db::ProductRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::models::{NewProduct, ProductUpdate};
use crate::services::uploads::ImageUpload;
use crate::state::AppState;

// =============================================================================
// Templates
// =============================================================================

/// Add/edit product form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/edit-product.html")]
pub struct EditProductTemplate {
    pub ctx: PageContext,
    pub editing: bool,
    pub error_message: Option<String>,
    pub errors: FieldErrors,
    pub form: ProductForm,
}

/// The seller's own products.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products.html")]
pub struct AdminProductsTemplate {
    pub ctx: PageContext,
    pub products: Vec<ProductView>,
}

/// `?edit=` query on the edit page.
#[derive(Debug, Deserialize)]
pub struct EditQuery {
    pub edit: Option<String>,
}

// =============================================================================
// Multipart Form
// =============================================================================

/// The image part of a product form.
#[derive(Debug)]
pub enum PostedImage {
    /// No file was chosen.
    Missing,
    /// A file was sent but is not an accepted image.
    Rejected,
    Valid(ImageUpload),
}

/// Read the text fields and the image part of a product form.
async fn read_product_form(
    mut multipart: Multipart,
) -> std::result::Result<(ProductForm, PostedImage), MultipartError> {
    let mut form = ProductForm::default();
    let mut image = PostedImage::Missing;

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "image" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                image = posted_image(file_name.as_deref(), content_type.as_deref(), bytes.to_vec());
            }
            "title" => form.title = field.text().await?,
            "price" => form.price = field.text().await?,
            "description" => form.description = field.text().await?,
            "productId" => form.product_id = Some(field.text().await?),
            // `_csrf` and anything unexpected
            _ => {
                field.bytes().await?;
            }
        }
    }

    Ok((form, image))
}

/// Browsers send an empty, nameless part when no file is chosen.
fn posted_image(file_name: Option<&str>, content_type: Option<&str>, bytes: Vec<u8>) -> PostedImage {
    if file_name.is_none_or(str::is_empty) && bytes.is_empty() {
        return PostedImage::Missing;
    }

    match ImageUpload::new(file_name, content_type, bytes) {
        Ok(upload) => PostedImage::Valid(upload),
        Err(_) => PostedImage::Rejected,
    }
}

fn form_page(
    ctx: PageContext,
    editing: bool,
    form: ProductForm,
    errors: FieldErrors,
) -> Response {
    let template = EditProductTemplate {
        ctx,
        editing,
        error_message: errors.first_message().map(str::to_string),
        errors,
        form,
    };
    (StatusCode::UNPROCESSABLE_ENTITY, template).into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /admin/add-product`
pub async fn add_product_page(RequireAuth(_user): RequireAuth, ctx: PageContext) -> EditProductTemplate {
    EditProductTemplate {
        ctx,
        editing: false,
        error_message: None,
        errors: FieldErrors::new(),
        form: ProductForm::default(),
    }
}

/// `POST /admin/add-product`
#[instrument(skip(state, user, ctx, multipart), fields(user_id = %user.id))]
pub async fn add_product(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
    multipart: Multipart,
) -> Result<Response> {
    let (form, image) = match read_product_form(multipart).await {
        Ok(parsed) => parsed,
        Err(e) => return Ok(e.into_response()),
    };

    let PostedImage::Valid(image) = image else {
        let mut errors = FieldErrors::new();
        errors.add("image", forms::PRODUCT_IMAGE_INVALID);
        return Ok(form_page(ctx, false, form, errors));
    };

    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => return Ok(form_page(ctx, false, form, errors)),
    };

    let image_path = state.images().save(&image).await?;
    let product = ProductRepository::new(state.pool())
        .create(&NewProduct {
            title: valid.title,
            price: valid.price,
            description: valid.description,
            image_path: image_path.clone(),
            user_id: user.id,
        })
        .await;

    match product {
        Ok(product) => {
            tracing::info!(product_id = %product.id, "Product created");
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(e) => {
            state.images().delete(&image_path).await;
            Err(e.into())
        }
    }
}

/// `GET /admin/products`
#[instrument(skip(state, user, ctx), fields(user_id = %user.id))]
pub async fn products(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
) -> Result<AdminProductsTemplate> {
    let products = ProductRepository::new(state.pool())
        .list_by_owner(user.id)
        .await?;

    Ok(AdminProductsTemplate {
        ctx,
        products: ProductView::list(&products, state.config().stripe.currency),
    })
}

/// `GET /admin/edit-product/{id}?edit=true`
#[instrument(skip(state, user, ctx, query), fields(user_id = %user.id))]
pub async fn edit_product_page(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
    Query(query): Query<EditQuery>,
    Path(id): Path<String>,
) -> Result<Response> {
    if query.edit.as_deref() != Some("true") {
        return Ok(Redirect::to("/").into_response());
    }
    let Ok(id) = id.parse::<ProductId>() else {
        return Ok(Redirect::to("/").into_response());
    };

    let Some(product) = ProductRepository::new(state.pool())
        .get_owned(id, user.id)
        .await?
    else {
        return Ok(Redirect::to("/").into_response());
    };

    Ok(EditProductTemplate {
        ctx,
        editing: true,
        error_message: None,
        errors: FieldErrors::new(),
        form: ProductForm {
            title: product.title,
            price: product.price.to_string(),
            description: product.description,
            product_id: Some(product.id.to_string()),
        },
    }
    .into_response())
}

/// `POST /admin/edit-product`
///
/// Keeps the current image unless a new one is attached. A replaced image
/// is removed from disk once the row points at the new one.
#[instrument(skip(state, user, ctx, multipart), fields(user_id = %user.id))]
pub async fn edit_product(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ctx: PageContext,
    multipart: Multipart,
) -> Result<Response> {
    let (form, image) = match read_product_form(multipart).await {
        Ok(parsed) => parsed,
        Err(e) => return Ok(e.into_response()),
    };

    let Some(id) = form
        .product_id
        .as_deref()
        .and_then(|raw| raw.parse::<ProductId>().ok())
    else {
        return Ok(Redirect::to("/").into_response());
    };

    let (valid, mut errors) = match form.validate() {
        Ok(valid) => (Some(valid), FieldErrors::new()),
        Err(errors) => (None, errors),
    };
    if matches!(image, PostedImage::Rejected) {
        errors.add("image", forms::PRODUCT_IMAGE_INVALID);
    }
    let Some(valid) = valid.filter(|_| errors.is_empty()) else {
        return Ok(form_page(ctx, true, form, errors));
    };

    let new_image = match &image {
        PostedImage::Valid(upload) => Some(state.images().save(upload).await?),
        PostedImage::Missing | PostedImage::Rejected => None,
    };

    let update = ProductUpdate {
        title: valid.title,
        price: valid.price,
        description: valid.description,
        image_path: new_image.clone(),
    };
    let previous_image = match ProductRepository::new(state.pool())
        .update_owned(id, user.id, &update)
        .await
    {
        Ok(previous) => previous,
        Err(e) => {
            if let Some(path) = &new_image {
                state.images().delete(path).await;
            }
            return Err(e.into());
        }
    };

    let Some(previous_image) = previous_image else {
        tracing::warn!(product_id = %id, "Edit of a product the user does not own");
        if let Some(path) = &new_image {
            state.images().delete(path).await;
        }
        return Ok(Redirect::to("/").into_response());
    };

    if new_image.as_deref().is_some_and(|path| path != previous_image) {
        state.images().delete(&previous_image).await;
    }

    tracing::info!(product_id = %id, "Product updated");
    Ok(Redirect::to("/admin/products").into_response())
}

/// `DELETE /admin/product/{id}`
///
/// Called from the admin product list; answers with JSON.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<String>,
) -> Response {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Product not found." })),
        )
            .into_response()
    };

    let Ok(id) = id.parse::<ProductId>() else {
        return not_found();
    };

    match ProductRepository::new(state.pool())
        .delete_owned(id, user.id)
        .await
    {
        Ok(Some(product)) => {
            state.images().delete(&product.image_path).await;
            tracing::info!(product_id = %id, "Product deleted");
            Json(json!({ "message": "success" })).into_response()
        }
        Ok(None) => not_found(),
        Err(e) => {
            tracing::error!(error = %e, product_id = %id, "Deleting product failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": "Deleting product failed" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_posted_image_missing_when_no_file_chosen() {
        assert!(matches!(
            posted_image(Some(""), Some("application/octet-stream"), Vec::new()),
            PostedImage::Missing
        ));
        assert!(matches!(posted_image(None, None, Vec::new()), PostedImage::Missing));
    }

    #[test]
    fn test_posted_image_rejects_non_images() {
        assert!(matches!(
            posted_image(Some("notes.txt"), Some("text/plain"), b"hello".to_vec()),
            PostedImage::Rejected
        ));
        assert!(matches!(
            posted_image(Some("empty.png"), Some("image/png"), Vec::new()),
            PostedImage::Rejected
        ));
    }

    #[test]
    fn test_posted_image_accepts_png() {
        let PostedImage::Valid(upload) =
            posted_image(Some("cup.png"), Some("image/PNG"), vec![0x89, b'P'])
        else {
            panic!("expected a valid image");
        };
        assert_eq!(upload.file_name, "cup.png");
        assert_eq!(upload.content_type, "image/png");
    }

    #[test]
    fn test_edit_form_renders_hidden_product_id() {
        let html = EditProductTemplate {
            ctx: PageContext::anonymous(),
            editing: true,
            error_message: None,
            errors: FieldErrors::new(),
            form: ProductForm {
                title: "Mug".to_string(),
                price: "12.50".to_string(),
                description: "Stoneware mug".to_string(),
                product_id: Some("9".to_string()),
            },
        }
        .render()
        .unwrap();

        assert!(html.contains(r#"action="/admin/edit-product""#));
        assert!(html.contains(r#"name="productId" value="9""#));
        assert!(html.contains("Update Product"));
        assert!(html.contains(r#"enctype="multipart/form-data""#));
    }

    #[test]
    fn test_add_form_shows_image_error() {
        let mut errors = FieldErrors::new();
        errors.add("image", forms::PRODUCT_IMAGE_INVALID);

        let html = EditProductTemplate {
            ctx: PageContext::anonymous(),
            editing: false,
            error_message: errors.first_message().map(str::to_string),
            errors,
            form: ProductForm::default(),
        }
        .render()
        .unwrap();

        assert!(html.contains("Attached file is not an image."));
        assert!(html.contains(r#"action="/admin/add-product""#));
        assert!(!html.contains("productId"));
    }
}
