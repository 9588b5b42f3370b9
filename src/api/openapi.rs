use super::handlers::{auth, health, signup, users};
use axum::middleware;
use utoipa::openapi::{
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Components, Contact, InfoBuilder, License, OpenApiBuilder, Tag,
};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Public routes go in `public`; routes that need a bearer access token go in
/// `guarded`, which is wrapped by the admission gate before the two are merged.
pub(crate) fn api_router() -> OpenApiRouter {
    let public = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(signup::request_signup))
        .routes(routes!(signup::check_signup))
        .routes(routes!(signup::create_account))
        .routes(routes!(auth::session::login))
        .routes(routes!(auth::session::refresh));

    let guarded = OpenApiRouter::new()
        .routes(routes!(signup::list_signups))
        .routes(routes!(signup::decide_signup))
        .routes(routes!(auth::session::me))
        .routes(routes!(auth::session::logout))
        .routes(routes!(users::list_users, users::create_admin))
        .routes(routes!(users::get_user))
        .route_layer(middleware::from_fn(auth::require_auth));

    let mut router = public.merge(guarded);

    let mut signup_tag = Tag::new("signup");
    signup_tag.description = Some("Sign-up requests and account creation".to_string());

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Login, token refresh and logout".to_string());

    let mut users_tag = Tag::new("users");
    users_tag.description = Some("Owner-side user administration".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and database status".to_string());

    let openapi = router.get_openapi_mut();
    openapi.tags = Some(vec![signup_tag, auth_tag, users_tag, health_tag]);
    openapi
        .components
        .get_or_insert_with(Components::default)
        .add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );

    router
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (
            non_empty(name.trim()),
            non_empty(email.trim_end_matches('>').trim()),
        ),
        None => (non_empty(author.trim()), None),
    }
}
