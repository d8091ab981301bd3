use super::handlers::{auth, health, tasks};
use crate::auth::guard::{require_admin, require_authenticated};
use axum::middleware;
use utoipa::openapi::{
    security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Components, Contact, InfoBuilder, License, OpenApiBuilder, Tag,
};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Routes are grouped by gate: public, authenticated, and authenticated plus
/// admin. The gates are route layers, so they only wrap the routes of their
/// own group.
pub(crate) fn api_router() -> OpenApiRouter {
    let public = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::register))
        .routes(routes!(auth::login));

    let authenticated = OpenApiRouter::new()
        .routes(routes!(tasks::list_tasks))
        .routes(routes!(tasks::get_task))
        .route_layer(middleware::from_fn(require_authenticated));

    // Layers run outside-in: authentication wraps the admin check.
    let admin = OpenApiRouter::new()
        .routes(routes!(tasks::create_task))
        .routes(routes!(tasks::update_task))
        .routes(routes!(tasks::delete_task))
        .routes(routes!(auth::promote))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn(require_authenticated));

    let mut router = public.merge(authenticated).merge(admin);

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service and store health".to_string());

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Registration, login and role promotion".to_string());

    let mut tasks_tag = Tag::new("tasks");
    tasks_tag.description = Some("Task records".to_string());

    let openapi = router.get_openapi_mut();
    openapi.tags = Some(vec![health_tag, auth_tag, tasks_tag]);
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

fn optional_str(value: &str) -> Option<&str> {
    Some(value.trim()).filter(|value| !value.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => (optional_str(name), optional_str(email.trim_end_matches('>'))),
        None => (optional_str(author), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Taskgate"));
            assert_eq!(contact.email.as_deref(), Some("team@taskgate.dev"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.name, env!("CARGO_PKG_LICENSE"));
        }
    }

    #[test]
    fn every_route_is_documented() {
        let spec = openapi();
        for path in [
            "/health",
            "/register",
            "/login",
            "/tasks",
            "/tasks/{id}",
            "/promote/{username}",
        ] {
            assert!(spec.paths.paths.contains_key(path), "{path} missing");
        }

        let tasks = spec.paths.paths.get("/tasks");
        assert!(tasks.is_some_and(|item| item.get.is_some() && item.post.is_some()));

        let task = spec.paths.paths.get("/tasks/{id}");
        assert!(task.is_some_and(|item| {
            item.get.is_some() && item.put.is_some() && item.delete.is_some()
        }));
    }

    #[test]
    fn health_returns_a_single_object() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(openapi())?;
        let responses = &value["paths"]["/health"]["get"]["responses"];
        for status in ["200", "503"] {
            let schema = &responses[status]["content"]["application/json"]["schema"];
            assert_eq!(schema["$ref"], "#/components/schemas/Health", "{status}");
        }

        let list = &value["paths"]["/tasks"]["get"]["responses"]["200"]["content"]
            ["application/json"]["schema"];
        assert_eq!(list["type"], "array");
        Ok(())
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let spec = openapi();
        let schemes = spec
            .components
            .map(|components| components.security_schemes)
            .unwrap_or_default();
        assert!(schemes.contains_key("bearer"));
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Jane Doe <jane@example.com>"),
            (Some("Jane Doe"), Some("jane@example.com"))
        );
        assert_eq!(parse_author("Jane Doe"), (Some("Jane Doe"), None));
        assert_eq!(parse_author("<jane@example.com>"), (None, Some("jane@example.com")));
    }
}
