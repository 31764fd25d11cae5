use super::handlers::{health, lookup, pin, reset, session, types};
use crate::credentials::{
    store::Room, validator::StudentProfile, LookupResult, PinStatus, SessionProfile,
};
use utoipa::{
    openapi::{
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        Contact, InfoBuilder, License, Tag,
    },
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        lookup::lookup,
        pin::set_pin,
        pin::login,
        session::session,
        reset::reset_pin,
    ),
    components(schemas(
        health::Health,
        types::LookupRequest,
        types::PinRequest,
        types::SessionTokenResponse,
        types::ResetPinRequest,
        types::OkResponse,
        types::ErrorResponse,
        LookupResult,
        PinStatus,
        SessionProfile,
        StudentProfile,
        Room,
    )),
    modifiers(&BearerAuth)
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut spec = ApiDoc::openapi();
    spec.info = cargo_info();

    let mut student_tag = Tag::new("student-auth");
    student_tag.description = Some("Student lookup, PIN set, PIN login and sessions".to_string());

    let mut students_tag = Tag::new("students");
    students_tag.description = Some("Teacher and admin operations on student credentials".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Service and database health".to_string());

    spec.tags = Some(vec![student_tag, students_tag, health_tag]);
    spec
}

fn cargo_info() -> utoipa::openapi::Info {
    // Use Cargo.toml metadata so the document tracks the package version.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();
    info
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

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    let Some(start) = author.find('<') else {
        let name = author.trim();
        return (if name.is_empty() { None } else { Some(name) }, None);
    };
    let name = author[..start].trim();
    let email = author[start + 1..].trim_end_matches('>').trim();
    (
        if name.is_empty() { None } else { Some(name) },
        if email.is_empty() { None } else { Some(email) },
    )
}
