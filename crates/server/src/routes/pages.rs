//! Guarded organization pages.
//!
//! Every page request is run through the route guard: the response is either
//! the page shell of the requested page, a redirect to the page the guard
//! sends the visitor to, or the not-found page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use tracing::debug;
use wifi_login_core::links::{Link, visible_links};
use wifi_login_core::portal::UserSession;
use wifi_login_core::{ClientConfig, ConfigValue, Page, PortalState, Route, RouteDecision};

use crate::error::Result;
use crate::middleware::PortalSession;
use crate::routes::portal::{finish, mount};
use crate::state::AppState;

const DEFAULT_LANGUAGE: &str = "en";

// =============================================================================
// Templates
// =============================================================================

/// A visible header or footer link.
#[derive(Debug, Clone)]
pub struct LinkView {
    pub url: String,
    pub text: String,
}

/// A button of the server-rendered page: a form posting `fields` to
/// `action`, or a plain link when `method` is `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAction {
    pub method: &'static str,
    pub action: String,
    pub label: &'static str,
    pub fields: Vec<(&'static str, &'static str)>,
}

impl PageAction {
    fn post(action: String, label: &'static str) -> Self {
        Self {
            method: "post",
            action,
            label,
            fields: Vec::new(),
        }
    }

    fn with_field(mut self, name: &'static str, value: &'static str) -> Self {
        self.fields.push((name, value));
        self
    }
}

/// Page shell of an organization page.
#[derive(Template, WebTemplate)]
#[template(path = "shell.html")]
pub struct ShellTemplate {
    pub title: String,
    pub language: String,
    pub slug: String,
    pub page_name: &'static str,
    pub css: Vec<String>,
    pub js: Vec<String>,
    pub favicon: Option<String>,
    pub header_links: Vec<LinkView>,
    pub footer_links: Vec<LinkView>,
    pub actions: Vec<PageAction>,
    /// Payment gateway shown in an iframe on the payment process page.
    pub payment_frame: Option<String>,
    /// JSON handed to the page scripts.
    pub state_json: String,
}

/// Not-found page.
#[derive(Template, WebTemplate)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub title: String,
    pub language: String,
    /// Login page of the organization, when it exists.
    pub home: Option<String>,
}

/// State handed to the page scripts.
#[derive(Serialize)]
struct ShellState<'a> {
    page: &'static str,
    organization: &'a ClientConfig,
    session: &'a UserSession,
}

impl ShellTemplate {
    fn new(configuration: &ClientConfig, portal: &PortalState, page: &Page) -> Self {
        let slug = configuration.slug.as_str();
        let language = configuration
            .get_path(&["default_language"])
            .and_then(ConfigValue::as_str)
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_string();

        let mut css = string_list(configuration, "css");
        if let Some(path) = configuration.get_path(&["css_path"]).and_then(ConfigValue::as_str) {
            css.push(path.to_string());
        }

        let state = ShellState {
            page: page.name(),
            organization: configuration,
            session: portal.session(),
        };

        Self {
            title: configuration.name.clone(),
            slug: slug.to_string(),
            page_name: page.name(),
            css: css.iter().map(|file| asset_path(slug, file)).collect(),
            js: string_list(configuration, "js")
                .iter()
                .map(|file| asset_path(slug, file))
                .collect(),
            favicon: configuration
                .get_path(&["favicon"])
                .and_then(ConfigValue::as_str)
                .map(|file| asset_path(slug, file)),
            header_links: links(configuration, portal, "header", &language),
            footer_links: links(configuration, portal, "footer", &language),
            actions: actions(page, portal, slug),
            payment_frame: match page {
                Page::PaymentProcess => portal.session().user_data.payment_url.clone(),
                _ => None,
            },
            state_json: serde_json::to_string(&state).unwrap_or_default(),
            language,
        }
    }
}

fn not_found(home: Option<String>) -> Response {
    let page = NotFoundTemplate {
        title: "404".to_string(),
        language: DEFAULT_LANGUAGE.to_string(),
        home,
    };
    (StatusCode::NOT_FOUND, page).into_response()
}

/// Public URL of an organization asset.
fn asset_path(slug: &str, file: &str) -> String {
    if file.starts_with("http://") || file.starts_with("https://") || file.starts_with('/') {
        return file.to_string();
    }
    format!("/assets/{slug}/{file}")
}

fn string_list(configuration: &ClientConfig, key: &str) -> Vec<String> {
    match configuration.get_path(&[key]) {
        Some(ConfigValue::Sequence(items)) => items
            .iter()
            .filter_map(ConfigValue::as_str)
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Buttons of pages that work without the page scripts.
fn actions(page: &Page, portal: &PortalState, slug: &str) -> Vec<PageAction> {
    let logout = format!("/{slug}/logout");
    match page {
        Page::Status if portal.remembered() => vec![
            PageAction::post(logout.clone(), "Log out, keep me signed in")
                .with_field("user_auto_login", "true"),
            PageAction::post(logout, "Log out").with_field("user_auto_login", "false"),
        ],
        Page::Status => {
            vec![PageAction::post(logout, "Log out").with_field("user_auto_login", "false")]
        }
        Page::Logout => vec![PageAction::post(format!("/{slug}/login-again"), "Login again")],
        Page::PaymentStatus { .. } => vec![
            PageAction {
                method: "get",
                action: format!("/{slug}/status"),
                label: "Try again",
                fields: Vec::new(),
            },
            PageAction::post(logout, "Give up").with_field("user_auto_login", "false"),
        ],
        _ => Vec::new(),
    }
}

/// Visible links of the `component` (header or footer) of a configuration.
fn links(
    configuration: &ClientConfig,
    portal: &PortalState,
    component: &str,
    language: &str,
) -> Vec<LinkView> {
    let configured: Vec<Link> = configuration
        .get_path(&["components", component, "links"])
        .and_then(|value| serde_json::to_value(value).ok())
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();

    let session = portal.session();
    visible_links(&configured, session.is_authenticated, &session.user_data)
        .map(|link| LinkView {
            url: link.url.clone(),
            text: link.text_for(language).to_string(),
        })
        .collect()
}

// =============================================================================
// Handlers
// =============================================================================

/// Redirect `/` to the first organization.
pub async fn root(State(state): State<AppState>) -> Response {
    match state.registry().catalog().first() {
        Some(slug) => Redirect::to(&format!("/{slug}/")).into_response(),
        None => not_found(None),
    }
}

/// `GET /{org}` and `GET /{org}/`.
///
/// # Errors
///
/// See [`guarded`].
pub async fn index(
    State(state): State<AppState>,
    Path(org): Path<String>,
    session: PortalSession,
) -> Result<Response> {
    guarded(&state, &session, &org, "").await
}

/// `GET /{org}/{*page}`.
///
/// # Errors
///
/// See [`guarded`].
pub async fn page(
    State(state): State<AppState>,
    Path((org, page)): Path<(String, String)>,
    session: PortalSession,
) -> Result<Response> {
    guarded(&state, &session, &org, &page).await
}

/// `GET /{org}/logout`.
///
/// # Errors
///
/// See [`guarded`].
pub async fn logout_page(
    State(state): State<AppState>,
    Path(org): Path<String>,
    session: PortalSession,
) -> Result<Response> {
    guarded(&state, &session, &org, "logout").await
}

/// Renders `path` of organization `org` or redirects where the guard says.
///
/// # Errors
///
/// Returns an error if the session cannot be loaded or written, or the
/// account API is unreachable while refreshing the user record.
async fn guarded(state: &AppState, session: &PortalSession, org: &str, path: &str) -> Result<Response> {
    let Some(organization) = state.registry().get(org) else {
        debug!(org, "Organization not found");
        return Ok(not_found(None));
    };

    let mounted = mount(state, session, organization).await?;
    let decision = mounted.portal.decide(&Route::parse(path));
    debug!(org, path, ?decision, "Route decision");

    let slug = &organization.client.slug;
    let response = match decision {
        RouteDecision::Render(Page::PaymentProcess) if !mounted.portal.settings().payment_iframe => {
            let payment_url = mounted.portal.session().user_data.payment_url.as_deref();
            Redirect::to(payment_url.unwrap_or("/")).into_response()
        }
        RouteDecision::Render(page) => {
            ShellTemplate::new(&organization.client, &mounted.portal, &page).into_response()
        }
        RouteDecision::Redirect(page) => Redirect::to(&page.location(slug)).into_response(),
        RouteDecision::NotFound => not_found(Some(Page::Login.location(slug))),
        RouteDecision::Loading => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    };

    let cookies = finish(session, mounted).await?;
    Ok((cookies, response).into_response())
}
