use crate::application::error::{ErrorReport, HttpError};
use crate::application::site::SiteView;
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

pub const SITE_NOT_FOUND_MESSAGE: &str =
    "Este site romântico não foi encontrado ou não está publicado.";
pub const SITE_ERROR_MESSAGE: &str = "Erro interno do servidor";

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Template)]
#[template(path = "site.html")]
pub struct SiteTemplate {
    pub view: SiteView,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub message: String,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub message: String,
}

pub fn render_site_response(view: SiteView) -> Response {
    render_template_response(SiteTemplate { view }, StatusCode::OK)
}

pub fn render_not_found_response(message: &str) -> Response {
    let mut response = render_template_response(
        NotFoundTemplate {
            message: message.to_string(),
        },
        StatusCode::NOT_FOUND,
    );
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        message,
    )
    .attach(&mut response);
    response
}

/// Error page for a failed render; `report` carries the cause to the response log.
pub fn render_error_response(report: ErrorReport) -> Response {
    let mut response = render_template_response(
        ErrorTemplate {
            message: SITE_ERROR_MESSAGE.to_string(),
        },
        StatusCode::INTERNAL_SERVER_ERROR,
    );
    report.attach(&mut response);
    response
}
