//! The setup web page served while the device is its own access point.

use std::sync::Arc;

use axum::{
    extract::{rejection::FormRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use log::{debug, error, info, warn};
use serde::Deserialize;
use tokio::sync::Notify;

use super::{
    credentials::{self, NetworkCredentials},
    html_escape,
    system::NetworkControl,
};
use crate::{config::ProvisioningConfig, error::MalformedSubmission};

/// Value of the select option that reveals the free-text network name.
const MANUAL_ENTRY: &str = "manual";

pub struct SetupState<N> {
    network: Arc<N>,
    config: Arc<ProvisioningConfig>,
    completed: Arc<Notify>,
}

impl<N> Clone for SetupState<N> {
    fn clone(&self) -> Self {
        Self {
            network: self.network.clone(),
            config: self.config.clone(),
            completed: self.completed.clone(),
        }
    }
}

impl<N: NetworkControl> SetupState<N> {
    /// `completed` is notified once a record has been written.
    pub fn new(network: Arc<N>, config: ProvisioningConfig, completed: Arc<Notify>) -> Self {
        Self {
            network,
            config: Arc::new(config),
            completed,
        }
    }
}

pub fn router<N: NetworkControl>(state: SetupState<N>) -> Router {
    Router::new()
        .route("/", get(setup_page::<N>))
        .route("/setup", get(setup_page::<N>).post(submit::<N>))
        .fallback(not_found)
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct SetupForm {
    ssid: Option<String>,
    password: Option<String>,
    #[serde(rename = "manual-ssid")]
    manual_ssid: Option<String>,
}

impl SetupForm {
    pub fn into_credentials(self) -> Result<NetworkCredentials, MalformedSubmission> {
        let ssid = match self.ssid.as_deref() {
            Some(MANUAL_ENTRY) => self.manual_ssid,
            _ => self.ssid,
        };

        NetworkCredentials::new(
            ssid.ok_or(MalformedSubmission::MissingSsid)?,
            self.password.ok_or(MalformedSubmission::MissingPassword)?,
        )
    }
}

async fn setup_page<N: NetworkControl>(State(state): State<SetupState<N>>) -> Html<String> {
    Html(render_form(&scan(&state).await, None))
}

async fn submit<N: NetworkControl>(
    State(state): State<SetupState<N>>,
    form: Result<Form<SetupForm>, FormRejection>,
) -> Response {
    let submitted = form
        .map_err(|rejection| {
            debug!("Unreadable setup submission: {}", rejection);
            MalformedSubmission::Unreadable
        })
        .and_then(|Form(form)| form.into_credentials());

    let credentials = match submitted {
        Ok(credentials) => credentials,
        Err(e) => {
            warn!("Rejected setup submission: {}", e);
            let page = render_form(&scan(&state).await, Some(&e.to_string()));
            return (StatusCode::BAD_REQUEST, Html(page)).into_response();
        }
    };

    let path = state.config.credentials_path.clone();
    let country = state.config.country.clone();
    let record = credentials.clone();
    let written = tokio::task::spawn_blocking(move || {
        credentials::write_record(&path, &record, &country)
    })
    .await;

    match written {
        Ok(Ok(())) => {
            info!("Wi-Fi configured for '{}'", credentials.ssid());
            state.completed.notify_one();
            Html(render_success(&state.config.scale_url)).into_response()
        }
        Ok(Err(e)) => {
            error!("Failed to store credentials: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_form(&[], Some("Could not save the settings, please try again"))),
            )
                .into_response()
        }
        Err(e) => {
            error!("Credential writer task failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Html("<html><body><h1>404 Not Found</h1></body></html>"),
    )
}

/// A failed scan still renders the page, with only manual entry offered.
async fn scan<N: NetworkControl>(state: &SetupState<N>) -> Vec<String> {
    let network = state.network.clone();
    match tokio::task::spawn_blocking(move || network.scan_networks()).await {
        Ok(Ok(networks)) => networks,
        Ok(Err(e)) => {
            warn!("Wi-Fi scan failed: {}", e);
            Vec::new()
        }
        Err(e) => {
            warn!("Wi-Fi scan task failed: {}", e);
            Vec::new()
        }
    }
}

const STYLE: &str = "body { font-family: -apple-system, sans-serif; margin: 0; padding: 20px; }\
h1 { text-align: center; margin-bottom: 30px; }\
form { max-width: 400px; margin: 0 auto; padding: 20px; border-radius: 12px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }\
label { display: block; margin-bottom: 5px; font-weight: 500; }\
select, input { width: 100%; padding: 12px; margin-bottom: 20px; border: 1px solid #d2d2d7; border-radius: 8px; font-size: 16px; }\
button { background: #0071e3; color: white; border: none; padding: 12px 0; width: 100%; font-size: 16px; border-radius: 8px; }\
.notice { color: #c00; text-align: center; }";

const TOGGLE_SCRIPT: &str = "document.getElementById('ssid').addEventListener('change', function() {\
document.getElementById('manual-ssid').style.display = this.value === 'manual' ? 'block' : 'none';\
});";

pub fn render_form(networks: &[String], notice: Option<&str>) -> String {
    let mut page = format!(
        "<html><head><title>Fluid Scale Wi-Fi Setup</title>\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <style>{STYLE}</style></head><body>\
         <h1>Fluid Scale<br>Wi-Fi Setup</h1>"
    );

    if let Some(notice) = notice {
        page.push_str(&format!("<p class=\"notice\">{}</p>", html_escape(notice)));
    }

    page.push_str(
        "<form action=\"/setup\" method=\"post\">\
         <label for=\"ssid\">Select Wi-Fi Network:</label>\
         <select name=\"ssid\" id=\"ssid\">",
    );
    for network in networks {
        let network = html_escape(network);
        page.push_str(&format!("<option value=\"{network}\">{network}</option>"));
    }
    page.push_str(&format!(
        "<option value=\"{MANUAL_ENTRY}\">Enter manually...</option></select>\
         <div id=\"manual-ssid\" style=\"display:{};\">\
         <label for=\"manual-ssid-input\">Network Name (SSID):</label>\
         <input type=\"text\" id=\"manual-ssid-input\" name=\"manual-ssid\"></div>\
         <label for=\"password\">Wi-Fi Password:</label>\
         <input type=\"password\" name=\"password\" id=\"password\">\
         <button type=\"submit\">Connect</button></form>\
         <script>{TOGGLE_SCRIPT}</script></body></html>",
        if networks.is_empty() { "block" } else { "none" },
    ));
    page
}

pub fn render_success(scale_url: &str) -> String {
    let url = html_escape(scale_url);
    format!(
        "<html><head><meta http-equiv=\"refresh\" content=\"10;url={url}\"></head>\
         <body><h1>Wi-Fi Setup Complete!</h1>\
         <p>Your device will now connect to your Wi-Fi network.</p>\
         <p>Please reconnect to your regular Wi-Fi network.</p>\
         <p>The fluid scale will be available at: <a href=\"{url}\">{url}</a></p>\
         </body></html>"
    )
}
