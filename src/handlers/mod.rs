//! Route handlers for the panel's web pages and actions.
//!
//! Every handler checks the access gate first, then renders its body into a
//! `String` and hands it to the page composer so the declared length always
//! matches. Work that must outlive the response (restarts, remote updates) is
//! deferred through the context.

mod config;
mod files;
mod gpio;
mod pages;
mod update;

pub use update::APPLYING_UPDATE;

use crate::context::AppContext;
use crate::dispatcher::Handler;
use crate::error::RequestError;
use crate::page::html;
use crate::router::RouteTable;
use crate::server::Request;
use crate::settings::Subsystem;
use crate::upload::UPLOAD_SIZE_HEADER;
use http::Method;
use tracing::{debug, warn};

/// The full route table of the panel.
#[must_use]
pub fn route_table() -> RouteTable<Handler> {
    let mut t: RouteTable<Handler> = RouteTable::new();
    t.any("/about", "about", pages::about)
        .any("/config", "config_menu", config::menu)
        .any("/page/", "set_page", pages::set_page)
        .on("/list", Method::GET, "file_list", files::list)
        .any("/edit", "editor", files::editor)
        .on("/edit", Method::PUT, "file_create", files::create)
        .on("/edit", Method::DELETE, "file_delete", files::delete)
        .on("/edit", Method::POST, "file_upload", files::upload)
        .any("/", "root", pages::root)
        .any("/info", "info", pages::info)
        .any("/screenshot", "screenshot", pages::screenshot)
        .any("/firmware", "firmware", pages::firmware)
        .any("/reboot", "reboot", pages::reboot)
        .any("/config/hasp", "hasp_config", config::hasp)
        .any("/config/http", "http_config", config::http)
        .any("/config/gui", "gui_config", config::gui)
        .any("/config/debug", "debug_config", config::debug)
        .any("/config/mqtt", "mqtt_config", config::mqtt)
        .any("/config/wifi", "wifi_config", config::wifi)
        .any("/config/gpio", "gpio_config", gpio::list)
        .any("/config/gpio/options", "gpio_options", gpio::options)
        .any("/saveConfig", "save_config", config::save)
        .any("/resetConfig", "reset_config", config::reset)
        .on("/update", Method::POST, "firmware_upload", update::upload)
        .any("/espfirmware", "web_update", update::remote);
    t
}

/// A page body opened with the host name heading.
pub(crate) fn body_for(ctx: &AppContext) -> String {
    let mut body = String::with_capacity(crate::page::PAGE_BUFFER_SIZE);
    html::heading(&mut body, ctx.device.hostname());
    body
}

/// Apply a settings form posted with `save=<subsystem>`.
///
/// Only POST requests carry settings. Only the named subsystem changes;
/// saving `http` reloads the access gate and checks the request against the
/// new credential straight away.
///
/// # Errors
///
/// [`RequestError::AuthRequired`] when the new credential no longer matches
/// the one the request carries.
pub(crate) fn apply_posted_settings(
    ctx: &mut AppContext,
    req: &Request,
) -> Result<(), RequestError> {
    if req.method != Method::POST {
        return Ok(());
    }
    let Some(save) = req.arg("save") else {
        return Ok(());
    };
    let subsystem = match save.parse::<Subsystem>() {
        Ok(s) => s,
        Err(e) => {
            warn!(request_id = %req.id, error = %e, "unknown settings form");
            return Ok(());
        }
    };
    let posted = req.args.iter().map(|(k, v)| (k.as_str(), v.as_str()));
    let changed = match subsystem {
        Subsystem::Gui => {
            // Unchecked boxes are not posted at all.
            let cursor = if req.has_arg("cur") { "1" } else { "0" };
            let invert = if req.has_arg("inv") { "1" } else { "0" };
            let args = posted
                .filter(|(k, _)| *k != "cursor" && *k != "invert")
                .chain([("cursor", cursor), ("invert", invert)]);
            ctx.settings.apply(Subsystem::Gui, args)
        }
        Subsystem::Http => {
            let changed = ctx.settings.apply(Subsystem::Http, posted);
            ctx.gate.reload(&ctx.settings);
            ctx.gate.check(req, "config")?;
            changed
        }
        Subsystem::Gpio => {
            debug!("gpio slots are saved through /config/gpio");
            false
        }
        other => ctx.settings.apply(other, posted),
    };
    debug!(%subsystem, changed, "settings form applied");
    Ok(())
}

/// Total upload size the client announced in `X-Upload-Size`.
pub(crate) fn declared_upload_size(req: &Request) -> Option<u64> {
    req.header(UPLOAD_SIZE_HEADER)
        .and_then(|v| v.trim().parse().ok())
        .filter(|&n: &u64| n > 0)
}
