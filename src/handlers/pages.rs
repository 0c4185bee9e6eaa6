use super::{apply_posted_settings, body_for};
use crate::context::AppContext;
use crate::device::PAGE_COUNT;
use crate::error::RequestError;
use crate::page::html::{self, format_bytes, format_uptime, MAIN_MENU_BUTTON};
use crate::screenshot::send_screenshot;
use crate::server::{Request, Transport};
use std::time::Duration;
use tracing::{debug, info};

const MIT_LICENSE: &str = "</br>MIT License</p>";
const REBOOT_GRACE: Duration = Duration::from_millis(200);

pub(super) fn root(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "root")?;
    apply_posted_settings(ctx, req)?;

    let mut body = body_for(ctx);
    html::form_button(&mut body, "HASP Design", "/config/hasp", "");
    html::form_button(&mut body, "Screenshot", "screenshot", "");
    html::form_button(&mut body, "Information", "info", "");
    html::form_button(&mut body, "Configuration", "/config", "");
    html::form_button(&mut body, "Firmware Upgrade", "firmware", "");
    if ctx.files.base_dir().join("edit.htm.gz").is_file() {
        html::form_button(&mut body, "File Browser", "edit.htm.gz?path=/", "");
    }
    html::form_button(&mut body, "Restart", "reboot", "class='red'");
    ctx.send_page(transport, &body, false)
}

pub(super) fn about(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "about")?;

    let mut body = String::new();
    body.push_str(&format!(
        "<p><h3>panelweb</h3>Web front-end for HASP display panels, version {}{MIT_LICENSE}",
        ctx.device.version()
    ));
    body.push_str("<p>Based on the work of the following open source developers.</p><hr>");
    for (project, holder) in [
        ("HASP OpenHardware edition", "2020 Francis Van Roie"),
        ("HASwitchPlate", "2019 Allen Derusha"),
        ("LittlevGL", "2016 G&aacute;bor Kiss-V&aacute;mosi"),
        ("ArduinoJson", "2014-2020 Benoit BLANCHON"),
        ("PubSubClient", "2008-2015 Nicholas O'Leary"),
        ("AceButton", "2018 Brian T. Park"),
    ] {
        body.push_str(&format!("<p><h3>{project}</h3>Copyright&copy; {holder}{MIT_LICENSE}"));
    }
    body.push_str(MAIN_MENU_BUTTON);
    ctx.send_page(transport, &body, false)
}

pub(super) fn info(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "info")?;

    let device = &ctx.device;
    let mut body = body_for(ctx);
    body.push_str(&format!(
        "<b>HASP Version: </b>{}<br/><b>Uptime: </b>{}",
        html::escape(device.version()),
        format_uptime(device.uptime().as_secs())
    ));
    body.push_str(&format!(
        "<br/><b>Memory In Use: </b>{}",
        device
            .memory_in_use()
            .map_or_else(|| "unknown".to_string(), format_bytes)
    ));
    let (width, height) = device.screen_size();
    body.push_str(&format!(
        "</p/><p><b>LCD Resolution: </b>{width} x {height}<br/><b>LCD Active Page: </b>{}",
        device.page()
    ));

    let image = &ctx.config.firmware.image;
    let program_size = std::fs::metadata(image).map(|m| m.len()).unwrap_or(0);
    body.push_str(&format!(
        "</p/><p><b>Program Size: </b>{}<br/><b>Free Program Space: </b>{}",
        format_bytes(program_size),
        format_bytes(ctx.config.firmware.capacity)
    ));
    let progress = ctx.progress.snapshot();
    if !progress.message.is_empty() {
        body.push_str(&format!(
            "<br/><b>Last Update: </b>{}",
            html::escape(&progress.message)
        ));
    }
    body.push_str(MAIN_MENU_BUTTON);
    ctx.send_page(transport, &body, false)
}

pub(super) fn firmware(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "firmware")?;

    let mut body = body_for(ctx);
    body.push_str(
        "<p><form action='/update' method='post' enctype='multipart/form-data'>\
         <input type='file' name='filename' accept='.bin'>",
    );
    html::button(&mut body, "Update Firmware", "");
    body.push_str("</form></p>");
    body.push_str(
        "<form method='get' action='/espfirmware'><br/><b>Update ESP from URL</b>\
         <br/><input id='url' name='url' value=''><br/><br/>\
         <button type='submit'>Update ESP from URL</button></form>",
    );
    body.push_str(MAIN_MENU_BUTTON);
    ctx.send_page(transport, &body, false)
}

pub(super) fn reboot(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "reboot")?;

    let mut body = body_for(ctx);
    body.push_str("<b>Rebooting device, please wait...</b>");
    ctx.send_page(transport, &body, true)?;
    info!(request_id = %req.id, "restart requested");
    ctx.defer_restart(true, REBOOT_GRACE);
    Ok(())
}

pub(super) fn screenshot(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "screenshot")?;

    match req.arg("a") {
        Some("next") => ctx.device.next_page(),
        Some("prev") => ctx.device.prev_page(),
        _ => {}
    }

    if req.has_arg("q") {
        send_screenshot(ctx.device.as_ref(), transport)?;
        return Ok(());
    }

    let mut body = body_for(ctx);
    body.push_str(
        "<script>function aref(t){setTimeout(function() {ref('');}, t*1000)} \
         function ref(a){ var t=new Date().getTime();\
         document.getElementById('bmp').src='?a='+a+'&q='+t;return false;}</script>",
    );
    body.push_str(
        "<p class='c'><img id='bmp' src='?q=0' onload=\"aref(5)\" onerror=\"aref(5)\"/></p>",
    );
    for (label, target) in [("Refresh", "''"), ("Prev Page", "'prev'"), ("Next Page", "'next'")] {
        body.push_str(&format!(
            "<p><form method='get' onsubmit=\"return ref({target});\">\
             <button type='submit'>{label}</button></form></p>"
        ));
    }
    body.push_str(MAIN_MENU_BUTTON);
    ctx.send_page(transport, &body, false)
}

/// `/page/?page=N` switches the panel page and echoes the argument.
pub(super) fn set_page(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "page")?;

    let raw = req.arg("page").unwrap_or("");
    transport.send(200, "text/plain", format!("Page: '{raw}'").as_bytes())?;
    match raw.trim().parse::<u8>() {
        Ok(page) if (1..=PAGE_COUNT).contains(&page) => ctx.device.set_page(page),
        _ => debug!(page = raw, "page out of range, ignored"),
    }
    Ok(())
}
