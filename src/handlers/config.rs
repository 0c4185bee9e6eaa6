use super::{apply_posted_settings, body_for};
use crate::context::AppContext;
use crate::error::RequestError;
use crate::page::html::{self, BACK_TO_CONFIG, MAIN_MENU_BUTTON};
use crate::server::{Request, Transport};
use crate::settings::{Subsystem, PASSWORD_MASK};
use std::time::Duration;
use tracing::{error, info, warn};

const SAVE_LABEL: &str = "Save Settings";

const ROTATIONS: [(i64, &str); 8] = [
    (0, "0 degrees"),
    (1, "90 degrees"),
    (2, "180 degrees"),
    (3, "270 degrees"),
    (6, "0 degrees - mirrored"),
    (7, "90 degrees - mirrored"),
    (4, "180 degrees - mirrored"),
    (5, "270 degrees - mirrored"),
];

const BACKLIGHT_PINS: [i64; 10] = [5, 12, 16, 17, 18, 19, 21, 22, 23, 32];

const BAUD_RATES: [(i64, &str); 7] = [
    (1, "Disabled"),
    (960, "9600"),
    (1920, "19200"),
    (3840, "38400"),
    (5760, "57600"),
    (7488, "74880"),
    (11520, "115200"),
];

const THEMES: [(i64, &str); 7] = [
    (2, "Hasp Dark"),
    (1, "Hasp Light"),
    (0, "Empty"),
    (3, "Mono"),
    (5, "Material Dark"),
    (4, "Material Light"),
    (7, "Template"),
];

fn masked(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        PASSWORD_MASK
    }
}

fn save_button(body: &mut String, subsystem: Subsystem) {
    body.push_str(&format!(
        "<p><button type='submit' name='save' value='{subsystem}'>{SAVE_LABEL}</button></p></form>"
    ));
}

fn back_to_config(body: &mut String) {
    html::form_button(body, BACK_TO_CONFIG, "/config", "");
}

pub(super) fn menu(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "config")?;
    apply_posted_settings(ctx, req)?;

    let mut body = body_for(ctx);
    for (label, action) in [
        ("Wifi Settings", "/config/wifi"),
        ("MQTT Settings", "/config/mqtt"),
        ("HTTP Settings", "/config/http"),
        ("Display Settings", "/config/gui"),
        ("GPIO Settings", "/config/gpio"),
        ("Debug Settings", "/config/debug"),
    ] {
        html::form_button(&mut body, label, action, "");
    }
    body.push_str("<p><form method='get' action='resetConfig'>");
    html::button(&mut body, "Factory Reset", "class='red'");
    body.push_str("</form>");
    body.push_str(MAIN_MENU_BUTTON);
    ctx.send_page(transport, &body, false)
}

pub(super) fn mqtt(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "config/mqtt")?;

    let s = &ctx.settings;
    let mut body = body_for(ctx);
    body.push_str("<form method='POST' action='/config'>");
    body.push_str(&format!(
        "<b>HASP Node Name</b> <i><small>(required. lowercase letters, numbers, and _ only)</small></i>\
         <input id='name' required name='name' maxlength=15 placeholder='HASP Node Name' \
         pattern='[a-z0-9_]*' value='{}'><br/><br/>",
        html::escape(&s.text(Subsystem::Mqtt, "name"))
    ));
    body.push_str(&format!(
        "<b>Group Name</b> <i><small>(required)</small></i><input id='group' required name='group' \
         maxlength=15 placeholder='Group Name' value='{}'><br/><br/>",
        html::escape(&s.text(Subsystem::Mqtt, "group"))
    ));
    body.push_str(&format!(
        "<b>MQTT Broker</b> <i><small>(required)</small></i><input id='host' required name='host' \
         maxlength=63 placeholder='mqttServer' value='{}'><br/>",
        html::escape(&s.text(Subsystem::Mqtt, "host"))
    ));
    body.push_str(&format!(
        "<b>MQTT Port</b> <i><small>(required)</small></i><input id='port' required name='port' \
         type='number' maxlength=5 placeholder='mqttPort' value='{}'><br/>",
        s.int(Subsystem::Mqtt, "port")
    ));
    body.push_str(&format!(
        "<b>MQTT User</b> <i><small>(optional)</small></i><input id='mqttUser' name='user' \
         maxlength=31 placeholder='user' value='{}'><br/>",
        html::escape(&s.text(Subsystem::Mqtt, "user"))
    ));
    body.push_str(&format!(
        "<b>MQTT Password</b> <i><small>(optional)</small></i><input id='pass' name='pass' \
         type='password' maxlength=31 placeholder='mqttPassword' value='{}'>",
        masked(&s.text(Subsystem::Mqtt, "pass"))
    ));
    save_button(&mut body, Subsystem::Mqtt);
    back_to_config(&mut body);
    ctx.send_page(transport, &body, false)
}

pub(super) fn gui(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "config/gui")?;

    let s = &ctx.settings;
    let mut body = body_for(ctx);
    body.push_str("<form method='POST' action='/config'>");
    html::number_input(&mut body, "idle1", "Short Idle", 0, 32400, s.int(Subsystem::Gui, "idle1"));
    html::number_input(&mut body, "idle2", "Long Idle", 0, 32400, s.int(Subsystem::Gui, "idle2"));

    let rotation = s.int(Subsystem::Gui, "rotate");
    body.push_str("<p><b>Orientation</b> <select id='rotate' name='rotate'>");
    for (value, label) in ROTATIONS {
        html::option(&mut body, value, label, rotation == value);
    }
    body.push_str("</select></p>");

    html::checkbox(&mut body, "inv", "Invert Colors", s.flag(Subsystem::Gui, "invert"));
    html::checkbox(&mut body, "cur", "Show Pointer", s.flag(Subsystem::Gui, "cursor"));

    let backlight = s.int(Subsystem::Gui, "bckl");
    body.push_str("<p><b>Backlight Control</b> <select id='bckl' name='bckl'>");
    html::option(&mut body, -1, "None", backlight == -1);
    for pin in BACKLIGHT_PINS {
        html::option(&mut body, pin, &format!("GPIO {pin}"), backlight == pin);
    }
    body.push_str("</select></p>");

    html::button(&mut body, SAVE_LABEL, "name='save' value='gui'");
    html::close_form(&mut body);
    back_to_config(&mut body);
    ctx.send_page(transport, &body, false)?;

    if let Some(action) = req.arg("action") {
        info!(action, "display action requested");
        ctx.device.dispatch_text(action);
    }
    Ok(())
}

pub(super) fn wifi(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "config/wifi")?;

    let s = &ctx.settings;
    let mut body = body_for(ctx);
    body.push_str(&format!(
        "<form method='POST' action='/config'><b>WiFi SSID</b> <i><small>(required)</small></i>\
         <input id='ssid' required name='ssid' maxlength=31 placeholder='WiFi SSID' value='{}'><br/>\
         <b>WiFi Password</b> <i><small>(required)</small></i><input id='pass' required name='pass' \
         type='password' maxlength=63 placeholder='WiFi Password' value='{}'>",
        html::escape(&s.text(Subsystem::Wifi, "ssid")),
        masked(&s.text(Subsystem::Wifi, "pass"))
    ));
    save_button(&mut body, Subsystem::Wifi);
    back_to_config(&mut body);
    ctx.send_page(transport, &body, false)
}

pub(super) fn http(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "config/http")?;

    let s = &ctx.settings;
    let mut body = body_for(ctx);
    body.push_str(&format!(
        "<form method='POST' action='/config'><b>Web Username</b> <i><small>(optional)</small></i>\
         <input id='user' name='user' maxlength=31 placeholder='admin' value='{}'><br/>\
         <b>Web Password</b> <i><small>(optional)</small></i><input id='pass' name='pass' \
         type='password' maxlength=63 placeholder='Password' value='{}'>",
        html::escape(&s.text(Subsystem::Http, "user")),
        masked(&s.text(Subsystem::Http, "pass"))
    ));
    save_button(&mut body, Subsystem::Http);
    back_to_config(&mut body);
    ctx.send_page(transport, &body, false)
}

pub(super) fn debug(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "config/debug")?;

    let s = &ctx.settings;
    let mut body = body_for(ctx);
    body.push_str("<form method='POST' action='/config'>");

    let baud = s.int(Subsystem::Debug, "baud");
    body.push_str("<p><b>Serial Port</b> <select id='baud' name='baud'>");
    for (value, label) in BAUD_RATES {
        html::option(&mut body, value, label, baud == value);
    }
    body.push_str(&format!(
        "</select></p><p><b>Telemetry Period</b> <i><small>(Seconds, 0=disable)</small></i> \
         <input id='teleperiod' required name='teleperiod' type='number' min='0' max='65535' \
         value='{}'></p>",
        s.int(Subsystem::Debug, "teleperiod")
    ));
    save_button(&mut body, Subsystem::Debug);
    back_to_config(&mut body);
    ctx.send_page(transport, &body, false)
}

pub(super) fn hasp(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "config/hasp")?;

    let s = &ctx.settings;
    let mut body = body_for(ctx);
    body.push_str(
        "<p><form action='/edit' method='post' enctype='multipart/form-data'>\
         <input type='file' name='filename' accept='.jsonl,.zi'>",
    );
    html::button(&mut body, "Upload File", "");
    body.push_str("</form></p><hr>");

    body.push_str(
        "<form method='POST' action='/'><p><b>UI Theme</b> <i><small>(required)</small></i>\
         <select id='theme' name='theme'>",
    );
    let theme = s.int(Subsystem::Hasp, "theme");
    for (value, label) in THEMES {
        html::option(&mut body, value, label, theme == value);
    }
    body.push_str(&format!(
        "</select></br><b>Hue</b><div style='width:100%;background-image:linear-gradient(to \
         right,red,orange,yellow,green,blue,indigo,violet);'><input \
         style='align:center;padding:0px;width:100%;' name='hue' type='range' min='0' max='360' \
         value='{}'></div></p>",
        s.int(Subsystem::Hasp, "hue")
    ));

    let font = s.text(Subsystem::Hasp, "font");
    body.push_str(
        "<p><b>Default Font</b><select id='font' name='font'><option value=''>None</option>",
    );
    for name in font_files(ctx) {
        html::option(&mut body, &name, &name, name == font);
    }
    body.push_str("</select></p>");

    body.push_str(&format!(
        "<p><b>Startup Layout</b> <i><small>(optional)</small></i><input id='pages' name='pages' \
         maxlength=31 placeholder='/pages.jsonl' value='{}'></br>\
         <b>Startup Page</b> <i><small>(required)</small></i><input id='startpage' required \
         name='startpage' type='number' min='1' max='{}' value='{}'></p>\
         <p><b>Startup Brightness</b> <i><small>(required)</small></i><input id='startdim' required \
         name='startdim' type='number' min='0' max='100' value='{}'></p>",
        html::escape(&s.text(Subsystem::Hasp, "pages")),
        crate::device::PAGE_COUNT,
        s.int(Subsystem::Hasp, "startpage"),
        s.int(Subsystem::Hasp, "startdim")
    ));
    save_button(&mut body, Subsystem::Hasp);
    body.push_str(MAIN_MENU_BUTTON);
    ctx.send_page(transport, &body, false)
}

/// Font files (`*.zi`) in the root of the data directory, sorted.
fn font_files(ctx: &AppContext) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(ctx.files.base_dir()) else {
        return Vec::new();
    };
    let mut fonts: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.ends_with(".zi"))
        .map(|name| format!("/{name}"))
        .collect();
    fonts.sort();
    fonts
}

/// Persist the in-memory settings.
pub(super) fn save(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "saveConfig")?;

    let mut body = body_for(ctx);
    match ctx.save_settings() {
        Ok(()) => body.push_str("<b>Settings saved</b>"),
        Err(e) => {
            error!(error = %e, "settings not saved");
            body.push_str(&format!("<b>Saving settings failed</b><br/>{}", html::escape(&e.to_string())));
        }
    }
    body.push_str(MAIN_MENU_BUTTON);
    ctx.send_page(transport, &body, false)
}

pub(super) fn reset(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "resetConfig")?;

    let mut confirmed = req.arg("confirm") == Some("yes");
    let mut body = body_for(ctx);
    if confirmed {
        match ctx.settings.clear() {
            Ok(()) => {
                ctx.gate.reload(&ctx.settings);
                body.push_str("<b>Resetting all saved settings and restarting device</b>");
            }
            Err(e) => {
                error!(error = %e, "factory reset failed");
                body.push_str("<b>Failed to format the internal flash partition</b>");
                confirmed = false;
            }
        }
    } else {
        body.push_str(
            "<h2>Warning</h2><b>This process will reset all settings to the default values. \
             The internal flash will be erased and the device is restarted. You may need to \
             connect to the WiFi AP displayed on the panel to re-configure the device before \
             accessing it again. ALL FILES WILL BE LOST!<br/><hr><br/>\
             <form method='get' action='resetConfig'><br/><br/>\
             <button type='submit' name='confirm' value='yes'>Erase device</button></form>\
             <br/><hr><br/>",
        );
        back_to_config(&mut body);
    }
    ctx.send_page(transport, &body, confirmed)?;

    if confirmed {
        warn!(request_id = %req.id, "factory reset, restarting without saving");
        ctx.defer_restart(false, Duration::from_millis(ctx.config.restart_grace_ms));
    }
    Ok(())
}
