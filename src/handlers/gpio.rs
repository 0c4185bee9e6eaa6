use super::body_for;
use crate::context::AppContext;
use crate::error::RequestError;
use crate::page::html;
use crate::server::{Request, Transport};
use crate::settings::{gpio_kind, GpioSlot, GPIO_SLOTS};
use tracing::{info, warn};

/// Pins reserved for the display, touch and flash buses.
const SYSTEM_PINS: [u8; 9] = [1, 3, 6, 7, 8, 9, 10, 11, 14];
const PIN_COUNT: u8 = 40;

const KIND_OPTIONS: [(u8, &str); 8] = [
    (gpio_kind::SWITCH, "Switch"),
    (gpio_kind::BUTTON, "Button"),
    (gpio_kind::LED, "Led"),
    (gpio_kind::LED_R, "Mood Red"),
    (gpio_kind::LED_G, "Mood Green"),
    (gpio_kind::LED_B, "Mood Blue"),
    (gpio_kind::RELAY, "Relay"),
    (gpio_kind::PWM, "PWM"),
];

fn clamp_u8(value: i64) -> u8 {
    value.clamp(0, i64::from(u8::MAX)) as u8
}

fn slot_id(req: &Request) -> Result<usize, RequestError> {
    let raw = req.arg("id").ok_or(RequestError::BadRequest("BAD ARGS"))?;
    match raw.trim().parse::<usize>() {
        Ok(id) if id < GPIO_SLOTS => Ok(id),
        _ => Err(RequestError::BadRequest("BAD ARGS")),
    }
}

/// `/config/gpio`: saves or frees a slot when asked, then lists the slots.
pub(super) fn list(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "config/gpio")?;

    if req.has_arg("save") {
        let id = slot_id(req)?;
        let slot = GpioSlot {
            pin: clamp_u8(req.arg_int("pin")),
            kind: clamp_u8(req.arg_int("type") + req.arg_int("state")),
            group: clamp_u8(req.arg_int("group")),
            func: clamp_u8(req.arg_int("func")),
        };
        ctx.settings.set_gpio_slot(id, slot);
        info!(id, pin = slot.pin, kind = slot.kind_name(), "gpio slot saved");
    }
    if req.has_arg("del") {
        let id = slot_id(req)?;
        let pin = clamp_u8(req.arg_int("pin"));
        ctx.settings.set_gpio_slot(
            id,
            GpioSlot {
                pin,
                ..GpioSlot::default()
            },
        );
        info!(id, pin, "gpio slot freed");
    }

    let slots = ctx.settings.gpio_slots();
    let mut body = body_for(ctx);
    body.push_str(
        "<form method='POST' action='/config'><table><tr><th>Pin</th><th>Type</th>\
         <th>Group</th><th>Default</th><th>Action</th></tr>",
    );
    let mut used = 0;
    let mut rows: Vec<(usize, &GpioSlot)> = slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.in_use() && !SYSTEM_PINS.contains(&s.pin))
        .collect();
    rows.sort_by_key(|(id, s)| (s.pin, *id));
    for (id, slot) in rows {
        body.push_str(&format!(
            "<tr><td>GPIO {}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td><a href='/config/gpio/options?id={id}'>Edit</a> \
             <a href='/config/gpio?del=&id={id}&pin={}'>Delete</a></td><tr>",
            slot.pin,
            slot.kind_name(),
            slot.group,
            if slot.default_high() { "High" } else { "Low" },
            slot.pin
        ));
        used += 1;
    }
    body.push_str("</table></form>");

    if used < GPIO_SLOTS {
        if let Some(free) = ctx.settings.free_gpio_slot() {
            body.push_str(&format!(
                "<p><form method='GET' action='gpio/options'>\
                 <input type='hidden' name='id' value='{free}'>\
                 <button type='submit'>Add New Pin Configuration</button></form></p>"
            ));
        }
    }
    html::form_button(&mut body, html::BACK_TO_CONFIG, "/config", "");
    ctx.send_page(transport, &body, false)
}

/// `/config/gpio/options?id=N`: edit form for one slot.
pub(super) fn options(
    ctx: &mut AppContext,
    req: &Request,
    transport: &mut dyn Transport,
) -> Result<(), RequestError> {
    ctx.gate.check(req, "config/gpio/options")?;

    let id = slot_id(req)?;
    let slots = ctx.settings.gpio_slots();
    let conf = slots[id];

    let mut body = body_for(ctx);
    body.push_str(&format!(
        "<form method='GET' action='/config/gpio'><input type='hidden' name='id' value='{id}'>\
         <p><b>GPIO Options {id}</b></p>"
    ));

    body.push_str("<p><b>Pin</b> <select id='pin' name='pin'>");
    for pin in 0..PIN_COUNT {
        let taken = slots
            .iter()
            .enumerate()
            .any(|(other, s)| other != id && s.in_use() && s.pin == pin);
        if SYSTEM_PINS.contains(&pin) || taken {
            continue;
        }
        html::option(&mut body, pin, &format!("GPIO {pin}"), conf.in_use() && conf.pin == pin);
    }
    body.push_str("</select></p>");

    body.push_str("<p><b>Type</b> <select id='type' name='type'>");
    for (kind, label) in KIND_OPTIONS {
        html::option(&mut body, kind, label, conf.kind & 0xFE == kind);
    }
    body.push_str("</select></p>");

    body.push_str("<p><b>Group</b> <select id='group' name='group'>");
    html::option(&mut body, 0, "None", conf.group == 0);
    for group in 1..15u8 {
        html::option(&mut body, group, &format!("Group {group}"), conf.group == group);
    }
    body.push_str("</select></p>");

    let high = conf.default_high();
    body.push_str("<p><b>Default State</b> <select id='state' name='state'>");
    html::option(&mut body, 1, "High", high);
    html::option(&mut body, 0, "Low", !high);
    body.push_str("</select></p>");

    body.push_str(
        "<p><button type='submit' name='save' value='gpio'>Save Settings</button></p></form>",
    );
    html::form_button(&mut body, "&#8617; Back", "/config/gpio", "");
    ctx.send_page(transport, &body, false)?;

    if let Some(action) = req.arg("action") {
        warn!(action, "text command from the gpio options page");
        ctx.device.dispatch_text(action);
    }
    Ok(())
}
