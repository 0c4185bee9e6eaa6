mod common;

use common::test_panel::TestPanel;
use panelweb::context::PendingAction;
use panelweb::settings::{Subsystem, PASSWORD_MASK};
use panelweb::page::fragments::META_GO_BACK;

#[test]
fn test_save_gui_changes_only_gui() {
    let mut panel = TestPanel::new();
    let before_mqtt = panel.app.ctx.settings.subsystem(Subsystem::Mqtt);
    let before_wifi = panel.app.ctx.settings.subsystem(Subsystem::Wifi);

    // Unchecked boxes are absent; `host` is not a gui field.
    let t = panel.post_form("/config", "save=gui&idle1=30&rotate=1&cur=on&host=elsewhere");
    assert_eq!(t.status, Some(200));

    let s = &panel.app.ctx.settings;
    assert_eq!(s.int(Subsystem::Gui, "idle1"), 30);
    assert_eq!(s.int(Subsystem::Gui, "rotate"), 1);
    assert!(s.flag(Subsystem::Gui, "cursor"));
    assert!(!s.flag(Subsystem::Gui, "invert"));
    assert_eq!(s.subsystem(Subsystem::Mqtt), before_mqtt);
    assert_eq!(s.subsystem(Subsystem::Wifi), before_wifi);
}

#[test]
fn test_settings_are_applied_only_for_post() {
    let mut panel = TestPanel::new();
    panel.get("/config?save=mqtt&host=broker.lan");
    assert_eq!(panel.app.ctx.settings.text(Subsystem::Mqtt, "host"), "");
    panel.post_form("/", "save=mqtt&host=broker.lan");
    assert_eq!(panel.app.ctx.settings.text(Subsystem::Mqtt, "host"), "broker.lan");
}

#[test]
fn test_masked_password_is_kept() {
    let mut panel = TestPanel::new();
    panel.post_form("/config", "save=wifi&ssid=home&pass=hunter22");
    panel.post_form("/config", &format!("save=wifi&ssid=home2&pass={PASSWORD_MASK}"));
    let s = &panel.app.ctx.settings;
    assert_eq!(s.text(Subsystem::Wifi, "ssid"), "home2");
    assert_eq!(s.text(Subsystem::Wifi, "pass"), "hunter22");

    let body = panel.get("/config/wifi").body_text();
    assert!(!body.contains("hunter22"));
}

#[test]
fn test_save_config_writes_settings_file() {
    let mut panel = TestPanel::new();
    panel.post_form("/config", "save=hasp&hue=120");
    assert!(!panel.settings_path().exists());

    let t = panel.get("/saveConfig");
    assert!(t.body_text().contains("Settings saved"));
    let text = std::fs::read_to_string(panel.settings_path()).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(stored["hasp"]["hue"], 120);
}

#[test]
fn test_reset_asks_for_confirmation_first() {
    let mut panel = TestPanel::new();
    let t = panel.get("/resetConfig");
    let body = t.body_text();
    assert!(body.contains("<h2>Warning</h2>"));
    assert!(body.contains("name='confirm' value='yes'"));
    assert!(!body.contains(META_GO_BACK));
    assert!(panel.app.take_pending().is_empty());
}

#[test]
fn test_confirmed_reset_erases_and_restarts_without_saving() {
    let mut panel = TestPanel::new();
    panel.post_form("/config", "save=mqtt&host=broker.lan");
    panel.get("/saveConfig");
    assert!(panel.settings_path().exists());

    let t = panel.get("/resetConfig?confirm=yes");
    assert!(t.length_matches());
    assert!(t.body_text().contains("Resetting all saved settings and restarting device"));
    assert!(t.body_text().contains(META_GO_BACK));
    assert!(!panel.settings_path().exists());
    assert_eq!(panel.app.ctx.settings.text(Subsystem::Mqtt, "host"), "");
    assert!(matches!(
        panel.app.take_pending().as_slice(),
        [PendingAction::Restart { save: false, .. }]
    ));
}

#[test]
fn test_gpio_slot_save_and_delete() {
    let mut panel = TestPanel::new();
    let t = panel.get("/config/gpio?save=gpio&id=2&pin=13&type=6&group=3&state=1");
    assert_eq!(t.status, Some(200));
    let slot = panel.app.ctx.settings.gpio_slots()[2];
    assert_eq!(slot.pin, 13);
    assert_eq!(slot.kind, 7);
    assert!(slot.default_high());
    assert!(t.body_text().contains("GPIO 13"));

    panel.get("/config/gpio?del=&id=2&pin=13");
    assert!(!panel.app.ctx.settings.gpio_slots()[2].in_use());
}

#[test]
fn test_gpio_options_requires_valid_slot() {
    let mut panel = TestPanel::new();
    assert_eq!(panel.get("/config/gpio/options").status, Some(400));
    assert_eq!(panel.get("/config/gpio/options?id=99").status, Some(400));
}
