use super::*;
use http::Method;

fn table() -> RouteTable<u8> {
    let mut t = RouteTable::new();
    t.any("/", "root", 1)
        .any("/edit", "edit_get", 2)
        .on("/edit", Method::PUT, "edit_create", 3)
        .on("/edit", Method::DELETE, "edit_delete", 4)
        .on("/update", Method::POST, "firmware_upload", 5)
        .any("/update", "firmware_page", 6);
    t
}

#[test]
fn test_method_specific_beats_earlier_catch_all() {
    let t = table();
    assert_eq!(t.resolve(&Method::PUT, "/edit").map(|r| r.handler), Some(3));
    assert_eq!(t.resolve(&Method::DELETE, "/edit").map(|r| r.handler), Some(4));
}

#[test]
fn test_catch_all_answers_other_methods() {
    let t = table();
    assert_eq!(t.resolve(&Method::GET, "/edit").map(|r| r.handler), Some(2));
    assert_eq!(t.resolve(&Method::GET, "/update").map(|r| r.handler), Some(6));
    assert_eq!(t.resolve(&Method::POST, "/update").map(|r| r.handler), Some(5));
}

#[test]
fn test_unknown_path_resolves_to_none() {
    let t = table();
    assert!(t.resolve(&Method::GET, "/nope").is_none());
    assert!(t.resolve(&Method::GET, "/edit/").is_none());
}

#[test]
fn test_method_only_route_does_not_catch_others() {
    let mut t = RouteTable::new();
    t.on("/saveConfig", Method::POST, "save", 9u8);
    assert!(t.resolve(&Method::GET, "/saveConfig").is_none());
    assert_eq!(t.len(), 1);
}
