use retrace_common::error::DocumentError;
use retrace_common::schema::{
    ClickParams, ElementDescriptor, NavigateParams, RecordedStep, ReplayDocument, ScrollParams,
    SelectOptionParams, StepAction, UnsupportedKind, validate_steps_skipping,
};
use std::collections::BTreeSet;
use serde_json::json;

fn recorder_output() -> String {
    json!({
        "version": 1,
        "test_case": "Log in and open the dashboard",
        "secrets": { "PASSWORD": "hunter2" },
        "steps": [
            {
                "index": 0,
                "action": { "go_to_url": { "url": "https://example.com/login" }, "click_element_by_index": null }
            },
            {
                "index": 1,
                "action": { "input_text": { "text": "<secret>PASSWORD</secret>", "index": 4 }, "done": null },
                "element": {
                    "tag_name": "input",
                    "attributes": { "name": "password", "type": "password", "placeholder": null },
                    "xpath": "/html/body/form/input[2]",
                    "alternative_relative_xpaths": ["//input[@name='password']"]
                }
            },
            {
                "index": 2,
                "action": { "click_element_by_index": { "index": 7 } },
                "element": { "tag_name": "button", "attributes": { "id": "submit" }, "text": "Sign in" }
            },
            {
                "index": 3,
                "action": { "drag_drop": { "coord_source_x": 10, "coord_source_y": 20 } },
                "skippable": true
            },
            {
                "index": 4,
                "action": { "done": { "text": "logged in", "success": true } }
            }
        ]
    })
    .to_string()
}

#[test]
fn test_parse_recorder_output() {
    let doc = ReplayDocument::from_json(&recorder_output()).unwrap();

    assert_eq!(doc.test_case.as_deref(), Some("Log in and open the dashboard"));
    assert_eq!(doc.secrets.get("PASSWORD").map(String::as_str), Some("hunter2"));
    assert_eq!(doc.steps.len(), 5);

    assert_eq!(
        doc.steps[0].action,
        StepAction::Navigate(NavigateParams {
            url: "https://example.com/login".into()
        })
    );

    let input = &doc.steps[1];
    assert_eq!(input.action.name(), "input_text");
    let element = input.element.as_ref().unwrap();
    assert_eq!(element.attributes.len(), 2);
    assert!(!element.attributes.contains_key("placeholder"));
    assert_eq!(element.alternative_xpaths, vec!["//input[@name='password']"]);

    assert_eq!(
        doc.steps[2].action,
        StepAction::Click(ClickParams { index: Some(7) })
    );
    assert_eq!(
        doc.steps[2].element.as_ref().unwrap().text.as_deref(),
        Some("Sign in")
    );

    match &doc.steps[3].action {
        StepAction::Unsupported(action) => {
            assert_eq!(action.kind, UnsupportedKind::DragDrop);
            assert_eq!(action.params["coord_source_x"], 10);
        }
        other => panic!("expected unsupported action, got {:?}", other),
    }
    assert!(doc.steps[3].skippable);
    assert!(!doc.steps[2].skippable);
}

#[test]
fn test_round_trip_keeps_meaning() {
    let doc = ReplayDocument::from_json(&recorder_output()).unwrap();
    let written = doc.to_json_pretty().unwrap();

    // Canonical discriminators are written, aliases are not.
    assert!(written.contains("\"navigate\""));
    assert!(written.contains("\"click_element\""));
    assert!(!written.contains("go_to_url"));
    assert!(written.contains("\"drag_drop\""));

    let reread = ReplayDocument::from_json(&written).unwrap();
    assert_eq!(reread, doc);
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");

    let doc = ReplayDocument::new(vec![
        RecordedStep::new(
            0,
            StepAction::Navigate(NavigateParams {
                url: "https://example.com".into(),
            }),
        ),
        RecordedStep::new(1, StepAction::Click(ClickParams::default()))
            .with_element(ElementDescriptor::with_xpath("//a[@id='home']")),
    ]);
    doc.save(&path).unwrap();

    assert_eq!(ReplayDocument::load(&path).unwrap(), doc);
}

fn single_step(step: serde_json::Value) -> String {
    json!({ "version": 1, "steps": [step] }).to_string()
}

#[test]
fn test_rejects_unsupported_version() {
    let err = ReplayDocument::from_json(r#"{ "version": 2, "steps": [] }"#).unwrap_err();
    assert!(matches!(
        err,
        DocumentError::UnsupportedVersion {
            found: 2,
            supported: 1
        }
    ));
}

#[test]
fn test_rejects_index_mismatch() {
    let content = single_step(json!({ "index": 3, "action": { "wait": { "seconds": 1 } } }));
    let err = ReplayDocument::from_json(&content).unwrap_err();
    assert!(matches!(
        err,
        DocumentError::IndexMismatch {
            position: 0,
            index: 3
        }
    ));
}

#[test]
fn test_rejects_click_without_element() {
    let content = single_step(json!({ "index": 0, "action": { "click_element": {} } }));
    let err = ReplayDocument::from_json(&content).unwrap_err();
    assert!(matches!(err, DocumentError::MissingElement { index: 0, .. }));
}

#[test]
fn test_rejects_invalid_url() {
    let content = single_step(json!({
        "index": 0,
        "action": { "navigate": { "url": "not a url" } }
    }));
    let err = ReplayDocument::from_json(&content).unwrap_err();
    assert!(matches!(err, DocumentError::InvalidUrl { index: 0, .. }));
}

#[test]
fn test_rejects_malformed_actions() {
    let cases = [
        json!({ "index": 0, "action": { "teleport": {} } }),
        json!({ "index": 0, "action": { "wait": { "seconds": 1 }, "done": {} } }),
        json!({ "index": 0, "action": { "wait": null } }),
        json!({ "index": 0, "action": { "navigate": { "href": "https://example.com" } } }),
    ];
    for case in cases {
        let err = ReplayDocument::from_json(&single_step(case.clone())).unwrap_err();
        assert!(
            matches!(err, DocumentError::Parse(_)),
            "{} should fail to parse",
            case
        );
    }
}

#[test]
fn test_wait_defaults_to_three_seconds() {
    let content = single_step(json!({ "index": 0, "action": { "wait": {} } }));
    let doc = ReplayDocument::from_json(&content).unwrap();
    match &doc.steps[0].action {
        StepAction::Wait(params) => assert_eq!(params.seconds, 3),
        other => panic!("expected wait, got {:?}", other),
    }
}

#[test]
fn test_descriptor_identity() {
    assert!(!ElementDescriptor::default().has_identity());
    assert!(!ElementDescriptor::with_tag("div").has_identity());
    assert!(ElementDescriptor::with_tag("div").attribute("id", "x").has_identity());
    assert!(ElementDescriptor::with_xpath("//div").has_identity());
    assert!(!ElementDescriptor::with_xpath("   ").has_identity());
}

#[test]
fn test_recorder_only_actions_load_as_unsupported() {
    let cases = [
        ("third_party_authentication_wait", UnsupportedKind::ThirdPartyAuthenticationWait),
        ("hover_direct", UnsupportedKind::HoverDirect),
        ("close_overlay", UnsupportedKind::CloseOverlay),
    ];
    for (key, kind) in cases {
        let content = single_step(json!({ "index": 0, "action": { key: {} } }));
        let doc = ReplayDocument::from_json(&content).unwrap();
        match &doc.steps[0].action {
            StepAction::Unsupported(action) => assert_eq!(action.kind, kind),
            other => panic!("{} loaded as {:?}", key, other),
        }
        assert_eq!(doc.steps[0].action.name(), key);
    }
}

#[test]
fn test_page_scroll_keys() {
    let full = StepAction::from_parts("full_page_scroll_down", json!({})).unwrap();
    assert_eq!(full, StepAction::ScrollDown(ScrollParams::default()));

    let quarter = StepAction::from_parts("quarter_page_scroll_up", json!({})).unwrap();
    assert_eq!(quarter, StepAction::ScrollUp(ScrollParams::quarter_page()));
    assert_eq!(quarter.name(), "quarter_page_scroll_up");

    let doc = ReplayDocument::new(vec![RecordedStep::new(0, quarter.clone())]);
    let written = doc.to_json_pretty().unwrap();
    assert!(written.contains("quarter_page_scroll_up"));
    assert_eq!(ReplayDocument::from_json(&written).unwrap().steps[0].action, quarter);
}

#[test]
fn test_select_dropdown_option_needs_an_element() {
    let step = json!({
        "index": 0,
        "action": { "select_dropdown_option": { "index": 3, "text": "Large" } },
        "element": { "tag_name": "select", "attributes": { "name": "size" } }
    });
    let doc = ReplayDocument::from_json(&single_step(step)).unwrap();
    assert_eq!(
        doc.steps[0].action,
        StepAction::SelectOption(SelectOptionParams {
            text: "Large".into(),
            index: Some(3),
        })
    );
    assert!(doc.steps[0].action.requires_element());

    let bare = single_step(json!({
        "index": 0,
        "action": { "select_dropdown_option": { "text": "Large" } }
    }));
    let err = ReplayDocument::from_json(&bare).unwrap_err();
    assert!(matches!(err, DocumentError::MissingElement { index: 0, .. }));
}

#[test]
fn test_skippable_steps_are_exempt_from_target_checks() {
    let content = json!({
        "version": 1,
        "steps": [
            { "index": 0, "action": { "click_element": {} }, "skippable": true },
            { "index": 1, "action": { "navigate": { "url": "example.com" } }, "skippable": true }
        ]
    })
    .to_string();
    let doc = ReplayDocument::from_json(&content).unwrap();
    assert_eq!(doc.steps.len(), 2);
}

#[test]
fn test_skip_set_exempts_steps_but_not_positions() {
    let steps = vec![
        RecordedStep::new(0, StepAction::Click(ClickParams::default())),
        RecordedStep::new(
            1,
            StepAction::Navigate(NavigateParams {
                url: "example.com".into(),
            }),
        ),
    ];

    let err = validate_steps_skipping(&steps, &BTreeSet::from([0])).unwrap_err();
    assert!(matches!(err, DocumentError::InvalidUrl { index: 1, .. }));
    assert!(validate_steps_skipping(&steps, &BTreeSet::from([0, 1])).is_ok());

    let shifted = vec![RecordedStep::new(5, StepAction::Click(ClickParams::default()))];
    let err = validate_steps_skipping(&shifted, &BTreeSet::from([5])).unwrap_err();
    assert!(matches!(err, DocumentError::IndexMismatch { position: 0, index: 5 }));
}

#[test]
fn test_load_unchecked_defers_step_checks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.json");
    std::fs::write(
        &path,
        single_step(json!({ "index": 0, "action": { "click_element": {} } })),
    )
    .unwrap();

    assert!(matches!(
        ReplayDocument::load(&path).unwrap_err(),
        DocumentError::MissingElement { index: 0, .. }
    ));
    let doc = ReplayDocument::load_unchecked(&path).unwrap();
    assert!(validate_steps_skipping(&doc.steps, &BTreeSet::from([0])).is_ok());
}
