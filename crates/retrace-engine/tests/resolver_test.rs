use retrace_engine::dom::DomTree;
use retrace_engine::resolution::{
    MAX_WIDENING_CANDIDATES, evaluate, resolve, resolve_detailed, resolve_html,
};
use retrace_engine::schema::ElementDescriptor;
use retrace_engine::selector::{SelectorKind, Specificity, Strategy};

fn assert_all_unique(tree: &DomTree, descriptor: &ElementDescriptor) {
    for candidate in resolve(descriptor, tree) {
        assert_eq!(
            evaluate(tree, candidate.kind, &candidate.expression),
            Specificity::Unique,
            "{} should be unique",
            candidate
        );
        assert!(candidate.is_unique());
    }
}

#[test]
fn test_recorded_xpath_is_used_as_is() {
    let html = r#"<html><body><form><button id="submit">Go</button></form></body></html>"#;
    let descriptor = ElementDescriptor::with_xpath("//button[@id='submit']");

    let candidates = resolve_html(html, &descriptor);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].kind, SelectorKind::XPath);
    assert_eq!(candidates[0].expression, "//button[@id='submit']");
    assert_eq!(candidates[0].strategy, Strategy::RecordedXpath);
}

#[test]
fn test_preference_order() {
    let html = r#"<html><body>
        <input id="email" name="email" type="email" class="field">
        <input id="pw" name="password" type="password" class="field">
    </body></html>"#;
    let tree = DomTree::parse(html);
    let descriptor = ElementDescriptor {
        xpath: Some("/html/body/input[1]".into()),
        css_selector: Some("#email".into()),
        alternative_xpaths: vec!["//input[@type='email']".into()],
        ..ElementDescriptor::with_tag("input")
            .attribute("id", "email")
            .attribute("name", "email")
            .attribute("class", "field")
    };

    let candidates = resolve(&descriptor, &tree);
    let strategies: Vec<Strategy> = candidates.iter().map(|c| c.strategy).collect();
    assert_eq!(
        strategies,
        vec![
            Strategy::RecordedXpath,
            Strategy::RecordedCss,
            Strategy::RecordedAlternative,
            Strategy::Synthesized,
            Strategy::Synthesized,
        ]
    );
    assert_eq!(candidates[3].expression, "//input[@id='email']");
    assert_eq!(candidates[4].expression, "//input[@name='email']");
    // The shared class token matches both inputs and is left out.
    assert!(!candidates.iter().any(|c| c.expression.contains("field")));
    assert_all_unique(&tree, &descriptor);
}

#[test]
fn test_exact_duplicates_are_removed() {
    let html = r#"<html><body><button id="submit">Go</button></body></html>"#;
    let descriptor = ElementDescriptor {
        xpath: Some("//button[@id='submit']".into()),
        alternative_xpaths: vec!["//button[@id='submit']".into()],
        text: Some("Go".into()),
        ..ElementDescriptor::with_tag("button").attribute("id", "submit")
    };

    // The synthesized id selector repeats the recorded xpath as well.
    let candidates = resolve_html(html, &descriptor);
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].strategy, Strategy::RecordedXpath);
    assert_eq!(candidates[1].expression, "//button[normalize-space()='Go']");
}

#[test]
fn test_invalid_recorded_selectors_fall_through() {
    let html = r#"<html><body><button id="submit">Go</button></body></html>"#;
    let descriptor = ElementDescriptor {
        xpath: Some("//button[@id='submit'".into()),
        css_selector: Some("button[".into()),
        ..ElementDescriptor::with_tag("button").attribute("id", "submit")
    };

    let candidates = resolve_html(html, &descriptor);
    assert!(!candidates.is_empty());
    assert_eq!(candidates[0].strategy, Strategy::Synthesized);
    assert_eq!(candidates[0].expression, "//button[@id='submit']");
}

#[test]
fn test_duplicated_id_falls_through_to_class() {
    let html = r#"<html><body>
        <button id="submit" class="btn primary">Save</button>
        <button id="submit" class="btn">Save</button>
    </body></html>"#;
    let tree = DomTree::parse(html);
    let descriptor = ElementDescriptor::with_tag("button")
        .attribute("id", "submit")
        .attribute("class", "btn primary");

    assert_eq!(
        evaluate(&tree, SelectorKind::XPath, "//button[@id='submit']"),
        Specificity::Ambiguous
    );

    let candidates = resolve(&descriptor, &tree);
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].strategy, Strategy::Synthesized);
    assert!(candidates[0].expression.contains("' primary '"));
}

#[test]
fn test_indistinguishable_duplicates_resolve_to_nothing() {
    let html = r#"<html><body>
        <button id="submit" class="btn">Save</button>
        <button id="submit" class="btn">Save</button>
    </body></html>"#;
    let tree = DomTree::parse(html);
    let descriptor = ElementDescriptor::with_tag("button")
        .attribute("id", "submit")
        .attribute("class", "btn");

    let resolution = resolve_detailed(&descriptor, &tree);
    assert!(resolution.candidates.is_empty());
    assert!(resolution.anchor.is_none());
    assert_eq!(resolution.widening_considered, 0);
}

#[test]
fn test_widening_through_identifiable_ancestor() {
    let html = r#"<html><body><form id="login"><button id="submit">Submit</button></form><button id="submit">Submit</button></body></html>"#;
    let tree = DomTree::parse(html);
    // Recorded before a wrapper div was removed from the page.
    let descriptor = ElementDescriptor {
        xpath: Some("/html/body/div/form/button".into()),
        ..ElementDescriptor::with_tag("button").attribute("id", "submit")
    };

    let resolution = resolve_detailed(&descriptor, &tree);
    let anchor = resolution.anchor.expect("anchor in the form");
    assert_eq!(tree.tag(tree.parent(anchor).unwrap()), "form");

    let first = &resolution.candidates[0];
    assert_eq!(first.expression, "//form[@id='login']/button");
    assert_eq!(first.strategy, Strategy::Widened { depth: 1 });
    for candidate in &resolution.candidates {
        assert_eq!(
            tree.query(candidate.kind, &candidate.expression).unwrap(),
            vec![anchor]
        );
    }
    assert_all_unique(&tree, &descriptor);
}

#[test]
fn test_widening_through_identifiable_child() {
    let html = r#"<html><body><div><a class="nav">3</a><a class="nav"><span id="cart-count">3</span></a></div></body></html>"#;
    let tree = DomTree::parse(html);
    let descriptor = ElementDescriptor {
        xpath: Some("/html/body/header/a[2]".into()),
        ..ElementDescriptor::with_tag("a").attribute("class", "nav")
    };

    let candidates = resolve(&descriptor, &tree);
    assert!(!candidates.is_empty());
    assert_eq!(candidates[0].strategy, Strategy::ChildAnchored);
    assert_eq!(candidates[0].expression, "//span[@id='cart-count']/parent::a");
    assert_all_unique(&tree, &descriptor);
}

#[test]
fn test_descriptor_without_identity_resolves_to_nothing() {
    let html = r#"<html><body><button>Go</button></body></html>"#;
    assert!(resolve_html(html, &ElementDescriptor::default()).is_empty());
    assert!(resolve_html(html, &ElementDescriptor::with_tag("button")).is_empty());
}

#[test]
fn test_resolution_is_deterministic() {
    let html = r#"<html><body><form id="login"><button id="submit">Submit</button></form><button id="submit">Submit</button></body></html>"#;
    let tree = DomTree::parse(html);
    let descriptor = ElementDescriptor {
        xpath: Some("/html/body/div/form/button".into()),
        ..ElementDescriptor::with_tag("button").attribute("id", "submit")
    };

    let first = resolve(&descriptor, &tree);
    for _ in 0..5 {
        assert_eq!(resolve(&descriptor, &tree), first);
        assert_eq!(resolve(&descriptor, &DomTree::parse(html)), first);
    }
}

#[test]
fn test_widening_is_bounded_on_deep_documents() {
    let depth = 200;
    let html = format!(
        "<html><body>{}{}</body></html>",
        "<div class=\"x\">".repeat(depth),
        "</div>".repeat(depth)
    );
    let tree = DomTree::parse(&html);
    let descriptor = ElementDescriptor {
        xpath: Some(format!("/html/body/section{}", "/div".repeat(depth))),
        ..ElementDescriptor::with_tag("div").attribute("class", "x")
    };

    let resolution = resolve_detailed(&descriptor, &tree);
    let anchor = resolution.anchor.expect("deepest div is the anchor");
    assert!(tree.children(anchor).is_empty());
    assert_eq!(resolution.widening_considered, MAX_WIDENING_CANDIDATES);
    assert!(resolution.candidates.is_empty());
}

#[test]
fn test_recorded_text_spanning_child_elements() {
    let tree = DomTree::parse("<p>Hello <b>world</b> again</p><p>other</p>");
    let descriptor = ElementDescriptor {
        text: Some("Hello world again".into()),
        ..ElementDescriptor::with_tag("p")
    };

    let candidates = resolve(&descriptor, &tree);
    assert_eq!(candidates.len(), 1);
    assert_eq!(
        candidates[0].expression,
        "//p[normalize-space()='Hello world again']"
    );
    assert_eq!(candidates[0].strategy, Strategy::Synthesized);
    assert_all_unique(&tree, &descriptor);
}
