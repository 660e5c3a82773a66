use std::sync::Arc;

use ti_markdown_core::{
    Action, ActionType, ContentType, Editor, EditorConfig, EditorError, EditorFactory,
    EditorValue, ElementConfig, FactoryError, LINE_ACTIONS, Node, PARAGRAPH, PrefixToggle,
    SELECTION_ACTIONS, builtin_plugins,
};

fn open_factory() -> EditorFactory {
    let mut factory = EditorFactory::new();
    for plugin in builtin_plugins() {
        factory.use_plugin(plugin.as_ref()).unwrap();
    }
    factory
}

#[test]
fn markdown_factory_is_frozen_with_toolbars() {
    let factory = EditorFactory::markdown().unwrap();
    assert!(factory.is_frozen());
    assert!(factory.element(PARAGRAPH).is_some());
    assert_eq!(factory.line_actions().len(), LINE_ACTIONS.len());
    assert_eq!(factory.selection_actions().len(), SELECTION_ACTIONS.len());
    for key in factory.line_actions().iter().flatten() {
        assert!(factory.action(key).is_some(), "missing action {key}");
    }
}

#[test]
fn frozen_factory_rejects_configuration() {
    let mut factory = open_factory();
    factory.freeze();
    let err = factory
        .define_element(ElementConfig::block("box", ContentType::Flow, Some(ContentType::Flow)))
        .unwrap_err();
    assert_eq!(err, FactoryError::Frozen("editor factory"));
    assert!(
        factory
            .config_processor(|processor| processor.use_transform(Arc::new(|nodes: Vec<Node>| nodes)))
            .is_err()
    );
}

#[test]
fn duplicates_are_rejected() {
    let mut factory = open_factory();
    let err = factory
        .define_element(ElementConfig::block(
            PARAGRAPH,
            ContentType::Phrasing,
            Some(ContentType::Phrasing),
        ))
        .unwrap_err();
    assert_eq!(err, FactoryError::DuplicateElement(PARAGRAPH.to_string()));

    let action = Action::new("toggle-paragraph", ActionType::TopLevel, |_, _, _| Ok(false));
    assert_eq!(
        factory.define_action(action).unwrap_err(),
        FactoryError::DuplicateAction("toggle-paragraph".to_string())
    );
}

#[test]
fn bad_prefix_patterns_are_reported() {
    let err = PrefixToggle::new("([", |_, _| None, |_, _, _| Ok(false))
        .err()
        .unwrap();
    let FactoryError::InvalidPattern { pattern, .. } = err else {
        panic!("expected invalid pattern");
    };
    assert_eq!(pattern, "([");
}

#[test]
fn editors_need_a_frozen_factory() {
    let factory = Arc::new(open_factory());
    let err = Editor::new(factory, vec![Node::paragraph("x")]).err().unwrap();
    assert!(matches!(err, EditorError::FactoryNotFrozen));
}

#[test]
fn value_round_trips_through_json() -> anyhow::Result<()> {
    let factory = EditorFactory::markdown()?;
    let editor = Editor::new(
        factory.clone(),
        vec![Node::heading(2, "Title"), Node::list(true, &["a"])],
    )?;

    let json = editor.value().to_json_pretty()?;
    let value = EditorValue::from_json_str(&json)?;
    assert_eq!(value, editor.value());

    let reopened = value.into_editor(factory, EditorConfig::default())?;
    assert_eq!(reopened.children(), editor.children());
    Ok(())
}

#[test]
fn value_fills_in_schema_defaults() -> anyhow::Result<()> {
    let value = EditorValue::from_json_str(
        r#"{"children":[{"node":"element","type":"paragraph","children":[{"node":"text","text":"x"}]}]}"#,
    )?;
    assert_eq!(value.schema, "ti-markdown");
    assert_eq!(value.version, 1);
    assert_eq!(value.into_children(), vec![Node::paragraph("x")]);
    Ok(())
}
