//! Scope layering and configuration extension precedence.

use javelin_eval::{ConfigurationBuilder, Evaluator, Key, ProjectBuilder};

fn color_key() -> Key<String> {
    Key::new("color", "The color of the world")
}

#[test]
fn extension_precedence_over_layered_configurations() {
    let color = color_key();

    let arctic = ConfigurationBuilder::new("arctic")
        .bind_value(&color, "White".to_string())
        .build();
    let wonderland = ConfigurationBuilder::new("wonderland")
        .bind_value(&color, "Rainbow".to_string())
        .extend(&arctic, |ext| {
            ext.bind_value(&color, "Transparent".to_string());
        })
        .build();
    let project = ProjectBuilder::new("p")
        .bind_value(&color, "Red".to_string())
        .build();

    let evaluator = Evaluator::new();
    let root = evaluator.root_scope(&project);

    // p / color
    assert_eq!(evaluator.evaluate(root, &color).unwrap(), "Red");

    // p / arctic : color
    let arctic_scope = evaluator.layer(root, &arctic);
    assert_eq!(evaluator.evaluate(arctic_scope, &color).unwrap(), "White");

    // p / wonderland : color
    let wonderland_scope = evaluator.layer(root, &wonderland);
    assert_eq!(
        evaluator.evaluate(wonderland_scope, &color).unwrap(),
        "Rainbow"
    );

    // p / wonderland : arctic : color — wonderland's extension of arctic
    // overrides arctic's own binding.
    let wa = evaluator.layer(wonderland_scope, &arctic);
    assert_eq!(evaluator.evaluate(wa, &color).unwrap(), "Transparent");

    // p / arctic : wonderland : color — wonderland itself is the most
    // significant holder; its extension of arctic sits below it.
    let aw = evaluator.layer(arctic_scope, &wonderland);
    assert_eq!(evaluator.evaluate(aw, &color).unwrap(), "Rainbow");
}

#[test]
fn layering_returns_identical_scopes() {
    let key: Key<u32> = Key::new("n", "");
    let config = ConfigurationBuilder::new("cfg").bind_value(&key, 1).build();
    let project = ProjectBuilder::new("p").bind_value(&key, 0).build();

    let evaluator = Evaluator::new();
    let root = evaluator.root_scope(&project);
    assert_eq!(evaluator.layer(root, &config), evaluator.layer(root, &config));
    assert_eq!(evaluator.root_scope(&project), root);
}

#[test]
fn configuration_parent_consulted_after_child() {
    let key: Key<String> = Key::new("value", "");
    let other: Key<String> = Key::new("other", "");

    let base = ConfigurationBuilder::new("base")
        .bind_value(&key, "from-base".to_string())
        .bind_value(&other, "base-other".to_string())
        .build();
    let child = ConfigurationBuilder::new("child")
        .parent(&base)
        .bind_value(&key, "from-child".to_string())
        .build();
    let project = ProjectBuilder::new("p").build();

    let evaluator = Evaluator::new();
    let root = evaluator.root_scope(&project);
    let scope = evaluator.layer(root, &child);

    // The child shadows its parent; the parent answers only for keys the
    // child does not bind.
    assert_eq!(evaluator.evaluate(scope, &key).unwrap(), "from-child");
    assert_eq!(evaluator.evaluate(scope, &other).unwrap(), "base-other");
}

#[test]
fn archetypes_participate_in_every_scope() {
    let key: Key<String> = Key::new("platform", "");

    let jvm = javelin_eval::ArchetypeBuilder::new("jvm")
        .bind_value(&key, "jvm".to_string())
        .build();
    let project = ProjectBuilder::new("p").archetype(&jvm).build();

    let evaluator = Evaluator::new();
    let root = evaluator.root_scope(&project);
    assert_eq!(evaluator.evaluate(root, &key).unwrap(), "jvm");

    // Still visible under a layered configuration.
    let cfg = ConfigurationBuilder::new("testing").build();
    let scope = evaluator.layer(root, &cfg);
    assert_eq!(evaluator.evaluate(scope, &key).unwrap(), "jvm");
}

#[test]
fn project_holder_beats_archetype() {
    let key: Key<String> = Key::new("name", "");
    let archetype = javelin_eval::ArchetypeBuilder::new("base")
        .bind_value(&key, "from-archetype".to_string())
        .build();
    let project = ProjectBuilder::new("p")
        .archetype(&archetype)
        .bind_value(&key, "from-project".to_string())
        .build();

    let evaluator = Evaluator::new();
    let root = evaluator.root_scope(&project);
    assert_eq!(evaluator.evaluate(root, &key).unwrap(), "from-project");
}

#[test]
fn extension_from_more_significant_holder_wins() {
    let key: Key<String> = Key::new("value", "");

    let target = ConfigurationBuilder::new("target")
        .bind_value(&key, "plain".to_string())
        .build();
    let lower = ConfigurationBuilder::new("lower")
        .extend(&target, |ext| {
            ext.bind_value(&key, "from-lower".to_string());
        })
        .build();
    let upper = ConfigurationBuilder::new("upper")
        .extend(&target, |ext| {
            ext.bind_value(&key, "from-upper".to_string());
        })
        .build();
    let project = ProjectBuilder::new("p").build();

    let evaluator = Evaluator::new();
    let root = evaluator.root_scope(&project);
    // Stack: lower, then upper (upper more significant), then target.
    let scope = evaluator.layer(root, &lower);
    let scope = evaluator.layer(scope, &upper);
    let scope = evaluator.layer(scope, &target);
    assert_eq!(evaluator.evaluate(scope, &key).unwrap(), "from-upper");
}
